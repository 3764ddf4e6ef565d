// This is the entry point for the ledger node binary
// It wires the key file, the chain and the peer network together, then serves forever
use clap::Parser;
use ledger_node::network::Server;
use ledger_node::{
    generate_demo_transactions, load_or_generate, Chain, KeyPair, NodeId, Opt, Peer,
    PeerDirectory, PeerNetwork, Settings, SharedChain,
};
use log::{debug, error, info};
use std::fs::OpenOptions;
use std::process;
use std::sync::Arc;

fn main() {
    let opt = Opt::parse();

    // I set up logging first so everything after this can report problems
    if let Err(e) = init_logging(&opt) {
        eprintln!("failed to open log file: {e}");
        process::exit(1);
    }
    debug!("================== init ==================");

    if let Err(e) = run(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(opt: &Opt) -> std::io::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(opt.loglevel.to_level_filter());

    if let Some(path) = &opt.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    // File settings first, then environment, then my command-line flags win
    let mut settings = Settings::load(opt.config.as_deref())?;
    if let Some(port) = opt.port {
        settings.port = port;
    }
    if let Some(keys) = opt.keys {
        settings.key_file = keys;
    }

    let my_keys = load_or_generate(&settings.key_file)?;

    debug!("creating new blockchain");
    debug!("FeeBasis {}", settings.fee_basis);
    debug!("SuperBlockSize {}", settings.super_block_size);
    let chain = SharedChain::new(
        Chain::new(settings.fee_basis, settings.super_block_size)
            .with_max_block_size(settings.max_block_size),
    );

    debug!("validating blockchain...");
    if let Err(e) = chain.validate() {
        error!("{e}");
    }

    // I bind before touching the network so a taken port fails fast
    let listener = Server::bind(settings.listen_addr())?;

    let local = Peer::new(NodeId::generate(), None, settings.port, my_keys.public_key());
    let network = PeerNetwork::new(local, Arc::new(PeerDirectory::new()))
        .with_sink(Arc::new(chain.clone()))
        .with_connect_timeout(settings.connect_timeout())
        .with_request_timeout(settings.request_timeout());

    // Serve before dialing out, so peers bootstrapping against me get their hello answered
    let server = Server::new(network.clone()).spawn(listener);

    if opt.no_bootstrap {
        info!("bootstrap disabled");
    } else {
        network.bootstrap(&settings.bootstrap_peers);
    }

    if opt.demo_transactions > 0 {
        if let Err(e) = run_demo(&my_keys, &chain, &network, opt.demo_transactions) {
            error!("{e}");
        }
    }

    // Anything the demo block could not fit is still pending; share the first one
    if let Some(tx) = chain.pending_transactions().first() {
        let delivered = network.broadcast_transaction(tx);
        debug!("sent pending transaction to {delivered} peers");
    }

    debug!("blockchain loaded and validated");
    match server.join() {
        Ok(result) => Ok(result?),
        Err(_) => Err("listener thread panicked".into()),
    }
}

fn run_demo(
    my_keys: &KeyPair,
    chain: &SharedChain,
    network: &PeerNetwork,
    count: usize,
) -> ledger_node::Result<()> {
    let recipient = KeyPair::generate()?;
    for tx in generate_demo_transactions(my_keys, &recipient.public_key(), count)? {
        chain.add_transaction(tx)?;
    }

    debug!("processing transactions..");
    let block = chain.mine_block(my_keys.private_key())?;
    let delivered = network.broadcast_block(&block);
    info!(
        "mined demo block {} with {} transactions, sent to {delivered} peers",
        block.hash(),
        block.get_transactions().len()
    );
    Ok(())
}
