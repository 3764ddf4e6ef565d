//! Peer protocol: hello handshake, discovery, bootstrap and the inbound
//! message loop.
//!
//! The hello exchange trusts whatever NodeID and public key the counterpart
//! claims. Nothing challenges the claimant to prove it holds the matching
//! private key, so a peer can impersonate any identity it has seen.

use crate::core::{Block, SharedChain, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::message::{
    read_frame, DiscoverPeersRequest, DiscoverPeersResponse, Frame, HelloRequest, HelloResponse,
    Message,
};
use crate::network::{NodeId, Peer, PeerConnection, PeerDirectory, PeerRegistry};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::io::BufReader;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Receives blocks and transactions that arrive on inbound connections
pub trait MessageSink: Send + Sync {
    fn deliver_block(&self, block: Block) -> Result<()>;
    fn deliver_transaction(&self, tx: Transaction) -> Result<()>;
}

impl MessageSink for SharedChain {
    fn deliver_block(&self, block: Block) -> Result<()> {
        self.add_block(block)
    }

    fn deliver_transaction(&self, tx: Transaction) -> Result<()> {
        self.add_transaction(tx)
    }
}

/// Protocol context shared by the listener, bootstrap and discovery.
///
/// Cloning is cheap; every clone talks to the same registry and directory.
#[derive(Clone)]
pub struct PeerNetwork {
    registry: Arc<PeerRegistry>,
    directory: Arc<PeerDirectory>,
    sink: Option<Arc<dyn MessageSink>>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl PeerNetwork {
    pub fn new(local: Peer, directory: Arc<PeerDirectory>) -> PeerNetwork {
        debug!("starting peer networking..");
        PeerNetwork {
            registry: Arc::new(PeerRegistry::new(local)),
            directory,
            sink: None,
            connect_timeout: None,
            request_timeout: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> PeerNetwork {
        self.sink = Some(sink);
        self
    }

    /// Bound outbound dials; `None` waits for the OS
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> PeerNetwork {
        self.connect_timeout = timeout;
        self
    }

    /// Bound the wait for a hello or discovery response; `None` waits forever
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> PeerNetwork {
        self.request_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    pub fn local(&self) -> &Peer {
        self.registry.local()
    }

    pub fn hello_request(&self) -> HelloRequest {
        HelloRequest {
            node_id: self.local().get_node_id().clone(),
            public_key: *self.local().get_public_key(),
        }
    }

    pub fn hello_response(&self) -> HelloResponse {
        HelloResponse {
            node_id: self.local().get_node_id().clone(),
            public_key: *self.local().get_public_key(),
        }
    }

    /// Run the hello exchange on an outbound peer and register it under
    /// the identity it answered with. An existing entry for that NodeID is
    /// replaced. A counterpart answering with our own NodeID is ourselves
    /// and is not registered.
    pub fn handshake(&self, mut peer: Peer) -> Result<Peer> {
        let response = peer.send_hello_request(&self.hello_request(), self.request_timeout)?;
        if &response.node_id == self.local().get_node_id() {
            return Err(LedgerError::Connection(format!(
                "{:?} is this node",
                peer.socket_addr()
            )));
        }
        peer.set_identity(response.node_id, response.public_key);

        info!(
            "connected to peer {} at {:?}",
            peer.get_node_id(),
            peer.socket_addr()
        );
        self.registry.upsert_peer(peer.clone());
        self.directory.record(peer.clone());
        Ok(peer)
    }

    /// Dial `addr` and perform the hello exchange
    pub fn connect(&self, addr: SocketAddr) -> Result<Peer> {
        let peer = Peer::connect(addr, self.connect_timeout)?;
        self.handshake(peer.clone()).map_err(|e| {
            peer.disconnect();
            e
        })
    }

    /// Dial every address concurrently, wait for all attempts, then run one
    /// discovery round. Returns how many handshakes succeeded.
    pub fn bootstrap(&self, addrs: &[SocketAddr]) -> usize {
        for addr in addrs {
            debug!("bootstrap peer: {addr}");
        }

        let handles: Vec<_> = addrs
            .iter()
            .map(|&addr| {
                let network = self.clone();
                thread::spawn(move || match network.connect(addr) {
                    Ok(_) => true,
                    Err(e) => {
                        error!("failed to connect to peer {addr}: {e}");
                        false
                    }
                })
            })
            .collect();

        let connected = handles
            .into_iter()
            .map(|handle| handle.join())
            .filter(|joined| matches!(joined, Ok(true)))
            .count();
        info!("connected to {connected} of {} bootstrap peers", addrs.len());

        self.discover_peers();
        connected
    }

    /// Ask every requestable peer for its peer set and merge the answers.
    ///
    /// The registry lock is only taken for the snapshot and for each merge,
    /// never while waiting on a peer. Returns how many peers were added.
    pub fn discover_peers(&self) -> usize {
        debug!("discovering new peers..");

        let request = DiscoverPeersRequest {
            known_peers: self.registry.node_ids(),
        };

        let mut added = 0;
        for peer in self.registry.snapshot() {
            let requestable = peer.get_connection().is_some_and(PeerConnection::can_request);
            if !requestable {
                debug!("skipping discovery on peer {}", peer.get_node_id());
                continue;
            }

            match peer.send_discover_peers_request(&request, self.request_timeout) {
                Ok(response) => {
                    added += self
                        .registry
                        .merge_discovered(&response.peers, &self.directory);
                }
                Err(e) => warn!("discovery failed on peer {}: {e}", peer.get_node_id()),
            }
        }

        debug!("discovery added {added} peers");
        added
    }

    /// Serve one accepted connection until it closes or a frame fails to decode.
    ///
    /// Peers that said hello on this connection are removed from the
    /// registry when it ends, unless a newer connection has replaced them.
    pub fn serve_connection(&self, stream: TcpStream) -> Result<()> {
        let remote = stream.peer_addr().ok();
        let connection = PeerConnection::inbound(&stream)?;
        let mut reader = BufReader::new(stream);
        let mut claimed: Vec<NodeId> = vec![];

        let result = loop {
            match read_frame(&mut reader) {
                Ok(Some(frame)) => self.dispatch(frame, &connection, remote, &mut claimed),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        connection.shutdown();
        for node_id in &claimed {
            if self.registry.remove_connection(node_id, &connection) {
                debug!("peer {node_id} disconnected");
            }
        }
        result
    }

    fn dispatch(
        &self,
        frame: Frame,
        connection: &PeerConnection,
        remote: Option<SocketAddr>,
        claimed: &mut Vec<NodeId>,
    ) {
        let message = match frame {
            Frame::Message(message) => message,
            Frame::Unknown(tag) => {
                info!("Received unexpected message type: {tag}");
                return;
            }
        };

        match message {
            Message::HelloRequest(hello) if &hello.node_id == self.local().get_node_id() => {
                debug!("hello from this node; answering without registering");
                if let Err(e) = connection.send(&Message::HelloResponse(self.hello_response())) {
                    error!("Failed to send HelloResponse to peer: {e}");
                }
            }
            Message::HelloRequest(hello) => {
                let peer = Peer::new(
                    hello.node_id.clone(),
                    remote.map(|addr| addr.ip()),
                    remote.map_or(0, |addr| addr.port()),
                    hello.public_key,
                )
                .with_connection(connection.clone());

                debug!("hello from peer {}", hello.node_id);
                self.registry.upsert_peer(peer.clone());
                self.directory.record(peer.clone());
                if !claimed.contains(&hello.node_id) {
                    claimed.push(hello.node_id);
                }

                if let Err(e) = peer.send_hello_response(&self.hello_response()) {
                    error!("Failed to send HelloResponse to peer: {e}");
                }
            }
            Message::DiscoverPeersRequest(request) => {
                let known: HashSet<&NodeId> = request.known_peers.iter().collect();
                let peers = self
                    .registry
                    .node_ids()
                    .into_iter()
                    .filter(|node_id| !known.contains(node_id))
                    .collect();
                let response = Message::DiscoverPeersResponse(DiscoverPeersResponse { peers });
                if let Err(e) = connection.send(&response) {
                    error!("Failed to send DiscoverPeersResponse to peer: {e}");
                }
            }
            Message::Block(block) => match &self.sink {
                Some(sink) => {
                    if let Err(e) = sink.deliver_block(block) {
                        warn!("rejected block from {remote:?}: {e}");
                    }
                }
                None => info!("Received unexpected message type: Block"),
            },
            Message::Transaction(tx) => match &self.sink {
                Some(sink) => {
                    if let Err(e) = sink.deliver_transaction(tx) {
                        warn!("rejected transaction from {remote:?}: {e}");
                    }
                }
                None => info!("Received unexpected message type: Transaction"),
            },
            other => info!("Received unexpected message type: {}", other.message_type()),
        }
    }

    /// Send `tx` to every registered peer. Returns how many sends succeeded.
    pub fn broadcast_transaction(&self, tx: &Transaction) -> usize {
        let mut delivered = 0;
        for peer in self.registry.snapshot() {
            match peer.send_transaction(tx) {
                Ok(()) => delivered += 1,
                Err(e) => error!(
                    "Failed to send transaction to peer {}: {e}",
                    peer.get_node_id()
                ),
            }
        }
        delivered
    }

    /// Send `block` to every registered peer. Returns how many sends succeeded.
    pub fn broadcast_block(&self, block: &Block) -> usize {
        let mut delivered = 0;
        for peer in self.registry.snapshot() {
            match peer.send_block(block) {
                Ok(()) => delivered += 1,
                Err(e) => error!("Failed to send block to peer {}: {e}", peer.get_node_id()),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chain, KeyPair};
    use crate::network::message::write_message;
    use crate::testnet::{signed_transaction, spawn_node, test_network, wait_until};
    use std::io::BufReader;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn test_hello_registers_both_sides() {
        let (server_keys, server) = test_network(Arc::new(PeerDirectory::new()));
        let (client_keys, client) = test_network(Arc::new(PeerDirectory::new()));
        let addr = spawn_node(server.clone());

        let peer = client.connect(addr).unwrap();
        assert_eq!(peer.get_node_id(), server.local().get_node_id());

        let on_client = client.registry().get_peer(server.local().get_node_id()).unwrap();
        assert_eq!(on_client.get_public_key(), &server_keys.public_key());
        assert!(client.directory().contains(server.local().get_node_id()));

        // The server registers before it answers
        let on_server = server.registry().get_peer(client.local().get_node_id()).unwrap();
        assert_eq!(on_server.get_public_key(), &client_keys.public_key());
        assert!(server.directory().contains(client.local().get_node_id()));
    }

    #[test]
    fn test_discovery_needs_a_resolvable_id() {
        let (_, hub) = test_network(Arc::new(PeerDirectory::new()));
        let (_, a) = test_network(Arc::new(PeerDirectory::new()));
        let (_, b) = test_network(Arc::new(PeerDirectory::new()));
        let addr = spawn_node(hub.clone());

        a.connect(addr).unwrap();
        b.connect(addr).unwrap();
        assert_eq!(hub.registry().len(), 2);

        // a's directory has never heard of b
        assert_eq!(a.discover_peers(), 0);
        assert_eq!(a.registry().node_ids(), vec![hub.local().get_node_id().clone()]);
    }

    #[test]
    fn test_discovery_merges_through_shared_directory() {
        let directory = Arc::new(PeerDirectory::new());
        let (_, hub) = test_network(Arc::clone(&directory));
        let (_, a) = test_network(Arc::clone(&directory));
        let (_, b) = test_network(Arc::clone(&directory));
        let addr = spawn_node(hub.clone());

        let hub_on_a = a.connect(addr).unwrap();
        b.connect(addr).unwrap();

        assert_eq!(a.discover_peers(), 1);
        assert!(a.registry().contains(b.local().get_node_id()));
        assert!(!a.registry().contains(a.local().get_node_id()));

        // The existing hub entry keeps its outbound connection
        let hub_entry = a.registry().get_peer(hub.local().get_node_id()).unwrap();
        assert!(hub_entry
            .get_connection()
            .unwrap()
            .same_as(hub_on_a.get_connection().unwrap()));
    }

    #[test]
    fn test_inbound_transaction_reaches_sink() {
        let chain = SharedChain::new(Chain::default());
        let (_, server) = test_network(Arc::new(PeerDirectory::new()));
        let server = server.with_sink(Arc::new(chain.clone()));
        let (_, client) = test_network(Arc::new(PeerDirectory::new()));
        let addr = spawn_node(server);

        client.connect(addr).unwrap();
        assert_eq!(client.broadcast_transaction(&signed_transaction(10, 2)), 1);
        assert!(wait_until(|| chain.pending_count() == 1));
    }

    #[test]
    fn test_inbound_block_reaches_sink() {
        let chain = SharedChain::new(Chain::default());
        let (_, server) = test_network(Arc::new(PeerDirectory::new()));
        let server = server.with_sink(Arc::new(chain.clone()));
        let (_, client) = test_network(Arc::new(PeerDirectory::new()));
        let addr = spawn_node(server);

        let miner = KeyPair::generate().unwrap();
        let source = SharedChain::new(Chain::default());
        source.add_transaction(signed_transaction(10, 2)).unwrap();
        let block = source.mine_block(miner.private_key()).unwrap();

        client.connect(addr).unwrap();
        assert_eq!(client.broadcast_block(&block), 1);
        assert!(wait_until(|| chain.height() == 1));
    }

    #[test]
    fn test_unknown_tag_does_not_close_connection() {
        let (_, server) = test_network(Arc::new(PeerDirectory::new()));
        let addr = spawn_node(server.clone());

        let mut stream = TcpStream::connect(addr).unwrap();
        let body = br#"{"type":"Ping","payload":{}}"#;
        std::io::Write::write_all(&mut stream, &(body.len() as u32).to_be_bytes()).unwrap();
        std::io::Write::write_all(&mut stream, body).unwrap();

        let hello = Message::HelloRequest(HelloRequest {
            node_id: NodeId::from("raw-client"),
            public_key: KeyPair::generate().unwrap().public_key(),
        });
        write_message(&mut stream, &hello).unwrap();

        let mut reader = BufReader::new(stream);
        match read_frame(&mut reader).unwrap() {
            Some(Frame::Message(Message::HelloResponse(response))) => {
                assert_eq!(&response.node_id, server.local().get_node_id());
            }
            other => panic!("expected HelloResponse, got {other:?}"),
        }
    }

    #[test]
    fn test_closed_connection_leaves_registry() {
        let (_, server) = test_network(Arc::new(PeerDirectory::new()));
        let (_, client) = test_network(Arc::new(PeerDirectory::new()));
        let addr = spawn_node(server.clone());

        let peer = client.connect(addr).unwrap();
        assert!(server.registry().contains(client.local().get_node_id()));

        peer.disconnect();
        assert!(wait_until(|| server.registry().is_empty()));
        // The directory keeps identities after disconnect
        assert!(server.directory().contains(client.local().get_node_id()));
    }

    #[test]
    fn test_bootstrap_skips_unreachable() {
        let (_, server) = test_network(Arc::new(PeerDirectory::new()));
        let (_, client) = test_network(Arc::new(PeerDirectory::new()));
        let live = spawn_node(server);

        let dead = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        assert_eq!(client.bootstrap(&[live, dead]), 1);
        assert_eq!(client.registry().len(), 1);
    }

    #[test]
    fn test_bootstrap_gives_up_on_silent_listener() {
        let (_, client) = test_network(Arc::new(PeerDirectory::new()));
        let client = client.with_request_timeout(Some(Duration::from_millis(300)));

        // Completes the TCP handshake from its backlog but never reads
        let silent = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = silent.local_addr().unwrap();

        let (done, finished) = mpsc::channel();
        thread::spawn(move || {
            let _ = done.send(client.bootstrap(&[addr]));
        });
        assert_eq!(finished.recv_timeout(Duration::from_secs(5)), Ok(0));
        drop(silent);
    }

    #[test]
    fn test_bootstrap_to_own_address_registers_nothing() {
        let (_, node) = test_network(Arc::new(PeerDirectory::new()));
        let addr = spawn_node(node.clone());

        assert_eq!(node.bootstrap(&[addr]), 0);
        assert!(node.registry().is_empty());
    }

    #[test]
    fn test_registry_usable_while_discovery_waits() {
        let (_, client) = test_network(Arc::new(PeerDirectory::new()));
        let client = client.with_request_timeout(None);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let (asked, discovery_sent) = mpsc::channel();
        let (release, released) = mpsc::channel::<()>();

        // Answers the hello, then reads the discovery request and sits on it
        let stalled = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut reader = BufReader::new(stream);
            read_frame(&mut reader).unwrap();
            let hello = Message::HelloResponse(HelloResponse {
                node_id: NodeId::from("stalled-peer"),
                public_key: KeyPair::generate().unwrap().public_key(),
            });
            write_message(&mut writer, &hello).unwrap();
            asked.send(read_frame(&mut reader).unwrap()).unwrap();
            let _ = released.recv();
        });

        client.connect(addr).unwrap();
        let discovering = {
            let client = client.clone();
            thread::spawn(move || client.discover_peers())
        };
        let request = discovery_sent.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            request,
            Some(Frame::Message(Message::DiscoverPeersRequest(_)))
        ));

        // Discovery is now blocked on the peer; the registry must still answer
        let (done, finished) = mpsc::channel();
        let other = client.clone();
        let started = Instant::now();
        thread::spawn(move || {
            let extra = Peer::new(
                NodeId::from("added-meanwhile"),
                None,
                0,
                KeyPair::generate().unwrap().public_key(),
            );
            let added = other.registry().add_peer(extra);
            let _ = done.send((added, other.registry().node_ids()));
        });
        let (added, node_ids) = finished
            .recv_timeout(Duration::from_secs(2))
            .expect("registry lock held during discovery");
        assert!(added);
        assert_eq!(
            node_ids,
            vec![NodeId::from("added-meanwhile"), NodeId::from("stalled-peer")]
        );
        assert!(started.elapsed() < Duration::from_secs(2));

        release.send(()).unwrap();
        stalled.join().unwrap();
        assert_eq!(discovering.join().unwrap(), 0);
    }
}
