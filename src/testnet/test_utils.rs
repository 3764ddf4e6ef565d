//! Test utilities for ledger and peer tests

use crate::core::{KeyPair, Transaction};
use crate::network::{NodeId, Peer, PeerDirectory, PeerNetwork, Server};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Fixed encoded size of every transaction, in block size units
pub const TX_SIZE: usize = 184;

/// A valid transfer between two fresh key pairs
pub fn signed_transaction(amount: u64, fee: u64) -> Transaction {
    let sender = KeyPair::generate().unwrap();
    let recipient = KeyPair::generate().unwrap();
    let mut tx = Transaction::new(sender.public_key(), recipient.public_key(), amount, fee).unwrap();
    tx.sign(sender.private_key()).unwrap();
    tx
}

/// A protocol context for a fresh node identity, plus that node's keys
pub fn test_network(directory: Arc<PeerDirectory>) -> (KeyPair, PeerNetwork) {
    let keys = KeyPair::generate().unwrap();
    let local = Peer::new(
        NodeId::generate(),
        Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        0,
        keys.public_key(),
    );
    let network = PeerNetwork::new(local, directory)
        .with_connect_timeout(Some(Duration::from_secs(2)))
        .with_request_timeout(Some(Duration::from_secs(2)));
    (keys, network)
}

/// Serve `network` on an ephemeral loopback port and return its address
pub fn spawn_node(network: PeerNetwork) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    Server::new(network).spawn(listener);
    addr
}

/// Poll `condition` for up to five seconds
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}
