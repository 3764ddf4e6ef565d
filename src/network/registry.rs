//! Peer bookkeeping shared by every protocol handler.
//!
//! [`PeerRegistry`] is the node's active peer set. [`PeerDirectory`] is the
//! process-wide index of every identity learned through a hello exchange,
//! which discovery consults to resolve NodeIDs it hears about. Both guard
//! their map with a single exclusive lock that is never held across a
//! network call.

use crate::core::PublicKey;
use crate::error::{LedgerError, Result};
use crate::network::{NodeId, Peer, PeerConnection};
use log::debug;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One entry for [`PeerRegistry::initialize_peers`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerParams {
    pub node_id: NodeId,
    pub address: IpAddr,
    pub port: u16,
    pub public_key: PublicKey,
}

pub struct PeerRegistry {
    peers: Mutex<HashMap<NodeId, Peer>>,
    local: Peer,
}

impl PeerRegistry {
    pub fn new(local: Peer) -> PeerRegistry {
        debug!("starting peer manager..");
        PeerRegistry {
            peers: Mutex::new(HashMap::new()),
            local,
        }
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<NodeId, Peer>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// This node's own identity
    pub fn local(&self) -> &Peer {
        &self.local
    }

    /// Insert `peer` unless its NodeID is already present; first writer wins.
    /// Returns whether the peer was inserted.
    pub fn add_peer(&self, peer: Peer) -> bool {
        let mut peers = self.peers();
        if peers.contains_key(peer.get_node_id()) {
            return false;
        }
        peers.insert(peer.get_node_id().clone(), peer);
        true
    }

    /// Insert `peer`, replacing any entry with the same NodeID
    pub fn upsert_peer(&self, peer: Peer) -> Option<Peer> {
        self.peers().insert(peer.get_node_id().clone(), peer)
    }

    /// Remove a peer; absent IDs are ignored
    pub fn remove_peer(&self, node_id: &NodeId) -> Option<Peer> {
        self.peers().remove(node_id)
    }

    /// Remove `node_id` only while its entry is still bound to `connection`
    pub fn remove_connection(&self, node_id: &NodeId, connection: &PeerConnection) -> bool {
        let mut peers = self.peers();
        let bound = peers
            .get(node_id)
            .and_then(Peer::get_connection)
            .is_some_and(|c| c.same_as(connection));
        if bound {
            peers.remove(node_id);
        }
        bound
    }

    pub fn get_peer(&self, node_id: &NodeId) -> Option<Peer> {
        self.peers().get(node_id).cloned()
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.peers().contains_key(node_id)
    }

    /// Sorted NodeIDs of every registered peer
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.peers().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Copy of every registered peer, taken under the lock
    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers().is_empty()
    }

    /// Seed the registry with known peers. Existing entries are replaced.
    pub fn initialize_peers(&self, params: impl IntoIterator<Item = PeerParams>) {
        let mut peers = self.peers();
        for param in params {
            let peer = Peer::new(
                param.node_id.clone(),
                Some(param.address),
                param.port,
                param.public_key,
            );
            peers.insert(param.node_id, peer);
        }
    }

    /// Merge NodeIDs learned from discovery.
    ///
    /// IDs already present (or naming this node) are left alone. The rest
    /// are resolved through `directory`; unresolvable ones are skipped.
    /// Returns how many peers were added.
    pub fn merge_discovered(&self, node_ids: &[NodeId], directory: &PeerDirectory) -> usize {
        let mut peers = self.peers();
        let mut added = 0;

        for node_id in node_ids {
            if node_id == self.local.get_node_id() || peers.contains_key(node_id) {
                continue;
            }
            match directory.resolve(node_id) {
                Ok(peer) => {
                    debug!("adding peer: {node_id}");
                    peers.insert(node_id.clone(), peer);
                    added += 1;
                }
                Err(e) => debug!("skipping discovered peer: {e}"),
            }
        }

        added
    }
}

/// Process-wide index of peer identities, keyed by NodeID
#[derive(Default)]
pub struct PeerDirectory {
    peers: Mutex<HashMap<NodeId, Peer>>,
}

impl PeerDirectory {
    pub fn new() -> PeerDirectory {
        PeerDirectory::default()
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<NodeId, Peer>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record (or refresh) the identity a peer claimed
    pub fn record(&self, peer: Peer) {
        self.peers().insert(peer.get_node_id().clone(), peer);
    }

    pub fn resolve(&self, node_id: &NodeId) -> Result<Peer> {
        self.peers()
            .get(node_id)
            .cloned()
            .ok_or_else(|| LedgerError::UnresolvedPeer(node_id.clone()))
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.peers().contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.peers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers().is_empty()
    }
}
