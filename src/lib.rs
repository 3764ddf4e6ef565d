//! # Ledger Node - A Minimal Peer-to-Peer Signed Ledger
//!
//! This is a small ledger node: it pools signed transactions, mines them into
//! signed blocks with a single trusted key, and talks to other nodes over a
//! hello/discovery protocol. When I come back to this code, here's what I
//! need to remember:
//!
//! ## What It Does
//! - **Signed Transactions**: Ed25519 over a hash-of-hash of every field
//! - **Signed Blocks**: issuer signature over the header plus every transaction hash
//! - **Mining**: fee-ordered strict-prefix selection under a size cap, no proof-of-work
//! - **P2P Network**: length-prefixed JSON over TCP, one thread per connection
//! - **Peer Registry**: one lock, never held across a network call
//!
//! ## How I Organized My Code
//! - `core/`: keys, transactions, blocks and the chain
//! - `network/`: wire codec, peers, registry, protocol and listener
//! - `wallet/`: key file and demo transactions
//! - `config/`: node settings
//! - `utils/`: hashing, signing and bincode helpers
//! - `cli/`: command-line flags
//!
//! ## Known Gaps
//! - Hello trusts whatever identity the peer claims
//! - Blocks are validated one at a time; parent hashes are never checked

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{LogLevelArg, Opt};
pub use config::Settings;
pub use core::{
    Block, Chain, Hash, KeyPair, Nonce, PrivateKey, PublicKey, SharedChain, Signature,
    Transaction,
};
pub use error::{LedgerError, Result};
pub use network::{
    Message, MessageSink, NodeId, Peer, PeerConnection, PeerDirectory, PeerNetwork, PeerParams,
    PeerRegistry, Server,
};
pub use utils::{current_timestamp, sha256_digest};
pub use wallet::{generate_demo_transactions, load_or_generate};
