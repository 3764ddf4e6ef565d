//! Ledger data model
//!
//! Signed transactions, signed blocks, and the chain that pools the former
//! and mines them into the latter.

pub mod block;
pub mod blockchain;
pub mod transaction;
pub mod types;

pub use block::{Block, BLOCK_VERSION};
pub use blockchain::{
    Chain, SharedChain, DEFAULT_FEE_BASIS, DEFAULT_SUPER_BLOCK_SIZE, MAX_BLOCK_SIZE,
};
pub use transaction::Transaction;
pub use types::{Hash, KeyPair, Nonce, PrivateKey, PublicKey, Signature};
