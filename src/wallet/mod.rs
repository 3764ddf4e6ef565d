//! Wallet functionality
//!
//! The node's key file and the demo transfers it signs at startup.

pub mod demo;
pub mod key_file;

pub use demo::generate_demo_transactions;
pub use key_file::{load_key_pair, load_or_generate, save_key_pair};
