//! Command-line interface
//!
//! Flags for the `ledger-node` binary.

pub mod commands;

pub use commands::{LogLevelArg, Opt};
