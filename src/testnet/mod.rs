//! Shared fixtures for unit tests: signed transactions and loopback nodes.

pub mod test_utils;

pub use test_utils::*;
