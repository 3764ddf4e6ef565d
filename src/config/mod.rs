//! Configuration management
//!
//! Node settings come from an optional TOML file, then `NODE_*` environment
//! variables, then command-line flags.

pub mod settings;

pub use settings::{
    Settings, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_KEY_FILE, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_MS,
};
