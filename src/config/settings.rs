use crate::core::{DEFAULT_FEE_BASIS, DEFAULT_SUPER_BLOCK_SIZE, MAX_BLOCK_SIZE};
use crate::error::{LedgerError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 19876;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_KEY_FILE: &str = "keys.txt";

const PORT_KEY: &str = "NODE_PORT";
const KEY_FILE_KEY: &str = "NODE_KEY_FILE";

const BOOTSTRAP_HOSTS: [Ipv4Addr; 3] = [
    Ipv4Addr::new(170, 64, 168, 154),
    Ipv4Addr::new(159, 65, 11, 179),
    Ipv4Addr::new(165, 22, 9, 57),
];

/// Node settings. Every field is optional in the file and falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    pub bootstrap_peers: Vec<SocketAddr>,
    pub fee_basis: u64,
    pub super_block_size: u16,
    pub max_block_size: usize,
    /// Dial timeout in milliseconds; 0 waits for the OS
    pub connect_timeout_ms: u64,
    /// Wait for a hello or discovery response in milliseconds; 0 waits forever
    pub request_timeout_ms: u64,
    pub key_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: DEFAULT_PORT,
            bootstrap_peers: BOOTSTRAP_HOSTS
                .iter()
                .map(|&ip| SocketAddr::V4(SocketAddrV4::new(ip, DEFAULT_PORT)))
                .collect(),
            fee_basis: DEFAULT_FEE_BASIS,
            super_block_size: DEFAULT_SUPER_BLOCK_SIZE,
            max_block_size: MAX_BLOCK_SIZE,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
        }
    }
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Settings> {
        Ok(toml::from_str(s)?)
    }

    /// Read settings from `path` (defaults when `None`), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let mut settings = match path {
            Some(path) => {
                debug!("loading settings from {}", path.display());
                let contents = fs::read_to_string(path).map_err(|e| {
                    LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
                })?;
                Settings::from_toml_str(&contents)?
            }
            None => Settings::default(),
        };
        settings.apply_env()?;
        Ok(settings)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply `NODE_PORT` and `NODE_KEY_FILE` as resolved by `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup(PORT_KEY) {
            self.port = port
                .trim()
                .parse()
                .map_err(|e| LedgerError::Config(format!("invalid {PORT_KEY} {port:?}: {e}")))?;
        }
        if let Some(key_file) = lookup(KEY_FILE_KEY) {
            self.key_file = PathBuf::from(key_file);
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        millis(self.request_timeout_ms)
    }

    /// Listen on every interface at the configured port
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn millis(ms: u64) -> Option<Duration> {
    match ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    }
}
