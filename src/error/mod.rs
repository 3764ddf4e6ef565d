//! Error handling for the ledger node
//!
//! Every fallible operation in the crate reports one of these variants.
//! Validation failures abort the operation that triggered them, network
//! failures abort only the peer interaction in progress.

use crate::network::NodeId;
use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error types for ledger and peer operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A signature did not verify against the claimed key
    SignatureInvalid(String),
    /// A value violates a structural rule (zero amount, self-transfer, empty block)
    MalformedValue(String),
    /// A contained object failed validation; wraps the underlying cause
    ValidationFailed(Box<LedgerError>),
    /// Dial, accept, read or write failure on a peer connection
    Connection(String),
    /// A request/response exchange received the wrong message type
    ProtocolMismatch { expected: String, received: String },
    /// Discovery returned an ID the peer directory cannot resolve
    UnresolvedPeer(NodeId),
    /// Key material or signing primitive errors
    Crypto(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// Block assembly errors
    Mining(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::SignatureInvalid(msg) => write!(f, "Invalid signature: {msg}"),
            LedgerError::MalformedValue(msg) => write!(f, "Malformed value: {msg}"),
            LedgerError::ValidationFailed(cause) => write!(f, "Validation failed: {cause}"),
            LedgerError::Connection(msg) => write!(f, "Connection error: {msg}"),
            LedgerError::ProtocolMismatch { expected, received } => {
                write!(
                    f,
                    "Protocol mismatch: expected {expected}, received {received}"
                )
            }
            LedgerError::UnresolvedPeer(node_id) => write!(f, "Unresolved peer: {node_id}"),
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::Mining(msg) => write!(f, "Mining error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl LedgerError {
    /// Walk through `ValidationFailed` wrappers to the original cause
    pub fn root_cause(&self) -> &LedgerError {
        match self {
            LedgerError::ValidationFailed(cause) => cause.root_cause(),
            other => other,
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_nested_validation() {
        let inner = LedgerError::MalformedValue("amount must be greater than zero".to_string());
        let wrapped = LedgerError::ValidationFailed(Box::new(LedgerError::ValidationFailed(
            Box::new(inner.clone()),
        )));

        assert_eq!(wrapped.root_cause(), &inner);
        assert_eq!(inner.root_cause(), &inner);
    }

    #[test]
    fn test_display_includes_cause() {
        let err = LedgerError::ValidationFailed(Box::new(LedgerError::SignatureInvalid(
            "transaction signature is invalid".to_string(),
        )));
        let text = err.to_string();
        assert!(text.contains("Validation failed"));
        assert!(text.contains("transaction signature is invalid"));
    }
}
