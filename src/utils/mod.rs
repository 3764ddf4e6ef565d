//! Utility functions and helpers
//!
//! Hashing, Ed25519 signing, secure randomness, timestamps and the
//! bincode helpers used to measure fixed-size encodings.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, ed25519_check_private_key, ed25519_sign, ed25519_verify, fill_random,
    new_ed25519_key_pair, sha256_digest, ContentHasher, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN,
    SEED_LEN, SIGNATURE_LEN,
};

pub use serialization::{encoded_size, serialize};
