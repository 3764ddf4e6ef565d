//! Fixed-width byte types shared by transactions, blocks and the wire protocol.
//!
//! On the JSON wire every byte array is a lowercase hex string; under bincode
//! it is the raw array with no length prefix.

use crate::error::{LedgerError, Result};
use crate::utils::{
    ed25519_check_private_key, ed25519_sign, ed25519_verify, fill_random, new_ed25519_key_pair,
    PRIVATE_KEY_LEN, PUBLIC_KEY_LEN, SEED_LEN,
};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

fn decode_exact<const N: usize>(name: &str, text: &str) -> Result<[u8; N]> {
    let bytes = HEXLOWER
        .decode(text.to_ascii_lowercase().as_bytes())
        .map_err(|e| LedgerError::Serialization(format!("{name} is not valid hex: {e}")))?;
    bytes.as_slice().try_into().map_err(|_| {
        LedgerError::Serialization(format!(
            "{name} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, bincode::Encode)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                HEXLOWER.encode(&self.0)
            }

            pub fn from_hex(text: &str) -> Result<Self> {
                decode_exact::<$len>(stringify!($name), text).map(Self)
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $len])
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}...)", stringify!($name), HEXLOWER.encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let text = String::deserialize(deserializer)?;
                Self::from_hex(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// SHA-256 content digest
    Hash,
    32
);
fixed_bytes!(
    /// Fresh randomness mixed into a content hash on every signing
    Nonce,
    32
);
fixed_bytes!(
    /// Ed25519 verifying key
    PublicKey,
    PUBLIC_KEY_LEN
);
fixed_bytes!(
    /// Ed25519 signature
    Signature,
    64
);

impl Nonce {
    pub fn random() -> Result<Nonce> {
        let mut bytes = [0u8; 32];
        fill_random(&mut bytes)?;
        Ok(Nonce(bytes))
    }
}

impl PublicKey {
    /// Check `signature` over `message` under this key
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        ed25519_verify(&self.0, &signature.0, message)
    }
}

/// Ed25519 signing key material: 32-byte seed followed by the 32-byte public key
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; PRIVATE_KEY_LEN]);

impl PrivateKey {
    pub const LEN: usize = PRIVATE_KEY_LEN;

    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_LEN]) -> PrivateKey {
        PrivateKey(bytes)
    }

    pub fn from_hex(text: &str) -> Result<PrivateKey> {
        decode_exact::<PRIVATE_KEY_LEN>("PrivateKey", text).map(PrivateKey)
    }

    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }

    /// The public key stored in the trailing 32 bytes
    pub fn public_key(&self) -> PublicKey {
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(&self.0[SEED_LEN..]);
        PublicKey(bytes)
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        ed25519_sign(&self.0, message).map(Signature)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a fresh, independent key pair from the secure random source
    pub fn generate() -> Result<KeyPair> {
        let (private_key, public_key) = new_ed25519_key_pair()?;
        Ok(KeyPair {
            private_key: PrivateKey(private_key),
            public_key: PublicKey(public_key),
        })
    }

    /// Rebuild a key pair from private key material, checking that the
    /// embedded public half belongs to the seed
    pub fn from_private_key(private_key: PrivateKey) -> Result<KeyPair> {
        ed25519_check_private_key(&private_key.0)?;
        let public_key = private_key.public_key();
        Ok(KeyPair {
            private_key,
            public_key,
        })
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_serde_round_trip_through_json() {
        let hash = Hash([0xAB; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));

        let decoded: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, hash);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let short = format!("\"{}\"", "00".repeat(31));
        assert!(serde_json::from_str::<PublicKey>(&short).is_err());
        assert!(Signature::from_hex(&"11".repeat(32)).is_err());
        assert!(Signature::from_hex(&"11".repeat(64)).is_ok());
    }

    #[test]
    fn test_key_pair_public_key_is_private_key_tail() {
        let key_pair = KeyPair::generate().unwrap();
        assert_eq!(key_pair.private_key().public_key(), key_pair.public_key());
        assert_eq!(
            &key_pair.private_key().as_bytes()[SEED_LEN..],
            key_pair.public_key().as_bytes()
        );
    }

    #[test]
    fn test_generated_key_pairs_are_independent() {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_from_private_key_checks_consistency() {
        let good = KeyPair::generate().unwrap();
        let rebuilt = KeyPair::from_private_key(good.private_key().clone()).unwrap();
        assert_eq!(rebuilt, good);

        let other = KeyPair::generate().unwrap();
        let mut mixed = *good.private_key().as_bytes();
        mixed[SEED_LEN..].copy_from_slice(other.public_key().as_bytes());
        assert!(KeyPair::from_private_key(PrivateKey::from_bytes(mixed)).is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let key_pair = KeyPair::generate().unwrap();
        let signature = key_pair.private_key().sign(b"message").unwrap();

        assert!(key_pair.public_key().verify(b"message", &signature));
        assert!(!key_pair.public_key().verify(b"massage", &signature));
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let key_pair = KeyPair::generate().unwrap();
        let text = format!("{:?}", key_pair.private_key());
        assert_eq!(text, "PrivateKey(..)");
    }

    #[test]
    fn test_random_nonces_differ() {
        assert_ne!(Nonce::random().unwrap(), Nonce::random().unwrap());
    }
}
