use ring::digest::{Context, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};

use crate::error::{LedgerError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

pub const SEED_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const PRIVATE_KEY_LEN: usize = SEED_LEN + PUBLIC_KEY_LEN;
pub const SIGNATURE_LEN: usize = 64;

/// Seconds since the Unix epoch, the resolution that goes into content hashes
pub fn current_timestamp() -> Result<i64> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LedgerError::Crypto(format!("System time error: {e}")))?
        .as_secs();

    i64::try_from(secs).map_err(|_| LedgerError::Crypto("Timestamp overflow".to_string()))
}

pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let digest = ring::digest::digest(&SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_ref());
    out
}

/// Running SHA-256 over raw fields, finished as hash-of-hash.
///
/// Integers are fed as little-endian bytes.
pub struct ContentHasher {
    context: Context,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher {
    pub fn new() -> ContentHasher {
        ContentHasher {
            context: Context::new(&SHA256),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.context.update(bytes);
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.context.update(&value.to_le_bytes());
        self
    }

    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.context.update(&value.to_le_bytes());
        self
    }

    pub fn finish(self) -> [u8; 32] {
        let inner = self.context.finish();
        sha256_digest(inner.as_ref())
    }
}

/// Fill `buf` from the operating system's secure random source
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| LedgerError::Crypto("Secure random source unavailable".to_string()))
}

/// Generate a fresh Ed25519 key pair as (seed || public key, public key)
pub fn new_ed25519_key_pair() -> Result<([u8; PRIVATE_KEY_LEN], [u8; PUBLIC_KEY_LEN])> {
    let mut seed = [0u8; SEED_LEN];
    fill_random(&mut seed)?;

    let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed)
        .map_err(|e| LedgerError::Crypto(format!("Failed to derive Ed25519 key pair: {e}")))?;

    let mut public_key = [0u8; PUBLIC_KEY_LEN];
    public_key.copy_from_slice(key_pair.public_key().as_ref());

    let mut private_key = [0u8; PRIVATE_KEY_LEN];
    private_key[..SEED_LEN].copy_from_slice(&seed);
    private_key[SEED_LEN..].copy_from_slice(&public_key);

    Ok((private_key, public_key))
}

/// Check that the trailing public half of a private key matches its seed
pub fn ed25519_check_private_key(private_key: &[u8; PRIVATE_KEY_LEN]) -> Result<()> {
    load_key_pair(private_key).map(|_| ())
}

fn load_key_pair(private_key: &[u8; PRIVATE_KEY_LEN]) -> Result<Ed25519KeyPair> {
    let (seed, public_key) = private_key.split_at(SEED_LEN);
    Ed25519KeyPair::from_seed_and_public_key(seed, public_key)
        .map_err(|e| LedgerError::Crypto(format!("Inconsistent Ed25519 key material: {e}")))
}

pub fn ed25519_sign(private_key: &[u8; PRIVATE_KEY_LEN], message: &[u8]) -> Result<[u8; 64]> {
    let key_pair = load_key_pair(private_key)?;
    let signature = key_pair.sign(message);

    if signature.as_ref().len() != SIGNATURE_LEN {
        return Err(LedgerError::Crypto("signature generation failed".to_string()));
    }

    let mut out = [0u8; SIGNATURE_LEN];
    out.copy_from_slice(signature.as_ref());
    Ok(out)
}

pub fn ed25519_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key = UnparsedPublicKey::new(&ED25519, public_key);
    peer_public_key.verify(message, signature).is_ok()
}
