use crate::core::{Hash, Nonce, PrivateKey, PublicKey, Signature, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, ContentHasher};
use log::debug;
use serde::{Deserialize, Serialize};

/// Template version stamped on newly assembled blocks
pub const BLOCK_VERSION: u64 = 1;

/// An ordered batch of transactions signed by the issuing miner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    height: u64,
    nonce: Nonce,
    parent_hash: Hash,
    version: u64,
    timestamp: i64,
    issuer: PublicKey,
    signature: Signature,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble an unsigned block stamped with the current time.
    ///
    /// `issuer` must be the public half of the key later passed to [`Block::sign`].
    pub fn new(
        height: u64,
        parent_hash: Hash,
        issuer: PublicKey,
        transactions: Vec<Transaction>,
    ) -> Result<Block> {
        Ok(Block {
            height,
            nonce: Nonce::default(),
            parent_hash,
            version: BLOCK_VERSION,
            timestamp: current_timestamp()?,
            issuer,
            signature: Signature::default(),
            transactions,
        })
    }

    /// Block digest: header fields followed by every transaction hash in order,
    /// finished as hash-of-hash.
    pub fn hash(&self) -> Hash {
        let mut hasher = ContentHasher::new();
        hasher
            .write_u64(self.height)
            .write_bytes(self.nonce.as_bytes())
            .write_bytes(self.parent_hash.as_bytes())
            .write_u64(self.version)
            .write_i64(self.timestamp)
            .write_bytes(self.issuer.as_bytes());

        for tx in &self.transactions {
            hasher.write_bytes(tx.hash().as_bytes());
        }

        Hash(hasher.finish())
    }

    /// Draw a fresh nonce and sign the block hash with `key`
    pub fn sign(&mut self, key: &PrivateKey) -> Result<()> {
        self.nonce = Nonce::random()?;
        let block_hash = self.hash();
        self.signature = key.sign(block_hash.as_bytes())?;
        debug!("signed block {} at height {}", block_hash, self.height);
        Ok(())
    }

    /// Checks, in order: issuer signature, height, non-empty body, then each
    /// transaction. The first failure is returned; a bad transaction comes
    /// back wrapped in `ValidationFailed`.
    pub fn validate(&self) -> Result<()> {
        let block_hash = self.hash();

        if !self.issuer.verify(block_hash.as_bytes(), &self.signature) {
            return Err(LedgerError::SignatureInvalid(
                "block signature is invalid".to_string(),
            ));
        }

        if self.height < 1 {
            return Err(LedgerError::MalformedValue(
                "block height must be greater than zero".to_string(),
            ));
        }

        if self.transactions.is_empty() {
            return Err(LedgerError::MalformedValue(
                "block must have at least one transaction".to_string(),
            ));
        }

        for tx in &self.transactions {
            tx.validate()
                .map_err(|e| LedgerError::ValidationFailed(Box::new(e)))?;
        }

        Ok(())
    }

    pub fn get_height(&self) -> u64 {
        self.height
    }

    pub fn get_nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn get_parent_hash(&self) -> &Hash {
        &self.parent_hash
    }

    pub fn get_version(&self) -> u64 {
        self.version
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_issuer(&self) -> &PublicKey {
        &self.issuer
    }

    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }

    #[cfg(test)]
    pub(crate) fn set_height(&mut self, height: u64) {
        self.height = height;
    }
}
