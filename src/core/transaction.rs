// A transaction moves `amount` units from `sender` to `recipient` and offers `fee` to the miner.
// It is created unsigned, signed exactly once by the sender, and immutable afterwards.

use crate::core::{Hash, Nonce, PrivateKey, PublicKey, Signature};
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, encoded_size, ContentHasher};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct Transaction {
    nonce: Nonce,           // Regenerated on every signing
    sender: PublicKey,      // Who pays, and whose key signs
    recipient: PublicKey,   // Who receives the amount
    amount: u64,            // Units transferred, must be positive
    fee: u64,               // Units offered to the miner, not validated
    timestamp: i64,         // Unix seconds
    signature: Signature,   // Sender's signature over `hash()`
}

impl Transaction {
    /// Build an unsigned transaction stamped with the current time
    pub fn new(sender: PublicKey, recipient: PublicKey, amount: u64, fee: u64) -> Result<Self> {
        Ok(Self::with_timestamp(
            sender,
            recipient,
            amount,
            fee,
            current_timestamp()?,
        ))
    }

    pub fn with_timestamp(
        sender: PublicKey,
        recipient: PublicKey,
        amount: u64,
        fee: u64,
        timestamp: i64,
    ) -> Self {
        Transaction {
            nonce: Nonce::default(),
            sender,
            recipient,
            amount,
            fee,
            timestamp,
            signature: Signature::default(),
        }
    }

    /// Content digest over nonce, sender, recipient, amount, fee and timestamp.
    ///
    /// The signature is not part of the digest.
    pub fn hash(&self) -> Hash {
        let mut hasher = ContentHasher::new();
        hasher
            .write_bytes(self.nonce.as_bytes())
            .write_bytes(self.sender.as_bytes())
            .write_bytes(self.recipient.as_bytes())
            .write_u64(self.amount)
            .write_u64(self.fee)
            .write_i64(self.timestamp);
        Hash(hasher.finish())
    }

    /// Draw a fresh nonce and sign the resulting hash.
    ///
    /// Signing again yields a different nonce, hash and signature, i.e. a
    /// different transaction identity.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<()> {
        self.nonce = Nonce::random()?;
        let tx_hash = self.hash();
        self.signature = key.sign(tx_hash.as_bytes())?;
        Ok(())
    }

    /// Checks, in order: signature under `sender`, positive amount, distinct parties.
    pub fn validate(&self) -> Result<()> {
        let tx_hash = self.hash();

        if !self.sender.verify(tx_hash.as_bytes(), &self.signature) {
            return Err(LedgerError::SignatureInvalid(
                "transaction signature is invalid".to_string(),
            ));
        }

        if self.amount == 0 {
            return Err(LedgerError::MalformedValue(
                "transaction amount must be greater than zero".to_string(),
            ));
        }

        if self.sender == self.recipient {
            return Err(LedgerError::MalformedValue(
                "sender and recipient cannot be the same".to_string(),
            ));
        }

        Ok(())
    }

    /// Size units this transaction takes up in a block. Every transaction
    /// has the same fixed-width encoding, so this never varies.
    pub fn encoded_size(&self) -> Result<usize> {
        encoded_size(self)
    }

    pub fn get_nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn get_sender(&self) -> &PublicKey {
        &self.sender
    }

    pub fn get_recipient(&self) -> &PublicKey {
        &self.recipient
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_fee(&self) -> u64 {
        self.fee
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }

    // Field mutators for tamper tests; a signed transaction is never changed in normal flow
    #[cfg(test)]
    pub(crate) fn set_amount(&mut self, amount: u64) {
        self.amount = amount;
    }

    #[cfg(test)]
    pub(crate) fn set_sender(&mut self, sender: PublicKey) {
        self.sender = sender;
    }

    #[cfg(test)]
    pub(crate) fn set_recipient(&mut self, recipient: PublicKey) {
        self.recipient = recipient;
    }

    #[cfg(test)]
    pub(crate) fn set_nonce(&mut self, nonce: Nonce) {
        self.nonce = nonce;
    }

    #[cfg(test)]
    pub(crate) fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    #[cfg(test)]
    pub(crate) fn set_fee(&mut self, fee: u64) {
        self.fee = fee;
    }
}
