// This is the ledger state owned by the node: the pending pool and the block history.
// It only changes through add_transaction, add_block and mine_block.

use crate::core::{Block, Hash, PrivateKey, Transaction};
use crate::error::{LedgerError, Result};
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Maximum size units per block (1MB)
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

pub const DEFAULT_FEE_BASIS: u64 = 10;
pub const DEFAULT_SUPER_BLOCK_SIZE: u16 = 100;

#[derive(Debug, Clone)]
pub struct Chain {
    fee_basis: u64,                        // Minimum fee amount, advisory only
    super_block_size: u16,                 // Blocks per issuer consolidation, no algorithm attached
    max_block_size: usize,                 // Size cap applied when selecting transactions
    block_history: Vec<Block>,             // Accepted blocks, oldest first
    pending_transactions: Vec<Transaction>, // Validated, not yet mined, arrival order
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_BASIS, DEFAULT_SUPER_BLOCK_SIZE)
    }
}

impl Chain {
    pub fn new(fee_basis: u64, super_block_size: u16) -> Chain {
        Chain {
            fee_basis,
            super_block_size,
            max_block_size: MAX_BLOCK_SIZE,
            block_history: vec![],
            pending_transactions: vec![],
        }
    }

    pub fn with_max_block_size(mut self, max_block_size: usize) -> Chain {
        self.max_block_size = max_block_size;
        self
    }

    /// Validate a transaction and pool it; a rejected transaction leaves the pool untouched
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<()> {
        tx.validate()?;
        self.pending_transactions.push(tx);
        Ok(())
    }

    /// Validate an externally supplied block and append it.
    ///
    /// The block is checked in isolation; its parent hash is not compared
    /// against the current tip.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        block.validate()?;
        info!(
            "accepted block {} at height {}",
            block.hash(),
            block.get_height()
        );
        self.block_history.push(block);
        Ok(())
    }

    /// Validate every block in the history, stopping at the first failure
    pub fn validate(&self) -> Result<()> {
        for block in &self.block_history {
            block.validate()?;
        }
        Ok(())
    }

    /// Assemble, sign and append a block from the pending pool.
    ///
    /// Transactions are taken in descending fee order (stable, so equal fees
    /// keep arrival order) until the next one would overflow the size cap.
    /// Selection stops there: later, smaller transactions are not tried.
    /// On any failure neither the history nor the pool changes.
    pub fn mine_block(&mut self, miner: &PrivateKey) -> Result<&Block> {
        if self.pending_transactions.is_empty() {
            return Err(LedgerError::Mining("no transactions to mine".to_string()));
        }

        let mut by_fee: Vec<usize> = (0..self.pending_transactions.len()).collect();
        // sort_by_key is stable
        by_fee.sort_by_key(|&i| std::cmp::Reverse(self.pending_transactions[i].get_fee()));

        let mut selected = vec![];
        let mut total_block_size = 0usize;
        for i in by_fee {
            let tx_size = self.pending_transactions[i].encoded_size()?;
            if total_block_size + tx_size > self.max_block_size {
                break;
            }
            selected.push(i);
            total_block_size += tx_size;
        }

        let transactions: Vec<Transaction> = selected
            .iter()
            .map(|&i| self.pending_transactions[i].clone())
            .collect();

        let parent_hash = self
            .block_history
            .last()
            .map(Block::hash)
            .unwrap_or_default();
        let height = self.block_history.len() as u64 + 1;

        let mut block = Block::new(height, parent_hash, miner.public_key(), transactions)?;
        block.sign(miner)?;
        block.validate()?;

        info!(
            "mined block {} at height {} with {} transactions ({} size units)",
            block.hash(),
            height,
            selected.len(),
            total_block_size
        );

        let mut mined = vec![false; self.pending_transactions.len()];
        for i in selected {
            mined[i] = true;
        }
        let mut position = 0;
        self.pending_transactions.retain(|_| {
            let keep = !mined[position];
            position += 1;
            keep
        });
        debug!(
            "{} transactions remain pending",
            self.pending_transactions.len()
        );

        self.block_history.push(block);
        self.block_history
            .last()
            .ok_or_else(|| LedgerError::Mining("block history is empty after append".to_string()))
    }

    pub fn height(&self) -> u64 {
        self.block_history.len() as u64
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.block_history.last()
    }

    pub fn tip_hash(&self) -> Hash {
        self.last_block().map(Block::hash).unwrap_or_default()
    }

    pub fn blocks(&self) -> &[Block] {
        self.block_history.as_slice()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        self.pending_transactions.as_slice()
    }

    pub fn fee_basis(&self) -> u64 {
        self.fee_basis
    }

    pub fn super_block_size(&self) -> u16 {
        self.super_block_size
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }
}

/// Cloneable handle that serializes every access to one [`Chain`]
#[derive(Clone, Default)]
pub struct SharedChain {
    inner: Arc<Mutex<Chain>>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> SharedChain {
        SharedChain {
            inner: Arc::new(Mutex::new(chain)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Chain> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_transaction(&self, tx: Transaction) -> Result<()> {
        self.lock().add_transaction(tx)
    }

    pub fn add_block(&self, block: Block) -> Result<()> {
        self.lock().add_block(block)
    }

    /// Mine under the chain lock and return a copy of the new block
    pub fn mine_block(&self, miner: &PrivateKey) -> Result<Block> {
        self.lock().mine_block(miner).cloned()
    }

    pub fn validate(&self) -> Result<()> {
        self.lock().validate()
    }

    pub fn height(&self) -> u64 {
        self.lock().height()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending_transactions().len()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.lock().pending_transactions().to_vec()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.lock().blocks().to_vec()
    }
}
