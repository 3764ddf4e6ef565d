use crate::core::{KeyPair, PublicKey, Transaction};
use crate::error::Result;
use log::debug;

/// Build `count` signed transfers from `sender` to `recipient`.
/// Transaction `i` moves `(i + 1) * 100` with a fee of `(i + 1) * 10`.
pub fn generate_demo_transactions(
    sender: &KeyPair,
    recipient: &PublicKey,
    count: usize,
) -> Result<Vec<Transaction>> {
    debug!("generating {count} demo transactions..");

    (1..=count as u64)
        .map(|n| {
            let mut tx = Transaction::new(sender.public_key(), *recipient, n * 100, n * 10)?;
            tx.sign(sender.private_key())?;
            Ok(tx)
        })
        .collect()
}
