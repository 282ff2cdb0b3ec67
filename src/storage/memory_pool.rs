use crate::core::{Chain, OutputRef, Transaction};
use crate::error::Result;
use log::debug;
use std::collections::HashSet;

/// Pending transactions in arrival order. The ledger guards it with its own
/// lock, so the pool itself is plain data.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    transactions: Vec<Transaction>,
    hashes: HashSet<String>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool::default()
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> Result<MemoryPool> {
        let mut pool = MemoryPool::new();
        for tx in transactions {
            pool.add(tx)?;
        }
        Ok(pool)
    }

    /// Returns the transaction hash, or `None` if it was already pending.
    pub fn add(&mut self, tx: Transaction) -> Result<Option<String>> {
        let hash = tx.hash()?;
        if !self.hashes.insert(hash.clone()) {
            return Ok(None);
        }
        self.transactions.push(tx);
        Ok(Some(hash))
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.hashes.contains(txid)
    }

    pub fn as_slice(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    /// Outputs consumed by pending transactions.
    pub fn spent_outputs(&self) -> HashSet<OutputRef> {
        self.transactions
            .iter()
            .flat_map(|tx| tx.inputs())
            .map(|input| input.output_ref())
            .collect()
    }

    /// Drops transactions the chain already contains, that now conflict with
    /// it, or whose parents are neither on the chain nor still pending. A
    /// dropped transaction takes its pending descendants with it.
    pub fn prune(&mut self, chain: &Chain) -> Result<()> {
        let mut on_chain = HashSet::new();
        let mut spent = HashSet::new();
        for tx in chain.transactions() {
            on_chain.insert(tx.hash()?);
            spent.extend(tx.inputs().iter().map(|input| input.output_ref()));
        }

        let before = self.transactions.len();
        let mut kept = Vec::with_capacity(before);
        for tx in &self.transactions {
            let hash = tx.hash()?;
            let conflicts = tx.inputs().iter().any(|i| spent.contains(&i.output_ref()));
            if !on_chain.contains(&hash) && !conflicts {
                kept.push((hash, tx.clone()));
            }
        }

        loop {
            let orphans: HashSet<String> = {
                let known: HashSet<&str> = kept.iter().map(|(hash, _)| hash.as_str()).collect();
                kept.iter()
                    .filter(|(_, tx)| {
                        tx.inputs().iter().any(|input| {
                            let parent = input.get_transaction_hash();
                            !on_chain.contains(parent) && !known.contains(parent)
                        })
                    })
                    .map(|(hash, _)| hash.clone())
                    .collect()
            };
            if orphans.is_empty() {
                break;
            }
            kept.retain(|(hash, _)| !orphans.contains(hash));
        }

        self.hashes = kept.iter().map(|(hash, _)| hash.clone()).collect();
        self.transactions = kept.into_iter().map(|(_, tx)| tx).collect();
        debug!(
            "Pruned {} pending transactions",
            before - self.transactions.len()
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
        self.hashes.clear();
    }
}
