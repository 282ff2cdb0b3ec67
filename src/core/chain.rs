// The chain is an arena of blocks: genesis at index 0, tip at the end, and the
// ancestor of block i is block i - 1. Each block's previous_hash still carries
// the link, and verification checks the two agree.

use crate::core::{Block, Transaction, TransactionSource};
use crate::error::{LedgerError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    blocks: Vec<Block>,
}

/// A chain as a peer reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub length: usize,
    pub chain: Vec<Block>,
}

impl ChainSnapshot {
    /// Rebuilds the chain, refusing snapshots whose reported length lies.
    pub fn into_chain(self) -> Result<Chain> {
        if self.length != self.chain.len() {
            return Err(LedgerError::SnapshotLengthMismatch {
                reported: self.length,
                actual: self.chain.len(),
            });
        }
        Chain::from_blocks(self.chain)
    }
}

impl Chain {
    pub fn new(genesis: Block) -> Chain {
        Chain {
            blocks: vec![genesis],
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Result<Chain> {
        if blocks.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        Ok(Chain { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; a chain holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn ancestor(&self, index: usize) -> Option<&Block> {
        index.checked_sub(1).and_then(|i| self.blocks.get(i))
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn tip_index(&self) -> usize {
        self.blocks.len() - 1
    }

    /// Appends `block` if it builds on the current tip.
    pub fn append(&mut self, block: Block) -> Result<()> {
        let tip_hash = self.tip().get_hash();
        if block.get_previous_hash() != Some(tip_hash) {
            return Err(LedgerError::StaleTip {
                expected: block.get_previous_hash().unwrap_or("none").to_string(),
                actual: tip_hash.to_string(),
            });
        }
        debug!("Appending block {} at height {}", block.get_hash(), self.len());
        self.blocks.push(block);
        Ok(())
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.blocks.iter().flat_map(|b| b.get_transactions())
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            length: self.blocks.len(),
            chain: self.blocks.clone(),
        }
    }
}

/// Hash lookup over transactions, borrowed from a chain or owned. Each
/// transaction also keeps the position at which it was first indexed, which
/// for a chain is its order of appearance.
#[derive(Debug, Default)]
pub struct TransactionIndex<'a> {
    by_hash: HashMap<String, (usize, Cow<'a, Transaction>)>,
}

impl<'a> TransactionIndex<'a> {
    pub fn new() -> TransactionIndex<'a> {
        TransactionIndex {
            by_hash: HashMap::new(),
        }
    }

    /// Indexes every transaction of `blocks`.
    pub fn from_blocks(blocks: &'a [Block]) -> Result<TransactionIndex<'a>> {
        let mut index = TransactionIndex::new();
        for tx in blocks.iter().flat_map(|b| b.get_transactions()) {
            index.insert(tx)?;
        }
        Ok(index)
    }

    /// Indexes the whole chain followed by pending transactions.
    pub fn with_pending(
        chain: &'a Chain,
        pending: &'a [Transaction],
    ) -> Result<TransactionIndex<'a>> {
        let mut index = Self::from_blocks(chain.blocks())?;
        for tx in pending {
            index.insert(tx)?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, tx: &'a Transaction) -> Result<String> {
        self.insert_cow(Cow::Borrowed(tx))
    }

    pub fn insert_owned(&mut self, tx: Transaction) -> Result<String> {
        self.insert_cow(Cow::Owned(tx))
    }

    fn insert_cow(&mut self, tx: Cow<'a, Transaction>) -> Result<String> {
        let hash = tx.hash()?;
        let position = self.by_hash.len();
        self.by_hash.entry(hash.clone()).or_insert((position, tx));
        Ok(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Where the transaction hashed `hash` was first indexed.
    pub fn position(&self, hash: &str) -> Option<usize> {
        self.by_hash.get(hash).map(|(position, _)| *position)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

impl TransactionSource for TransactionIndex<'_> {
    fn find_transaction(&self, hash: &str) -> Option<&Transaction> {
        self.by_hash.get(hash).map(|(_, tx)| tx.as_ref())
    }
}
