// Sled-backed persistence for the chain and the pending pool. Blocks live in
// their own tree keyed by big-endian height, so iteration order is chain order.
// The chain length sits in the same tree under LENGTH_KEY, which can never
// collide with an 8-byte height key, so one batch updates both.

use crate::core::{Block, Chain, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::MemoryPool;
use crate::utils::{deserialize, serialize};
use log::info;
use sled::{Batch, Db, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";
const PENDING_TREE: &str = "pending";
const LENGTH_KEY: &str = "length";

pub struct ChainStore {
    db: Db,
    blocks: Tree,
    pending: Tree,
}

impl ChainStore {
    pub fn open(path: &Path) -> Result<ChainStore> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {e}")))?;
        let blocks = db.open_tree(BLOCKS_TREE)?;
        let pending = db.open_tree(PENDING_TREE)?;
        Ok(ChainStore {
            db,
            blocks,
            pending,
        })
    }

    /// Rewrites the stored chain atomically. Heights past the new length are
    /// removed.
    pub fn save_chain(&self, chain: &Chain) -> Result<()> {
        let mut batch = Batch::default();
        for (height, block) in chain.blocks().iter().enumerate() {
            batch.insert(height_key(height).to_vec(), block.serialize()?);
        }
        let old_length = self.stored_length()?.unwrap_or(0);
        for height in chain.len()..old_length {
            batch.remove(height_key(height).to_vec());
        }
        batch.insert(LENGTH_KEY, height_key(chain.len()).to_vec());
        self.blocks.apply_batch(batch)?;
        self.db.flush()?;
        info!("Saved chain of length {}", chain.len());
        Ok(())
    }

    /// The stored chain, or `None` if nothing was ever saved.
    pub fn load_chain(&self) -> Result<Option<Chain>> {
        let length = match self.stored_length()? {
            Some(length) => length,
            None => return Ok(None),
        };
        let mut blocks = Vec::with_capacity(length);
        for height in 0..length {
            let bytes = self.blocks.get(height_key(height))?.ok_or_else(|| {
                LedgerError::Database(format!("Block at height {height} is missing"))
            })?;
            blocks.push(Block::deserialize(&bytes)?);
        }
        Ok(Some(Chain::from_blocks(blocks)?))
    }

    pub fn save_pending(&self, pool: &MemoryPool) -> Result<()> {
        self.pending.clear()?;
        let mut batch = Batch::default();
        for (position, tx) in pool.as_slice().iter().enumerate() {
            batch.insert(height_key(position).to_vec(), serialize(tx)?);
        }
        self.pending.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn load_pending(&self) -> Result<MemoryPool> {
        let mut transactions = Vec::new();
        for entry in self.pending.iter() {
            let (_, bytes) = entry?;
            transactions.push(deserialize::<Transaction>(&bytes)?);
        }
        MemoryPool::from_transactions(transactions)
    }

    fn stored_length(&self) -> Result<Option<usize>> {
        match self.blocks.get(LENGTH_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    LedgerError::Database("Stored chain length is malformed".to_string())
                })?;
                Ok(Some(u64::from_be_bytes(raw) as usize))
            }
            None => Ok(None),
        }
    }
}

fn height_key(height: usize) -> [u8; 8] {
    (height as u64).to_be_bytes()
}
