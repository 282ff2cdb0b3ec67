use crate::core::transaction::total_fees;
use crate::core::{
    CancellationToken, LedgerParams, ProofOfWork, ProofTarget, SignatureVerifier, Transaction,
    TransactionSource, TransactionVerifier, VerifyContext,
};
use crate::error::{LedgerError, Result};
use crate::utils::{canonical_json, deserialize, serialize};
use log::info;
use serde::{Deserialize, Serialize};

// Label used for verification failures of a block that has no hash yet.
const UNMINED: &str = "unmined";

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    transactions: Vec<Transaction>,
    previous_hash: Option<String>,
    nonce: u64,
    hash: String,
}

// What the proof-of-work commits to. Nonce and hash are deliberately absent.
#[derive(Serialize)]
struct BlockContent<'a> {
    transactions: &'a [Transaction],
    previous_hash: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct MineOptions {
    /// Trust the transactions instead of verifying them before mining.
    pub skip_verification: bool,
    pub cancel: CancellationToken,
}

impl Block {
    /// Prepends a coinbase paying `miner` the incentive plus all fees, verifies
    /// the transactions against `source` unless told otherwise, and searches
    /// for a nonce.
    pub fn mine(
        transactions: Vec<Transaction>,
        ancestor: Option<&Block>,
        miner: &str,
        source: &dyn TransactionSource,
        ctx: VerifyContext<'_>,
        options: &MineOptions,
    ) -> Result<Block> {
        let template = BlockTemplate::new(transactions, ancestor, miner, ctx.params)?;
        if !options.skip_verification {
            template.verify_transactions(source, ctx.signatures)?;
        }
        template.mine(&ctx.params.target, &options.cancel)
    }

    /// The first block: no ancestor and nothing but the incentive coinbase.
    pub fn genesis(
        miner: &str,
        params: &LedgerParams,
        cancel: &CancellationToken,
    ) -> Result<Block> {
        info!("Creating genesis block for address: {miner}");
        BlockTemplate::new(vec![], None, miner, params)?.mine(&params.target, cancel)
    }

    pub fn content_bytes(
        transactions: &[Transaction],
        previous_hash: Option<&str>,
    ) -> Result<Vec<u8>> {
        canonical_json(&BlockContent {
            transactions,
            previous_hash,
        })
    }

    pub fn recompute_hash(&self) -> Result<String> {
        let content = Self::content_bytes(&self.transactions, self.get_previous_hash())?;
        Ok(ProofOfWork::hash_with_nonce(&content, self.nonce))
    }

    /// Stored hash is reproducible from the content and nonce, and meets `target`.
    pub fn has_valid_proof(&self, target: &ProofTarget) -> Result<bool> {
        let content = Self::content_bytes(&self.transactions, self.get_previous_hash())?;
        Ok(ProofOfWork::validate(&content, self.nonce, &self.hash, target))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_none()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }
}

/// A block's transactions and link, ready to be verified and mined. Building
/// one only needs a glimpse of the tip, so it can be taken under a read lock
/// and mined after the lock is released.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    transactions: Vec<Transaction>,
    previous_hash: Option<String>,
}

impl BlockTemplate {
    pub fn new(
        transactions: Vec<Transaction>,
        ancestor: Option<&Block>,
        miner: &str,
        params: &LedgerParams,
    ) -> Result<BlockTemplate> {
        let fee_total = total_fees(&transactions)?;
        let reward = fee_total
            .checked_add(params.block_incentive)
            .ok_or_else(|| LedgerError::AmountOverflow {
                context: "block reward".to_string(),
            })?;

        let mut with_coinbase = Vec::with_capacity(transactions.len() + 1);
        with_coinbase.push(Transaction::coinbase(miner, reward));
        with_coinbase.extend(transactions);

        Ok(BlockTemplate {
            transactions: with_coinbase,
            previous_hash: ancestor.map(|block| block.get_hash().to_string()),
        })
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    /// Every transaction after the coinbase must verify against `source`.
    pub fn verify_transactions(
        &self,
        source: &dyn TransactionSource,
        signatures: &dyn SignatureVerifier,
    ) -> Result<()> {
        let mut verifier = TransactionVerifier::new(source, signatures);
        for (index, tx) in self.transactions.iter().enumerate().skip(1) {
            verifier
                .verify(tx)
                .map_err(|e| LedgerError::InvalidTransaction {
                    block: UNMINED.to_string(),
                    index,
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    pub fn mine(self, target: &ProofTarget, cancel: &CancellationToken) -> Result<Block> {
        let content = Block::content_bytes(&self.transactions, self.previous_hash.as_deref())?;
        info!(
            "Starting proof-of-work for block with {} transactions",
            self.transactions.len()
        );
        let (nonce, hash) = ProofOfWork::new(&content, target).run(cancel)?;
        info!("Proof-of-work completed for block: {hash} (nonce {nonce})");

        Ok(Block {
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            nonce,
            hash,
        })
    }
}
