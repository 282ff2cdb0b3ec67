//! Block and chain verification
//!
//! A block is valid when its own checks pass and, unless it is the trusted
//! genesis, its whole ancestry is valid too. Spent outputs accumulate across
//! the walk, so an output can be consumed once per chain.
//!
//! The ancestry is walked iteratively. Per-block checks (proof-of-work,
//! transactions, double spends, linkage) run from the tip downward; reward
//! checks run afterwards from the bottom upward. A failure found `k` blocks
//! below the starting block is wrapped in `k` layers of
//! [`LedgerError::BrokenAncestry`].
//!
//! The trusted genesis anchors the walk only at height 0. Every input must
//! point at a transaction that appears earlier in chain order.

use crate::core::transaction::total_fees;
use crate::core::{
    Block, Chain, OutputRef, Transaction, TransactionIndex, TransactionSource,
    TransactionVerifier, VerifyContext,
};
use crate::error::{LedgerError, Result};
use log::{debug, warn};
use std::collections::HashSet;

/// Outputs already consumed during one verification pass.
#[derive(Debug, Default)]
pub struct UsedOutputs {
    spent: HashSet<OutputRef>,
}

impl UsedOutputs {
    pub fn new() -> UsedOutputs {
        UsedOutputs::default()
    }

    /// Returns false if the output was already recorded.
    pub fn insert(&mut self, output: OutputRef) -> bool {
        self.spent.insert(output)
    }

    pub fn contains(&self, output: &OutputRef) -> bool {
        self.spent.contains(output)
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

/// Verifies the block at `index` and, through it, its ancestry down to the
/// block hashed `trusted_genesis_hash`.
pub fn verify_block(
    chain: &Chain,
    index: usize,
    trusted_genesis_hash: &str,
    used_outputs: &mut UsedOutputs,
    ctx: VerifyContext<'_>,
) -> Result<()> {
    let visible = chain.blocks().get(..=index).ok_or(LedgerError::EmptyChain)?;
    let tx_index = TransactionIndex::from_blocks(visible)?;
    let mut verifier = TransactionVerifier::new(&tx_index, ctx.signatures);

    // Hashes of the blocks visited so far, starting block first.
    let mut path: Vec<&str> = Vec::new();
    let mut current = index;
    loop {
        let block = &visible[current];
        check_block_body(block, &tx_index, &mut verifier, used_outputs, ctx)
            .map_err(|e| wrap_ancestry(e, &path))?;
        path.push(block.get_hash());
        let above = &path[..path.len() - 1];

        // Only the first block of the chain may be the trusted genesis.
        if current == 0 {
            if block.get_hash() != trusted_genesis_hash || !block.is_genesis() {
                let err = LedgerError::GenesisMismatch {
                    expected: trusted_genesis_hash.to_string(),
                    found: block.get_hash().to_string(),
                };
                return Err(wrap_ancestry(err, above));
            }
            break;
        }
        if block.get_hash() == trusted_genesis_hash {
            let err = LedgerError::GenesisMismatch {
                expected: trusted_genesis_hash.to_string(),
                found: visible[0].get_hash().to_string(),
            };
            return Err(wrap_ancestry(err, above));
        }

        let ancestor = &visible[current - 1];
        if block.get_previous_hash() != Some(ancestor.get_hash()) {
            let err = LedgerError::BrokenLink {
                block: block.get_hash().to_string(),
                expected: ancestor.get_hash().to_string(),
                found: block.get_previous_hash().map(str::to_string),
            };
            return Err(wrap_ancestry(err, above));
        }
        current -= 1;
    }

    // Reward checks, deepest block first.
    for depth in (0..path.len()).rev() {
        let block = &visible[index - depth];
        check_rewards(block, ctx).map_err(|e| wrap_ancestry(e, &path[..depth]))?;
    }

    debug!("Block {} verified with {} ancestors", path[0], path.len() - 1);
    Ok(())
}

/// A chain is valid iff its tip verifies down to the trusted genesis.
pub fn verify_chain(
    chain: &Chain,
    trusted_genesis_hash: &str,
    ctx: VerifyContext<'_>,
) -> Result<()> {
    let mut used_outputs = UsedOutputs::new();
    let tip = chain.tip_index();
    verify_block(chain, tip, trusted_genesis_hash, &mut used_outputs, ctx).map_err(|e| {
        warn!("Chain verification failed: {}", e.root_cause());
        e
    })
}

// Wraps `err` once per block in `path`, the last one innermost.
fn wrap_ancestry(err: LedgerError, path: &[&str]) -> LedgerError {
    path.iter()
        .rev()
        .fold(err, |source, block| LedgerError::BrokenAncestry {
            block: block.to_string(),
            source: Box::new(source),
        })
}

// Proof-of-work, transaction validity and double spends.
fn check_block_body(
    block: &Block,
    tx_index: &TransactionIndex<'_>,
    verifier: &mut TransactionVerifier<'_>,
    used_outputs: &mut UsedOutputs,
    ctx: VerifyContext<'_>,
) -> Result<()> {
    let block_hash = block.get_hash();
    let recomputed = block.recompute_hash()?;
    if recomputed != block_hash {
        return Err(LedgerError::BadProofOfWork {
            block: block_hash.to_string(),
            reason: format!("content hashes to {recomputed}"),
        });
    }
    if !ctx.params.target.is_met(block_hash) {
        return Err(LedgerError::BadProofOfWork {
            block: block_hash.to_string(),
            reason: format!("hash does not meet {}", ctx.params.target.describe()),
        });
    }

    for (index, tx) in block.get_transactions().iter().enumerate() {
        spends_earlier_outputs(tx, tx_index)
            .and_then(|_| verifier.verify(tx))
            .map_err(|e| LedgerError::InvalidTransaction {
                block: block_hash.to_string(),
                index,
                source: Box::new(e),
            })?;
    }

    for tx in block.get_transactions() {
        for input in tx.inputs() {
            let output = input.output_ref();
            if used_outputs.contains(&output) {
                return Err(LedgerError::DoubleSpend {
                    block: block_hash.to_string(),
                    transaction: tx.hash()?,
                    output,
                });
            }
            used_outputs.insert(output);
        }
    }
    Ok(())
}

// Every parent must come before `tx` in chain order; an output cannot be
// spent before it exists.
fn spends_earlier_outputs(tx: &Transaction, tx_index: &TransactionIndex<'_>) -> Result<()> {
    if tx.inputs().is_empty() {
        return Ok(());
    }
    let hash = tx.hash()?;
    let own = tx_index.position(&hash).unwrap_or(usize::MAX);
    for input in tx.inputs() {
        let parent = input.get_transaction_hash();
        let earlier = tx_index
            .position(parent)
            .filter(|position| *position < own)
            .and_then(|_| tx_index.find_transaction(parent));
        if earlier.is_none() {
            return Err(LedgerError::InvalidAncestor {
                transaction: hash,
                parent: parent.to_string(),
                source: Box::new(LedgerError::MissingParent {
                    parent: parent.to_string(),
                }),
            });
        }
    }
    Ok(())
}

// Exactly one leading coinbase paying the incentive plus the block's fees.
fn check_rewards(block: &Block, ctx: VerifyContext<'_>) -> Result<()> {
    let block_hash = block.get_hash();
    let transactions = block.get_transactions();
    let coinbase = match block.coinbase() {
        Some(coinbase) if coinbase.outputs().len() == 1 => coinbase,
        _ => {
            return Err(LedgerError::MissingCoinbase {
                block: block_hash.to_string(),
            })
        }
    };

    let fees = total_fees(&transactions[1..])?;
    let expected = fees
        .checked_add(ctx.params.block_incentive)
        .ok_or_else(|| LedgerError::AmountOverflow {
            context: "block reward".to_string(),
        })?;
    let actual = coinbase.outputs()[0].get_amount();
    if actual != expected {
        return Err(LedgerError::WrongRewardAmount {
            block: block_hash.to_string(),
            expected,
            actual,
        });
    }

    if let Some(index) = transactions
        .iter()
        .skip(1)
        .position(|tx| tx.is_coinbase())
    {
        return Err(LedgerError::ExtraCoinbase {
            block: block_hash.to_string(),
            index: index + 1,
        });
    }
    Ok(())
}
