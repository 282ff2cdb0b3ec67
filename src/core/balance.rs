use crate::core::transaction::resolve_parent_output;
use crate::core::{Chain, OutputRef, Transaction, TransactionIndex, TransactionInput};
use crate::error::{LedgerError, Result};
use std::collections::HashSet;

/// Inputs picked to cover a payment, and what they add up to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    pub inputs: Vec<TransactionInput>,
    pub total: u64,
}

/// What `address` has received minus what it has spent, over the chain and
/// the pending transactions.
pub fn balance(address: &str, chain: &Chain, pending: &[Transaction]) -> Result<u64> {
    let index = TransactionIndex::with_pending(chain, pending)?;
    let mut received = 0u64;
    let mut spent = 0u64;

    for tx in chain.transactions().chain(pending) {
        for output in tx.outputs() {
            if output.get_recipient() == address {
                received = add(received, output.get_amount())?;
            }
        }
        for input in tx.inputs() {
            let (_, parent_output) = resolve_parent_output(&index, input)?;
            if parent_output.get_recipient() == address {
                spent = add(spent, parent_output.get_amount())?;
            }
        }
    }
    Ok(received.saturating_sub(spent))
}

/// Greedily picks the largest unspent outputs of `address` until they cover
/// `amount`. Only outputs already on the chain are candidates; an output
/// counts as spent once any chain or pending input points at it.
pub fn select_inputs(
    address: &str,
    amount: u64,
    chain: &Chain,
    pending: &[Transaction],
) -> Result<CoinSelection> {
    let spent: HashSet<OutputRef> = chain
        .transactions()
        .chain(pending)
        .flat_map(|tx| tx.inputs())
        .map(TransactionInput::output_ref)
        .collect();

    let mut candidates = Vec::new();
    for tx in chain.transactions() {
        let hash = tx.hash()?;
        for (index, output) in tx.outputs().iter().enumerate() {
            if output.get_recipient() == address
                && !spent.contains(&OutputRef::new(&hash, index))
            {
                candidates.push((
                    TransactionInput::from_reference(&hash, index),
                    output.get_amount(),
                ));
            }
        }
    }
    // Largest first; the sort is stable so equal amounts keep chain order.
    candidates.sort_by(|a, b| b.1.cmp(&a.1));

    let mut selection = CoinSelection {
        inputs: Vec::new(),
        total: 0,
    };
    for (input, value) in candidates {
        if selection.total >= amount {
            break;
        }
        selection.total = add(selection.total, value)?;
        selection.inputs.push(input);
    }

    if selection.total < amount {
        return Err(LedgerError::InsufficientFunds {
            required: amount,
            available: selection.total,
        });
    }
    Ok(selection)
}

fn add(acc: u64, amount: u64) -> Result<u64> {
    acc.checked_add(amount)
        .ok_or_else(|| LedgerError::AmountOverflow {
            context: "balance".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Block, CancellationToken, LedgerParams, MineOptions, TransactionOutput, VerifyContext,
        BLOCK_INCENTIVE,
    };
    use crate::wallet::{EcdsaVerifier, Wallet};

    fn mined_chain(miner: &str, blocks: usize) -> Chain {
        let params = LedgerParams::default();
        let verifier = EcdsaVerifier;
        let mut chain =
            Chain::new(Block::genesis(miner, &params, &CancellationToken::new()).unwrap());
        for _ in 1..blocks {
            let block = Block::mine(
                vec![],
                Some(chain.tip()),
                miner,
                &TransactionIndex::new(),
                VerifyContext::new(&params, &verifier),
                &MineOptions::default(),
            )
            .unwrap();
            chain.append(block).unwrap();
        }
        chain
    }

    #[test]
    fn test_balance_counts_rewards() {
        let chain = mined_chain("miner", 3);
        assert_eq!(balance("miner", &chain, &[]).unwrap(), 3 * BLOCK_INCENTIVE);
        assert_eq!(balance("nobody", &chain, &[]).unwrap(), 0);
    }

    #[test]
    fn test_pending_spend_moves_balance() {
        let alice = Wallet::new().unwrap();
        let chain = mined_chain(&alice.get_address(), 2);
        let selection = select_inputs(&alice.get_address(), 30, &chain, &[]).unwrap();
        assert_eq!(selection.total, 2 * BLOCK_INCENTIVE);

        let index = TransactionIndex::from_blocks(chain.blocks()).unwrap();
        let payment = Transaction::create(
            &alice,
            selection.inputs,
            vec![
                TransactionOutput::new("bob", 30),
                TransactionOutput::new(&alice.get_address(), 15),
            ],
            &index,
        )
        .unwrap();
        let pending = vec![payment];

        assert_eq!(balance("bob", &chain, &pending).unwrap(), 30);
        assert_eq!(balance(&alice.get_address(), &chain, &pending).unwrap(), 15);
        assert!(matches!(
            select_inputs(&alice.get_address(), 1, &chain, &pending),
            Err(LedgerError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn test_selection_exhausted() {
        let chain = mined_chain("miner", 2);
        assert_eq!(
            select_inputs("miner", 51, &chain, &[]),
            Err(LedgerError::InsufficientFunds {
                required: 51,
                available: 50
            })
        );
    }
}
