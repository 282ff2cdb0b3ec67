//! Test utilities for ledger testing

use crate::core::{
    verify_chain, Block, BlockTemplate, CancellationToken, Chain, Ledger, LedgerParams,
    VerifyContext,
};
use crate::error::{LedgerError, Result};
use crate::wallet::{EcdsaVerifier, Wallet, Wallets};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| LedgerError::Io(e.to_string()))
}

/// A fresh ledger whose genesis pays `miner`, using default parameters.
pub fn create_test_ledger(miner: &Wallet) -> Result<Ledger> {
    Ledger::create(
        &miner.get_address(),
        LedgerParams::default(),
        Arc::new(EcdsaVerifier),
    )
}

/// Several independent ledgers, as separate nodes would hold them.
pub fn create_test_network(node_count: usize) -> Result<Vec<(Ledger, Wallet)>> {
    (0..node_count)
        .map(|_| -> Result<(Ledger, Wallet)> {
            let miner = Wallet::new()?;
            Ok((create_test_ledger(&miner)?, miner))
        })
        .collect()
}

/// Create test wallets stored in `dir`
pub fn create_test_wallets(count: usize, dir: &TempDir) -> Result<(Wallets, Vec<String>)> {
    let mut wallets = Wallets::open(dir.path())?;
    let mut addresses = Vec::new();
    for _ in 0..count {
        addresses.push(wallets.create_wallet()?);
    }
    Ok((wallets, addresses))
}

/// Mines `count` blocks from whatever is pending, paying `miner`.
pub fn mine_blocks(ledger: &Ledger, miner: &str, count: usize) -> Result<Vec<Block>> {
    (0..count)
        .map(|_| ledger.mine_pending(miner, CancellationToken::new()))
        .collect()
}

/// Copies `chain` up to and including `fork_point` and extends the copy with
/// `fork_length` empty blocks paying `miner`.
pub fn create_fork_scenario(
    chain: &Chain,
    fork_point: usize,
    fork_length: usize,
    miner: &str,
    params: &LedgerParams,
) -> Result<Chain> {
    let prefix = chain
        .blocks()
        .get(..=fork_point)
        .ok_or(LedgerError::EmptyChain)?
        .to_vec();
    let mut fork = Chain::from_blocks(prefix)?;
    for _ in 0..fork_length {
        let block = BlockTemplate::new(vec![], Some(fork.tip()), miner, params)?
            .mine(&params.target, &CancellationToken::new())?;
        fork.append(block)?;
    }
    Ok(fork)
}

/// True when `chain` verifies against its own genesis.
pub fn validate_chain_integrity(chain: &Chain, params: &LedgerParams) -> bool {
    let genesis = chain.genesis().get_hash().to_string();
    let verifier = EcdsaVerifier;
    verify_chain(chain, &genesis, VerifyContext::new(params, &verifier)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_network() {
        let nodes = create_test_network(3).unwrap();
        assert_eq!(nodes.len(), 3);
        for (ledger, miner) in &nodes {
            assert_eq!(ledger.len(), 1);
            assert_eq!(ledger.balance(&miner.get_address()).unwrap(), 25);
        }
        // Independently created genesis blocks differ.
        assert_ne!(
            nodes[0].0.trusted_genesis_hash(),
            nodes[1].0.trusted_genesis_hash()
        );
    }

    #[test]
    fn test_create_test_wallets() {
        let dir = create_temp_dir().unwrap();
        let (wallets, addresses) = create_test_wallets(5, &dir).unwrap();
        assert_eq!(addresses.len(), 5);
        assert_eq!(wallets.get_addresses().len(), 5);
    }

    #[test]
    fn test_fork_is_valid_and_longer() {
        let miner = Wallet::new().unwrap();
        let ledger = create_test_ledger(&miner).unwrap();
        mine_blocks(&ledger, &miner.get_address(), 2).unwrap();
        let chain = ledger.chain();
        let params = LedgerParams::default();

        let fork = create_fork_scenario(&chain, 1, 3, "other", &params).unwrap();
        assert_eq!(fork.len(), 5);
        assert_eq!(fork.blocks()[..2], chain.blocks()[..2]);
        assert_ne!(fork.blocks()[2], chain.blocks()[2]);
        assert!(validate_chain_integrity(&fork, &params));
        assert!(validate_chain_integrity(&chain, &params));
    }
}
