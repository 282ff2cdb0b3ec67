//! Core ledger functionality
//!
//! Transactions, blocks, the chain arena, verification, consensus, balances
//! and the [`Ledger`] that ties them together behind a single-writer lock.

pub mod balance;
pub mod block;
pub mod chain;
pub mod consensus;
pub mod ledger;
pub mod proof_of_work;
pub mod signing;
pub mod transaction;
pub mod verify;

pub use balance::{balance, select_inputs, CoinSelection};
pub use block::{Block, BlockTemplate, MineOptions};
pub use chain::{Chain, ChainSnapshot, TransactionIndex};
pub use consensus::{ConsensusResolver, PeerChainSource, Resolution};
pub use ledger::{Ledger, LedgerState};
pub use proof_of_work::{CancellationToken, ProofOfWork, ProofTarget, DEFAULT_MARKER, DIFFICULTY};
pub use signing::{SignatureVerifier, Signer};
pub use transaction::{
    OutputRef, Transaction, TransactionInput, TransactionOutput, TransactionSource,
    TransactionVerifier,
};
pub use verify::{verify_block, verify_chain, UsedOutputs};

/// Amount minted by every coinbase on top of the fees it collects.
pub const BLOCK_INCENTIVE: u64 = 25;

/// Consensus parameters every node on a network has to agree on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerParams {
    pub block_incentive: u64,
    pub target: ProofTarget,
}

impl Default for LedgerParams {
    fn default() -> Self {
        LedgerParams {
            block_incentive: BLOCK_INCENTIVE,
            target: ProofTarget::default(),
        }
    }
}

/// What block verification needs besides the chain itself.
#[derive(Clone, Copy)]
pub struct VerifyContext<'a> {
    pub params: &'a LedgerParams,
    pub signatures: &'a dyn SignatureVerifier,
}

impl<'a> VerifyContext<'a> {
    pub fn new(params: &'a LedgerParams, signatures: &'a dyn SignatureVerifier) -> Self {
        VerifyContext { params, signatures }
    }
}
