//! The node-local ledger
//!
//! [`Ledger`] owns the chain and the pending pool behind one `RwLock` and is
//! the only writer of either. Mining takes a snapshot under the read lock,
//! searches for a nonce with no lock held, and only appends if the tip has
//! not moved in the meantime.
//!
//! The genesis hash a ledger is opened with stays its trust anchor for good;
//! chains from peers are only ever installed on top of the same genesis.

use crate::core::{
    balance, select_inputs, verify_block, verify_chain, Block, BlockTemplate, CancellationToken,
    Chain, ChainSnapshot, ConsensusResolver, LedgerParams, PeerChainSource, Resolution,
    SignatureVerifier, Signer, Transaction, TransactionIndex, TransactionOutput,
    TransactionVerifier, UsedOutputs, VerifyContext,
};
use crate::error::{LedgerError, Result};
use crate::storage::MemoryPool;
use log::{info, warn};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Block label for double spends found among pending transactions.
const PENDING: &str = "pending";

#[derive(Debug, Clone)]
pub struct LedgerState {
    pub chain: Chain,
    pub pending: MemoryPool,
}

pub struct Ledger {
    state: RwLock<LedgerState>,
    trusted_genesis_hash: String,
    params: LedgerParams,
    signatures: Arc<dyn SignatureVerifier>,
    mining: Mutex<Option<CancellationToken>>,
}

impl Ledger {
    pub fn new(
        chain: Chain,
        pending: MemoryPool,
        params: LedgerParams,
        signatures: Arc<dyn SignatureVerifier>,
    ) -> Ledger {
        Ledger {
            trusted_genesis_hash: chain.genesis().get_hash().to_string(),
            state: RwLock::new(LedgerState { chain, pending }),
            params,
            signatures,
            mining: Mutex::new(None),
        }
    }

    /// Starts a fresh chain whose genesis pays `miner`.
    pub fn create(
        miner: &str,
        params: LedgerParams,
        signatures: Arc<dyn SignatureVerifier>,
    ) -> Result<Ledger> {
        let genesis = Block::genesis(miner, &params, &CancellationToken::new())?;
        Ok(Ledger::new(
            Chain::new(genesis),
            MemoryPool::new(),
            params,
            signatures,
        ))
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    pub fn context(&self) -> VerifyContext<'_> {
        VerifyContext::new(&self.params, self.signatures.as_ref())
    }

    pub fn chain(&self) -> Chain {
        self.read().chain.clone()
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        self.read().chain.snapshot()
    }

    pub fn state(&self) -> LedgerState {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().chain.len()
    }

    /// Never true once built; the chain always holds the trusted genesis.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.read().pending.get_all()
    }

    pub fn pending_len(&self) -> usize {
        self.read().pending.len()
    }

    pub fn trusted_genesis_hash(&self) -> &str {
        &self.trusted_genesis_hash
    }

    pub fn balance(&self, address: &str) -> Result<u64> {
        let state = self.read();
        balance(address, &state.chain, state.pending.as_slice())
    }

    pub fn verify(&self) -> Result<()> {
        let state = self.read();
        verify_chain(&state.chain, &self.trusted_genesis_hash, self.context())
    }

    /// Builds a signed payment of `amount` to `to` from the signer's unspent
    /// outputs, returning any surplus beyond `fee` as change. The transaction
    /// is not submitted.
    pub fn create_payment(
        &self,
        signer: &dyn Signer,
        to: &str,
        amount: u64,
        fee: u64,
    ) -> Result<Transaction> {
        let from = signer.address();
        let required = amount
            .checked_add(fee)
            .ok_or_else(|| LedgerError::AmountOverflow {
                context: "payment".to_string(),
            })?;

        let state = self.read();
        let pending = state.pending.as_slice();
        let selection = select_inputs(&from, required, &state.chain, pending)?;

        let mut outputs = vec![TransactionOutput::new(to, amount)];
        let change = selection.total - required;
        if change > 0 {
            outputs.push(TransactionOutput::new(&from, change));
        }
        let index = TransactionIndex::with_pending(&state.chain, pending)?;
        Transaction::create(signer, selection.inputs, outputs, &index)
    }

    /// Verifies `tx` against the chain and pending pool and queues it.
    /// Returns the transaction hash.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<String> {
        let mut state = self.write();
        if tx.is_coinbase() {
            return Err(LedgerError::ExtraCoinbase {
                block: PENDING.to_string(),
                index: state.pending.len(),
            });
        }
        let hash = tx.hash()?;
        if state.pending.contains(&hash) {
            return Ok(hash);
        }

        {
            let index = TransactionIndex::with_pending(&state.chain, state.pending.as_slice())?;
            TransactionVerifier::new(&index, self.signatures.as_ref()).verify(&tx)?;
        }

        let mut spent = state.pending.spent_outputs();
        spent.extend(
            state
                .chain
                .transactions()
                .flat_map(|t| t.inputs())
                .map(|input| input.output_ref()),
        );
        if let Some(input) = tx.inputs().iter().find(|i| spent.contains(&i.output_ref())) {
            warn!("Rejecting transaction {hash}: output already spent");
            return Err(LedgerError::DoubleSpend {
                block: PENDING.to_string(),
                transaction: hash,
                output: input.output_ref(),
            });
        }

        state.pending.add(tx)?;
        info!(
            "Accepted transaction {hash} ({} pending)",
            state.pending.len()
        );
        Ok(hash)
    }

    /// Mines every pending transaction into a block paying `miner`.
    pub fn mine_pending(&self, miner: &str, cancel: CancellationToken) -> Result<Block> {
        let (template, chain, pending) = {
            let state = self.read();
            let pending = state.pending.get_all();
            let template = BlockTemplate::new(
                pending.clone(),
                Some(state.chain.tip()),
                miner,
                &self.params,
            )?;
            (template, state.chain.clone(), pending)
        };
        *self.mining.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());

        let mined = self.mine_template(template, &chain, &pending, &cancel);
        self.mining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let block = mined?;

        let mut state = self.write();
        state.chain.append(block.clone())?;
        let LedgerState { chain, pending } = &mut *state;
        pending.prune(chain)?;
        info!(
            "Mined block {} at height {}",
            block.get_hash(),
            chain.len() - 1
        );
        Ok(block)
    }

    fn mine_template(
        &self,
        template: BlockTemplate,
        chain: &Chain,
        pending: &[Transaction],
        cancel: &CancellationToken,
    ) -> Result<Block> {
        let index = TransactionIndex::with_pending(chain, pending)?;
        template.verify_transactions(&index, self.signatures.as_ref())?;
        template.mine(&self.params.target, cancel)
    }

    /// Abandons the mining job in flight, if any.
    pub fn cancel_mining(&self) {
        if let Some(token) = self
            .mining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            info!("Cancelling in-flight mining");
            token.cancel();
        }
    }

    /// Appends a block mined elsewhere after verifying the extended chain.
    pub fn append_block(&self, block: Block) -> Result<()> {
        let mut state = self.write();
        let mut candidate = state.chain.clone();
        candidate.append(block)?;
        verify_block(
            &candidate,
            candidate.tip_index(),
            &self.trusted_genesis_hash,
            &mut UsedOutputs::new(),
            self.context(),
        )?;
        state.chain = candidate;
        let LedgerState { chain, pending } = &mut *state;
        pending.prune(chain)
    }

    /// Installs an already verified `chain` if it shares the trusted genesis
    /// and is longer than the current one, cancelling any mining on the old
    /// tip. Returns whether the chain was installed.
    pub fn replace_chain(&self, chain: Chain) -> Result<bool> {
        if chain.genesis().get_hash() != self.trusted_genesis_hash {
            return Err(LedgerError::GenesisMismatch {
                expected: self.trusted_genesis_hash.clone(),
                found: chain.genesis().get_hash().to_string(),
            });
        }

        let mut state = self.write();
        if chain.len() <= state.chain.len() {
            info!(
                "Keeping local chain of length {} over candidate of length {}",
                state.chain.len(),
                chain.len()
            );
            return Ok(false);
        }
        self.cancel_mining();
        state.chain = chain;
        let LedgerState { chain, pending } = &mut *state;
        pending.prune(chain)?;
        Ok(true)
    }

    /// Runs conflict resolution against `peers` and adopts the winner, unless
    /// the local chain has caught up with it in the meantime.
    pub fn resolve(&self, peers: &[String], source: &dyn PeerChainSource) -> Result<Resolution> {
        let local = self.chain();
        let resolver = ConsensusResolver::new(&self.trusted_genesis_hash, self.context());
        match resolver.resolve(&local, peers, source) {
            Resolution::Replaced(chain) => {
                if self.replace_chain(chain.clone())? {
                    Ok(Resolution::Replaced(chain))
                } else {
                    Ok(Resolution::Authoritative)
                }
            }
            Resolution::Authoritative => Ok(Resolution::Authoritative),
        }
    }
}
