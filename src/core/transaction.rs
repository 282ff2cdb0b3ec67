// Transactions follow the UTXO model: a standard transaction consumes outputs of
// earlier transactions and creates new ones, and whatever the inputs carry
// beyond the outputs is the fee. The coinbase variant mints the block reward.

use crate::core::{SignatureVerifier, Signer};
use crate::error::{LedgerError, Result};
use crate::utils::{canonical_json, serde_hex, sha256_hex};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use uuid::Uuid;

/// Pays `amount` to `recipient`. Never changes once created.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TransactionOutput {
    recipient: String,
    amount: u64,
}

impl TransactionOutput {
    pub fn new(recipient: &str, amount: u64) -> TransactionOutput {
        TransactionOutput {
            recipient: recipient.to_string(),
            amount,
        }
    }

    pub fn get_recipient(&self) -> &str {
        self.recipient.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }
}

/// Points at output `output_index` of the transaction hashed `transaction_hash`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TransactionInput {
    transaction_hash: String,
    output_index: usize,
}

impl TransactionInput {
    /// Fails with `InvalidIndex` unless `parent` actually has that output.
    pub fn new(parent: &Transaction, output_index: usize) -> Result<TransactionInput> {
        let transaction_hash = parent.hash()?;
        let available = parent.outputs().len();
        if output_index >= available {
            return Err(LedgerError::InvalidIndex {
                parent: transaction_hash,
                index: output_index,
                available,
            });
        }
        Ok(TransactionInput {
            transaction_hash,
            output_index,
        })
    }

    /// Builds a reference from its raw parts. Bounds are checked at verification.
    pub fn from_reference(transaction_hash: &str, output_index: usize) -> TransactionInput {
        TransactionInput {
            transaction_hash: transaction_hash.to_string(),
            output_index,
        }
    }

    pub fn get_transaction_hash(&self) -> &str {
        self.transaction_hash.as_str()
    }

    pub fn get_output_index(&self) -> usize {
        self.output_index
    }

    pub fn output_ref(&self) -> OutputRef {
        OutputRef::new(&self.transaction_hash, self.output_index)
    }
}

/// Ledger-wide identity of one output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
    pub transaction_hash: String,
    pub output_index: usize,
}

impl OutputRef {
    pub fn new(transaction_hash: &str, output_index: usize) -> OutputRef {
        OutputRef {
            transaction_hash: transaction_hash.to_string(),
            output_index,
        }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transaction_hash, self.output_index)
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    Standard {
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        fee: u64,
        #[serde(with = "serde_hex")]
        signature: Vec<u8>,
    },
    /// Unsigned and trusted only by its position at the head of a block.
    /// `salt` keeps two identical rewards from sharing a hash.
    Coinbase {
        outputs: Vec<TransactionOutput>,
        salt: String,
    },
}

// The part of a standard transaction the signature covers.
#[derive(Serialize)]
struct UnsignedBody<'a> {
    inputs: &'a [TransactionInput],
    outputs: &'a [TransactionOutput],
    fee: u64,
}

/// Anything that can look a transaction up by its hash.
pub trait TransactionSource {
    fn find_transaction(&self, hash: &str) -> Option<&Transaction>;
}

impl Transaction {
    pub fn coinbase(recipient: &str, amount: u64) -> Transaction {
        Transaction::Coinbase {
            outputs: vec![TransactionOutput::new(recipient, amount)],
            salt: Uuid::new_v4().to_string(),
        }
    }

    /// Builds and signs a transfer. Every input's parent must be known to
    /// `source`, and the outputs may not exceed what the inputs carry.
    pub fn create(
        signer: &dyn Signer,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        source: &dyn TransactionSource,
    ) -> Result<Transaction> {
        let mut input_total = 0u64;
        for input in &inputs {
            let (_, parent_output) = resolve_parent_output(source, input)?;
            input_total = checked_add(input_total, parent_output.amount, "inputs")?;
        }
        let output_total = sum_outputs(&outputs)?;
        if output_total > input_total {
            return Err(LedgerError::InsufficientFunds {
                required: output_total,
                available: input_total,
            });
        }
        let fee = input_total - output_total;

        let body = canonical_json(&UnsignedBody {
            inputs: &inputs,
            outputs: &outputs,
            fee,
        })?;
        let signature = signer.sign(&body)?;

        Ok(Transaction::Standard {
            inputs,
            outputs,
            fee,
            signature,
        })
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self, Transaction::Coinbase { .. })
    }

    pub fn inputs(&self) -> &[TransactionInput] {
        match self {
            Transaction::Standard { inputs, .. } => inputs,
            Transaction::Coinbase { .. } => &[],
        }
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        match self {
            Transaction::Standard { outputs, .. } | Transaction::Coinbase { outputs, .. } => {
                outputs
            }
        }
    }

    pub fn fee(&self) -> u64 {
        match self {
            Transaction::Standard { fee, .. } => *fee,
            Transaction::Coinbase { .. } => 0,
        }
    }

    pub fn signature(&self) -> Option<&[u8]> {
        match self {
            Transaction::Standard { signature, .. } => Some(signature),
            Transaction::Coinbase { .. } => None,
        }
    }

    /// The canonical bytes a signer commits to: inputs, outputs and fee.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        canonical_json(&UnsignedBody {
            inputs: self.inputs(),
            outputs: self.outputs(),
            fee: self.fee(),
        })
    }

    /// Content hash over the full serialized form, signature included.
    pub fn hash(&self) -> Result<String> {
        let bytes = canonical_json(self)?;
        Ok(sha256_hex(&[&bytes]))
    }

    pub fn output_total(&self) -> Result<u64> {
        sum_outputs(self.outputs())
    }
}

/// Sum of the fees of `transactions`, guarding against overflow.
pub fn total_fees<'a, I>(transactions: I) -> Result<u64>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .try_fold(0u64, |acc, tx| checked_add(acc, tx.fee(), "fees"))
}

fn sum_outputs(outputs: &[TransactionOutput]) -> Result<u64> {
    outputs
        .iter()
        .try_fold(0u64, |acc, out| checked_add(acc, out.amount, "outputs"))
}

fn checked_add(acc: u64, amount: u64, context: &str) -> Result<u64> {
    acc.checked_add(amount)
        .ok_or_else(|| LedgerError::AmountOverflow {
            context: context.to_string(),
        })
}

/// Looks up the parent transaction of `input` and the output it points at.
pub fn resolve_parent_output<'s>(
    source: &'s dyn TransactionSource,
    input: &TransactionInput,
) -> Result<(&'s Transaction, &'s TransactionOutput)> {
    let parent = source
        .find_transaction(&input.transaction_hash)
        .ok_or_else(|| LedgerError::MissingParent {
            parent: input.transaction_hash.clone(),
        })?;
    let available = parent.outputs().len();
    let output = parent
        .outputs()
        .get(input.output_index)
        .ok_or_else(|| LedgerError::InvalidIndex {
            parent: input.transaction_hash.clone(),
            index: input.output_index,
            available,
        })?;
    Ok((parent, output))
}

/// Checks transactions against a transaction source and a signature verifier.
/// Transactions that already passed are remembered, so shared ancestry is only
/// walked once per verifier.
///
/// Ancestors are walked depth-first on an explicit stack, so arbitrarily long
/// spend chains verify without growing the call stack. Each input's parent is
/// verified before the input is counted, and a failure anywhere above is
/// reported as [`LedgerError::InvalidAncestor`] once per level it crosses.
pub struct TransactionVerifier<'a> {
    source: &'a dyn TransactionSource,
    signatures: &'a dyn SignatureVerifier,
    verified: HashSet<String>,
}

// A transaction whose inputs are being walked.
struct Frame<'t> {
    transaction: &'t Transaction,
    hash: String,
    next_input: usize,
    owners: BTreeSet<String>,
    input_total: u64,
}

impl<'t> Frame<'t> {
    fn new(transaction: &'t Transaction, hash: &str) -> Frame<'t> {
        Frame {
            transaction,
            hash: hash.to_string(),
            next_input: 0,
            owners: BTreeSet::new(),
            input_total: 0,
        }
    }

    fn current_parent(&self) -> &'t str {
        let transaction = self.transaction;
        transaction
            .inputs()
            .get(self.next_input)
            .map(TransactionInput::get_transaction_hash)
            .unwrap_or_default()
    }
}

enum Step<'t> {
    Descend(Frame<'t>),
    Advance,
    Finished,
    // The parent behind the current input is unusable.
    AncestorFailed(LedgerError),
}

impl<'a> TransactionVerifier<'a> {
    pub fn new(
        source: &'a dyn TransactionSource,
        signatures: &'a dyn SignatureVerifier,
    ) -> TransactionVerifier<'a> {
        TransactionVerifier {
            source,
            signatures,
            verified: HashSet::new(),
        }
    }

    pub fn verify(&mut self, transaction: &Transaction) -> Result<()> {
        let hash = transaction.hash()?;
        if !self.needs_visit(transaction, &hash)? {
            return Ok(());
        }

        let mut stack = vec![Frame::new(transaction, &hash)];
        while let Some(frame) = stack.last_mut() {
            let current = frame.transaction;
            let step = match current.inputs().get(frame.next_input) {
                Some(input) => self.visit_input(frame, input),
                None => Ok(Step::Finished),
            };
            match step {
                Ok(Step::Descend(parent)) => stack.push(parent),
                Ok(Step::Advance) => {}
                Ok(Step::AncestorFailed(e)) => return Err(unwind(&stack, e)),
                Ok(Step::Finished) => {
                    if let Some(done) = stack.pop() {
                        self.finish(&done).map_err(|e| unwind(&stack, e))?;
                        debug!("Transaction {} verified", done.hash);
                        self.verified.insert(done.hash);
                    }
                }
                Err(e) => {
                    stack.pop();
                    return Err(unwind(&stack, e));
                }
            }
        }
        Ok(())
    }

    // Coinbases and remembered transactions need no walk.
    fn needs_visit(&self, transaction: &Transaction, hash: &str) -> Result<bool> {
        // Coinbase trust is positional; the block verifier checks the position.
        if transaction.is_coinbase() || self.verified.contains(hash) {
            return Ok(false);
        }
        if transaction.inputs().is_empty() {
            return Err(LedgerError::EmptyInputs {
                transaction: hash.to_string(),
            });
        }
        Ok(true)
    }

    fn visit_input<'t>(
        &self,
        frame: &mut Frame<'t>,
        input: &'t TransactionInput,
    ) -> Result<Step<'t>>
    where
        'a: 't,
    {
        let source = self.source;
        let parent_hash = input.get_transaction_hash();
        let parent = match source.find_transaction(parent_hash) {
            Some(parent) => parent,
            None => {
                return Ok(Step::AncestorFailed(LedgerError::MissingParent {
                    parent: parent_hash.to_string(),
                }))
            }
        };
        match self.needs_visit(parent, parent_hash) {
            Ok(true) => return Ok(Step::Descend(Frame::new(parent, parent_hash))),
            Ok(false) => {}
            Err(e) => return Ok(Step::AncestorFailed(e)),
        }

        let parent_output = match resolve_parent_output(source, input) {
            Ok((_, output)) => output,
            Err(e) => return Ok(Step::AncestorFailed(e)),
        };
        frame.owners.insert(parent_output.get_recipient().to_string());
        frame.input_total = checked_add(frame.input_total, parent_output.get_amount(), "inputs")?;
        frame.next_input += 1;
        Ok(Step::Advance)
    }

    // Ownership, signature and amounts, once every parent has passed.
    fn finish(&self, frame: &Frame<'_>) -> Result<()> {
        let (declared_fee, signature) = match frame.transaction {
            Transaction::Coinbase { .. } => return Ok(()),
            Transaction::Standard { fee, signature, .. } => (*fee, signature.as_slice()),
        };
        let hash = frame.hash.as_str();

        if frame.owners.len() != 1 {
            warn!(
                "Transaction {hash} mixes inputs from {} owners",
                frame.owners.len()
            );
            return Err(LedgerError::MultiOwnerInputs {
                transaction: hash.to_string(),
                owners: frame.owners.iter().cloned().collect(),
            });
        }
        let owner = frame
            .owners
            .iter()
            .next()
            .map(String::as_str)
            .unwrap_or_default();

        let body = frame.transaction.signing_bytes()?;
        if !self.signatures.verify(owner, &body, signature) {
            warn!("Transaction {hash} carries a bad signature for {owner}");
            return Err(LedgerError::InvalidSignature {
                transaction: hash.to_string(),
            });
        }

        let output_total = frame.transaction.output_total()?;
        if output_total > frame.input_total {
            return Err(LedgerError::InsufficientFunds {
                required: output_total,
                available: frame.input_total,
            });
        }
        let actual_fee = frame.input_total - output_total;
        if actual_fee != declared_fee {
            return Err(LedgerError::FeeMismatch {
                transaction: hash.to_string(),
                declared: declared_fee,
                actual: actual_fee,
            });
        }
        Ok(())
    }
}

// Wraps `err` once per frame still on the stack, the top frame innermost.
fn unwind(stack: &[Frame<'_>], err: LedgerError) -> LedgerError {
    stack
        .iter()
        .rev()
        .fold(err, |source, frame| LedgerError::InvalidAncestor {
            transaction: frame.hash.clone(),
            parent: frame.current_parent().to_string(),
            source: Box::new(source),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionIndex;
    use crate::wallet::{EcdsaVerifier, Wallet};

    struct Fixture {
        alice: Wallet,
        bob: Wallet,
        funding: Transaction,
    }

    fn fixture() -> Fixture {
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();
        let funding = Transaction::coinbase(&alice.get_address(), 100);
        Fixture {
            alice,
            bob,
            funding,
        }
    }

    fn index_of(transactions: &[&Transaction]) -> TransactionIndex<'static> {
        let mut index = TransactionIndex::new();
        for tx in transactions {
            index.insert_owned((*tx).clone()).unwrap();
        }
        index
    }

    #[test]
    fn test_input_construction_checks_index() {
        let f = fixture();
        assert!(TransactionInput::new(&f.funding, 0).is_ok());
        let err = TransactionInput::new(&f.funding, 1).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidIndex { index: 1, available: 1, .. }));
    }

    #[test]
    fn test_create_computes_fee_and_verifies() {
        let f = fixture();
        let index = index_of(&[&f.funding]);
        let tx = Transaction::create(
            &f.alice,
            vec![TransactionInput::new(&f.funding, 0).unwrap()],
            vec![TransactionOutput::new(&f.bob.get_address(), 90)],
            &index,
        )
        .unwrap();

        assert_eq!(tx.fee(), 10);
        assert!(!tx.is_coinbase());

        let verifier = EcdsaVerifier;
        let mut checker = TransactionVerifier::new(&index, &verifier);
        assert_eq!(checker.verify(&tx), Ok(()));
    }

    #[test]
    fn test_create_rejects_overspend() {
        let f = fixture();
        let index = index_of(&[&f.funding]);
        let err = Transaction::create(
            &f.alice,
            vec![TransactionInput::new(&f.funding, 0).unwrap()],
            vec![TransactionOutput::new(&f.bob.get_address(), 101)],
            &index,
        )
        .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                required: 101,
                available: 100
            }
        );
    }

    #[test]
    fn test_create_requires_known_parent() {
        let f = fixture();
        let empty = TransactionIndex::new();
        let err = Transaction::create(
            &f.alice,
            vec![TransactionInput::new(&f.funding, 0).unwrap()],
            vec![],
            &empty,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::MissingParent { .. }));
    }

    #[test]
    fn test_flipping_any_signature_byte_fails() {
        let f = fixture();
        let index = index_of(&[&f.funding]);
        let tx = Transaction::create(
            &f.alice,
            vec![TransactionInput::new(&f.funding, 0).unwrap()],
            vec![TransactionOutput::new(&f.bob.get_address(), 60)],
            &index,
        )
        .unwrap();
        let verifier = EcdsaVerifier;

        let signature_len = tx.signature().map(|s| s.len()).unwrap_or_default();
        assert!(signature_len > 0);
        for position in 0..signature_len {
            let mut tampered = tx.clone();
            if let Transaction::Standard { signature, .. } = &mut tampered {
                signature[position] ^= 0x01;
            }
            let mut checker = TransactionVerifier::new(&index, &verifier);
            let err = checker.verify(&tampered).unwrap_err();
            assert!(
                matches!(err, LedgerError::InvalidSignature { .. }),
                "byte {position}: {err}"
            );
        }
    }

    #[test]
    fn test_signature_from_wrong_owner_fails() {
        let f = fixture();
        let index = index_of(&[&f.funding]);
        // Bob signs a spend of Alice's output.
        let tx = Transaction::create(
            &f.bob,
            vec![TransactionInput::new(&f.funding, 0).unwrap()],
            vec![TransactionOutput::new(&f.bob.get_address(), 100)],
            &index,
        )
        .unwrap();
        let verifier = EcdsaVerifier;
        let mut checker = TransactionVerifier::new(&index, &verifier);
        assert!(matches!(
            checker.verify(&tx),
            Err(LedgerError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_multi_owner_inputs_rejected() {
        let f = fixture();
        let bobs_funding = Transaction::coinbase(&f.bob.get_address(), 50);
        let index = index_of(&[&f.funding, &bobs_funding]);
        let tx = Transaction::create(
            &f.alice,
            vec![
                TransactionInput::new(&f.funding, 0).unwrap(),
                TransactionInput::new(&bobs_funding, 0).unwrap(),
            ],
            vec![TransactionOutput::new(&f.alice.get_address(), 150)],
            &index,
        )
        .unwrap();
        let verifier = EcdsaVerifier;
        let mut checker = TransactionVerifier::new(&index, &verifier);
        match checker.verify(&tx) {
            Err(LedgerError::MultiOwnerInputs { owners, .. }) => assert_eq!(owners.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_declared_fee_must_match() {
        let f = fixture();
        let index = index_of(&[&f.funding]);
        let tx = Transaction::create(
            &f.alice,
            vec![TransactionInput::new(&f.funding, 0).unwrap()],
            vec![TransactionOutput::new(&f.bob.get_address(), 90)],
            &index,
        )
        .unwrap();

        // Re-sign a body that claims a larger fee than the inputs leave over.
        let (inputs, outputs) = (tx.inputs().to_vec(), tx.outputs().to_vec());
        let inflated = Transaction::Standard {
            inputs: inputs.clone(),
            outputs: outputs.clone(),
            fee: 15,
            signature: vec![],
        };
        let signature = f.alice.sign(&inflated.signing_bytes().unwrap()).unwrap();
        let inflated = Transaction::Standard {
            inputs,
            outputs,
            fee: 15,
            signature,
        };

        let verifier = EcdsaVerifier;
        let mut checker = TransactionVerifier::new(&index, &verifier);
        assert!(matches!(
            checker.verify(&inflated),
            Err(LedgerError::FeeMismatch {
                declared: 15,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_parent_is_invalid_ancestor() {
        let f = fixture();
        let index = index_of(&[&f.funding]);
        let child = Transaction::create(
            &f.alice,
            vec![TransactionInput::new(&f.funding, 0).unwrap()],
            vec![TransactionOutput::new(&f.bob.get_address(), 100)],
            &index,
        )
        .unwrap();
        let mut tampered_child = child.clone();
        if let Transaction::Standard { signature, .. } = &mut tampered_child {
            signature[0] ^= 0xff;
        }
        let index = index_of(&[&f.funding, &tampered_child]);
        let grandchild = Transaction::create(
            &f.bob,
            vec![TransactionInput::new(&tampered_child, 0).unwrap()],
            vec![TransactionOutput::new(&f.alice.get_address(), 100)],
            &index,
        )
        .unwrap();

        let verifier = EcdsaVerifier;
        let mut checker = TransactionVerifier::new(&index, &verifier);
        let err = checker.verify(&grandchild).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAncestor { .. }));
        assert!(matches!(
            err.root_cause(),
            LedgerError::InvalidSignature { .. }
        ));
    }

    #[test]
    fn test_out_of_range_output_is_invalid_ancestor() {
        let f = fixture();
        let index = index_of(&[&f.funding]);
        let funding_hash = f.funding.hash().unwrap();
        let tx = Transaction::Standard {
            inputs: vec![TransactionInput::from_reference(&funding_hash, 3)],
            outputs: vec![TransactionOutput::new(&f.bob.get_address(), 10)],
            fee: 0,
            signature: vec![],
        };

        let verifier = EcdsaVerifier;
        let mut checker = TransactionVerifier::new(&index, &verifier);
        match checker.verify(&tx).unwrap_err() {
            LedgerError::InvalidAncestor { parent, source, .. } => {
                assert_eq!(parent, funding_hash);
                assert_eq!(
                    *source,
                    LedgerError::InvalidIndex {
                        parent: funding_hash.clone(),
                        index: 3,
                        available: 1,
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct AcceptAll;

    impl SignatureVerifier for AcceptAll {
        fn verify(&self, _address: &str, _message: &[u8], _signature: &[u8]) -> bool {
            true
        }
    }

    struct Unsigned(&'static str);

    impl Signer for Unsigned {
        fn address(&self) -> String {
            self.0.to_string()
        }

        fn sign(&self, _message: &[u8]) -> Result<Vec<u8>> {
            Ok(vec![])
        }
    }

    // Each transaction spends the single output of the one before it.
    fn spend_chain(length: usize) -> Vec<Transaction> {
        let mut index = TransactionIndex::new();
        let mut chain = vec![Transaction::coinbase("alice", 100)];
        index.insert_owned(chain[0].clone()).unwrap();
        for _ in 0..length {
            let previous = &chain[chain.len() - 1];
            let next = Transaction::create(
                &Unsigned("alice"),
                vec![TransactionInput::new(previous, 0).unwrap()],
                vec![TransactionOutput::new("alice", 100)],
                &index,
            )
            .unwrap();
            index.insert_owned(next.clone()).unwrap();
            chain.push(next);
        }
        chain
    }

    #[test]
    fn test_long_spend_chain_verifies() {
        let chain = spend_chain(30_000);
        let index = index_of(&chain.iter().collect::<Vec<_>>());
        let verifier = AcceptAll;
        let mut checker = TransactionVerifier::new(&index, &verifier);
        assert_eq!(checker.verify(&chain[chain.len() - 1]), Ok(()));
    }

    #[test]
    fn test_missing_root_is_wrapped_once_per_level() {
        let chain = spend_chain(4);
        // Everything but the coinbase at the root.
        let index = index_of(&chain[1..].iter().collect::<Vec<_>>());
        let verifier = AcceptAll;
        let mut checker = TransactionVerifier::new(&index, &verifier);

        let mut err = checker.verify(&chain[4]).unwrap_err();
        for level in (1..=4).rev() {
            err = match err {
                LedgerError::InvalidAncestor {
                    transaction,
                    parent,
                    source,
                } => {
                    assert_eq!(transaction, chain[level].hash().unwrap());
                    assert_eq!(parent, chain[level - 1].hash().unwrap());
                    *source
                }
                other => panic!("level {level}: unexpected error {other}"),
            };
        }
        assert_eq!(
            err,
            LedgerError::MissingParent {
                parent: chain[0].hash().unwrap()
            }
        );
    }

    #[test]
    fn test_hash_covers_signature_but_signing_bytes_do_not() {
        let f = fixture();
        let index = index_of(&[&f.funding]);
        let build = || {
            Transaction::create(
                &f.alice,
                vec![TransactionInput::new(&f.funding, 0).unwrap()],
                vec![TransactionOutput::new(&f.bob.get_address(), 40)],
                &index,
            )
            .unwrap()
        };
        // ECDSA signatures are randomized, so two signings differ.
        let first = build();
        let second = build();
        assert_eq!(first.signing_bytes().unwrap(), second.signing_bytes().unwrap());
        assert_ne!(first.hash().unwrap(), second.hash().unwrap());
    }

    #[test]
    fn test_coinbase_shape() {
        let coinbase = Transaction::coinbase("miner", 25);
        assert!(coinbase.is_coinbase());
        assert!(coinbase.inputs().is_empty());
        assert_eq!(coinbase.outputs().len(), 1);
        assert_eq!(coinbase.fee(), 0);
        assert!(coinbase.signature().is_none());
        assert_ne!(
            coinbase.hash().unwrap(),
            Transaction::coinbase("miner", 25).hash().unwrap()
        );
    }

    #[test]
    fn test_json_wire_form_round_trips() {
        let coinbase = Transaction::coinbase("miner", 25);
        let json = serde_json::to_string(&coinbase).unwrap();
        assert!(json.starts_with(r#"{"type":"coinbase""#));
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hash().unwrap(), coinbase.hash().unwrap());
    }
}
