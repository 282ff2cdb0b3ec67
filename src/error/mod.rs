//! Error handling for the ledger
//!
//! Every verification failure is a categorical variant that names the block
//! and/or transaction it happened in, so a rejected chain can be traced
//! without re-running the check.

use crate::core::OutputRef;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Transaction {transaction} spends outputs owned by several addresses: {owners:?}")]
    MultiOwnerInputs {
        transaction: String,
        owners: Vec<String>,
    },

    #[error("Transaction {transaction} has an invalid signature")]
    InvalidSignature { transaction: String },

    #[error("Transaction {transaction} has an invalid ancestor {parent}: {source}")]
    InvalidAncestor {
        transaction: String,
        parent: String,
        #[source]
        source: Box<LedgerError>,
    },

    #[error("Parent transaction {parent} not found")]
    MissingParent { parent: String },

    #[error("Output index {index} out of range for transaction {parent} ({available} outputs)")]
    InvalidIndex {
        parent: String,
        index: usize,
        available: usize,
    },

    #[error("Transaction {transaction} has no inputs")]
    EmptyInputs { transaction: String },

    #[error("Transaction {transaction} declares fee {declared}, inputs minus outputs is {actual}")]
    FeeMismatch {
        transaction: String,
        declared: u64,
        actual: u64,
    },

    #[error("Amount overflow while summing {context}")]
    AmountOverflow { context: String },

    #[error("Block {block} failed proof-of-work: {reason}")]
    BadProofOfWork { block: String, reason: String },

    #[error("Block {block} contains invalid transaction #{index}: {source}")]
    InvalidTransaction {
        block: String,
        index: usize,
        #[source]
        source: Box<LedgerError>,
    },

    #[error("Block {block} double-spends output {output} in transaction {transaction}")]
    DoubleSpend {
        block: String,
        transaction: String,
        output: OutputRef,
    },

    #[error("Block {block} has an invalid ancestor: {source}")]
    BrokenAncestry {
        block: String,
        #[source]
        source: Box<LedgerError>,
    },

    #[error("Block {block} points at {found:?} but its ancestor is {expected}")]
    BrokenLink {
        block: String,
        expected: String,
        found: Option<String>,
    },

    #[error("Chain bottoms out at {found}, expected trusted genesis {expected}")]
    GenesisMismatch { expected: String, found: String },

    #[error("Block {block} does not start with a single-output coinbase")]
    MissingCoinbase { block: String },

    #[error("Block {block} coinbase pays {actual}, expected {expected}")]
    WrongRewardAmount {
        block: String,
        expected: u64,
        actual: u64,
    },

    #[error("Block {block} has a coinbase at position {index}")]
    ExtraCoinbase { block: String, index: usize },

    #[error("Chain tip moved from {expected} to {actual} while mining")]
    StaleTip { expected: String, actual: String },

    #[error("Mining was cancelled")]
    MiningCancelled,

    #[error("A chain needs at least one block")]
    EmptyChain,

    #[error("Peer reported length {reported} but sent {actual} blocks")]
    SnapshotLengthMismatch { reported: usize, actual: usize },

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),
}

impl LedgerError {
    /// Strips the ancestry and containment wrappers down to the failure that
    /// actually triggered the rejection.
    pub fn root_cause(&self) -> &LedgerError {
        match self {
            LedgerError::BrokenAncestry { source, .. }
            | LedgerError::InvalidAncestor { source, .. }
            | LedgerError::InvalidTransaction { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
