//! # Hashlink Ledger
//!
//! A proof-of-work ledger of UTXO transactions. Blocks are linked by hash,
//! every transaction is signed by the owner of the outputs it spends, and
//! nodes settle disagreements by adopting the longest chain that verifies
//! against their trusted genesis block.
//!
//! ## Layout
//! - `core/`: transactions, blocks, the chain arena, verification, consensus
//!   and the [`Ledger`] that owns chain and pending pool
//! - `wallet/`: ECDSA key pairs that sign transactions, and their verifier
//! - `network/`: JSON-over-TCP requests between nodes
//! - `storage/`: the pending pool and sled persistence
//! - `config/`: settings from `ledger.toml` and the environment
//! - `utils/`: hashing, hex and serialization helpers
//! - `cli/`: command-line parsing for the binary

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use cli::{Command, Opt};
pub use config::{Config, Settings, GLOBAL_CONFIG};
pub use core::{
    balance, select_inputs, verify_block, verify_chain, Block, BlockTemplate, CancellationToken,
    Chain, ChainSnapshot, CoinSelection, ConsensusResolver, Ledger, LedgerParams, MineOptions,
    OutputRef, PeerChainSource, ProofOfWork, ProofTarget, Resolution, SignatureVerifier, Signer,
    Transaction, TransactionIndex, TransactionInput, TransactionOutput, TransactionSource,
    TransactionVerifier, UsedOutputs, VerifyContext, BLOCK_INCENTIVE,
};
pub use error::{LedgerError, Result};
pub use network::{Node, Nodes, Server, TcpPeerSource};
pub use storage::{ChainStore, MemoryPool};
pub use wallet::{validate_address, EcdsaVerifier, Wallet, Wallets};
