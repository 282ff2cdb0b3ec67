//! Wallet management and signing
//!
//! ECDSA P-256 wallets that sign transactions for the ledger, the matching
//! signature verifier, and a file-backed wallet store.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{validate_address, EcdsaVerifier, Wallet, PUBLIC_KEY_LEN};
pub use wallets::{Wallets, WALLET_FILE};
