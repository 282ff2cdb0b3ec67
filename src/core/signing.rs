//! Key custody seams
//!
//! The ledger never holds keys. It asks a [`Signer`] to sign canonical bytes
//! and a [`SignatureVerifier`] to check them against an address.

use crate::error::Result;

/// A signing capability bound to exactly one address.
pub trait Signer {
    fn address(&self) -> String;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, address: &str, message: &[u8], signature: &[u8]) -> bool;
}
