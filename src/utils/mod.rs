//! Utility functions and helpers
//!
//! Hashing, signing primitives, hex, and the two serialization formats
//! used throughout the ledger.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, hex_decode, hex_encode,
    new_key_pair, sha256_hex,
};

pub use serialization::{canonical_json, deserialize, serde_hex, serialize};
