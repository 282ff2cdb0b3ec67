use crate::error::{LedgerError, Result};
use crate::utils::{hex_decode, sha256_hex};
use log::{debug, info};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::ops::ShlAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Canonical number of marker characters a block hash must start with.
pub const DIFFICULTY: usize = 2;

/// Marker character of the default hex-prefix target.
pub const DEFAULT_MARKER: char = '1';

// How many nonces are tried between two looks at the cancellation flag.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// The predicate a block hash has to satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProofTarget {
    /// Hex digest starts with `difficulty` copies of `marker`.
    HexPrefix { marker: char, difficulty: usize },
    /// Digest read as a big-endian integer is below `2^(256 - bits)`.
    LeadingZeroBits { bits: u32 },
}

impl Default for ProofTarget {
    fn default() -> Self {
        ProofTarget::HexPrefix {
            marker: DEFAULT_MARKER,
            difficulty: DIFFICULTY,
        }
    }
}

impl ProofTarget {
    pub fn is_met(&self, hash_hex: &str) -> bool {
        match self {
            ProofTarget::HexPrefix { marker, difficulty } => {
                hash_hex.len() >= *difficulty
                    && hash_hex.chars().take(*difficulty).all(|c| c == *marker)
            }
            ProofTarget::LeadingZeroBits { bits } => {
                let digest = match hex_decode(hash_hex) {
                    Ok(digest) => digest,
                    Err(_) => return false,
                };
                BigUint::from_bytes_be(&digest) < Self::bits_target(*bits)
            }
        }
    }

    fn bits_target(bits: u32) -> BigUint {
        let mut target = BigUint::from(1u32);
        target.shl_assign(256u32.saturating_sub(bits));
        target
    }

    pub fn describe(&self) -> String {
        match self {
            ProofTarget::HexPrefix { marker, difficulty } => {
                format!("prefix {}", marker.to_string().repeat(*difficulty))
            }
            ProofTarget::LeadingZeroBits { bits } => format!("{bits} leading zero bits"),
        }
    }
}

/// Shared flag a caller flips to abandon a running proof-of-work search.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

pub struct ProofOfWork<'a> {
    content: &'a [u8],
    target: &'a ProofTarget,
}

impl<'a> ProofOfWork<'a> {
    pub fn new(content: &'a [u8], target: &'a ProofTarget) -> ProofOfWork<'a> {
        ProofOfWork { content, target }
    }

    /// The digest of the content followed by the decimal nonce.
    pub fn hash_with_nonce(content: &[u8], nonce: u64) -> String {
        sha256_hex(&[content, nonce.to_string().as_bytes()])
    }

    pub fn validate(content: &[u8], nonce: u64, hash: &str, target: &ProofTarget) -> bool {
        Self::hash_with_nonce(content, nonce) == hash && target.is_met(hash)
    }

    /// Tries nonces 0, 1, 2, ... in order until the target is met.
    pub fn run(&self, cancel: &CancellationToken) -> Result<(u64, String)> {
        debug!("Mining against {}", self.target.describe());
        let mut nonce: u64 = 0;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                info!("Proof-of-work abandoned after {nonce} attempts");
                return Err(LedgerError::MiningCancelled);
            }
            let hash = Self::hash_with_nonce(self.content, nonce);
            if self.target.is_met(&hash) {
                debug!("Found nonce {nonce}: {hash}");
                return Ok((nonce, hash));
            }
            nonce = nonce.wrapping_add(1);
        }
    }
}
