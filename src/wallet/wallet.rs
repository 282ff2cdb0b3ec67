use crate::core::{SignatureVerifier, Signer};
use crate::error::{LedgerError, Result};
use crate::utils::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, hex_decode, hex_encode,
};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde::{Deserialize, Serialize};

/// Length of an uncompressed P-256 public key.
pub const PUBLIC_KEY_LEN: usize = 65;

/// An ECDSA P-256 key pair. The address is the hex-encoded public key, so a
/// signature can be checked from the address alone.
#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = crate::utils::new_key_pair()?;
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .map_err(|e| {
                    LedgerError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
                })?;
        let public_key = key_pair.public_key().as_ref().to_vec();
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn get_address(&self) -> String {
        hex_encode(&self.public_key)
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }
}

impl Signer for Wallet {
    fn address(&self) -> String {
        self.get_address()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        ecdsa_p256_sha256_sign_digest(&self.pkcs8, message)
    }
}

pub fn validate_address(address: &str) -> bool {
    match hex_decode(address) {
        Ok(key) => key.len() == PUBLIC_KEY_LEN && key[0] == 0x04,
        Err(_) => false,
    }
}

/// Checks ECDSA P-256 signatures against hex public-key addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl SignatureVerifier for EcdsaVerifier {
    fn verify(&self, address: &str, message: &[u8], signature: &[u8]) -> bool {
        match hex_decode(address) {
            Ok(public_key) => ecdsa_p256_sha256_sign_verify(&public_key, signature, message),
            Err(_) => false,
        }
    }
}
