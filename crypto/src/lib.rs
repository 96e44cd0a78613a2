//! Tecra Cryptography
//!
//! ed25519 key pairs for wallet addresses and tnode signing keys

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Prefix of every Tecra address
pub const ADDRESS_PREFIX: &str = "TCR1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid private key")]
    InvalidPrivateKey,
}

#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate new random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Address paying to this key
    pub fn address(&self) -> String {
        address_from_bytes(self.verifying_key.as_bytes())
    }

    /// Create keypair from private key hex
    pub fn from_private_key_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| CryptoError::InvalidPrivateKey)?;

        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidPrivateKey)?;

        let signing_key = SigningKey::from_bytes(&key_bytes);
        let verifying_key = signing_key.verifying_key();

        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    /// Verify `signature_bytes` over `message` against a hex public key
    pub fn verify(public_key_hex: &str, message: &[u8], signature_bytes: &[u8]) -> Result<(), CryptoError> {
        let pub_key_bytes = hex::decode(public_key_hex).map_err(|_| CryptoError::InvalidPublicKey)?;

        let pub_key_array: [u8; 32] = pub_key_bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;

        let verifying_key = VerifyingKey::from_bytes(&pub_key_array).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig_array: [u8; 64] = signature_bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;

        let signature = Signature::from_bytes(&sig_array);

        verifying_key
            .verify(message, &signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }
}

fn address_from_bytes(public_key: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(public_key));
    format!("{}{}", ADDRESS_PREFIX, &digest[..40])
}
