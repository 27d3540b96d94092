//! Ed25519 signing for `QueryPlan`s and Time Capsule headers.
//!
//! Keypair generation, sign, verify, each returning a typed error rather
//! than panicking on malformed input.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid secret key bytes")]
    InvalidSecretKey,
}

/// An Ed25519 keypair whose secret bytes are held in `Zeroizing` storage
/// and wiped on drop.
pub struct KeyPair {
    pub public_key: VerifyingKey,
    secret: Zeroizing<[u8; 32]>,
}

impl KeyPair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self {
            public_key: signing_key.verifying_key(),
            secret: Zeroizing::new(signing_key.to_bytes()),
        }
    }

    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        Self {
            public_key: signing_key.verifying_key(),
            secret: Zeroizing::new(secret),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let signing_key = SigningKey::from_bytes(&self.secret);
        signing_key.sign(message)
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public_key.to_bytes()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {:?} }}", self.public_key)
    }
}

pub fn verify(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), SignatureError> {
    let pk_arr: [u8; 32] = public_key_bytes
        .try_into()
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let verifying_key =
        VerifyingKey::from_bytes(&pk_arr).map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig_arr: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| SignatureError::InvalidSignature)?;
    let signature = Signature::from_bytes(&sig_arr);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::InvalidSignature)
}
