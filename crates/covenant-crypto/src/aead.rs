//! AES-256-GCM encryption for Time Capsule payloads, plus RSA-OAEP key
//! wrap so a per-capsule data key can be delivered alongside ciphertext
//! the originating device could not otherwise decrypt later.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("key wrap failed")]
    KeyWrapFailed,
    #[error("key unwrap failed")]
    KeyUnwrapFailed,
}

/// A fresh random 256-bit AES key and 96-bit nonce, generated once per
/// Time Capsule.
pub fn generate_data_key() -> ([u8; 32], [u8; 12]) {
    let mut key = [0u8; 32];
    let mut nonce = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut key);
    rand::thread_rng().fill_bytes(&mut nonce);
    (key, nonce)
}

pub fn encrypt(key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)
}

pub fn decrypt(key: &[u8; 32], nonce: &[u8; 12], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Wraps a capsule's AES data key under the orchestrator's RSA-OAEP
/// public key, so the sealed key can travel alongside ciphertext the
/// device that produced it can no longer read.
pub fn wrap_data_key(public_key: &RsaPublicKey, data_key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let mut rng = rand::thread_rng();
    public_key
        .encrypt(&mut rng, Oaep::new::<sha2::Sha256>(), data_key)
        .map_err(|_| CryptoError::KeyWrapFailed)
}

pub fn unwrap_data_key(
    private_key: &RsaPrivateKey,
    wrapped: &[u8],
) -> Result<[u8; 32], CryptoError> {
    let bytes = private_key
        .decrypt(Oaep::new::<sha2::Sha256>(), wrapped)
        .map_err(|_| CryptoError::KeyUnwrapFailed)?;
    bytes.try_into().map_err(|_| CryptoError::KeyUnwrapFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPublicKey;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let (key, nonce) = generate_data_key();
        let plaintext = b"zip=94110;age_bracket=30-39";
        let ciphertext = encrypt(&key, &nonce, plaintext).unwrap();
        assert_ne!(ciphertext, plaintext);
        assert_eq!(decrypt(&key, &nonce, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let (key, nonce) = generate_data_key();
        let mut ciphertext = encrypt(&key, &nonce, b"payload").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(decrypt(&key, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn key_wrap_round_trip() {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let (data_key, _) = generate_data_key();

        let wrapped = wrap_data_key(&public_key, &data_key).unwrap();
        let unwrapped = unwrap_data_key(&private_key, &wrapped).unwrap();
        assert_eq!(data_key, unwrapped);
        // sanity: public key is encodable, matching how it is persisted
        assert!(public_key.to_pkcs1_der().is_ok());
    }
}
