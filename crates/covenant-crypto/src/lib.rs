pub mod aead;
pub mod canonical;
pub mod hash;
pub mod merkle;
pub mod signing;

pub use aead::{decrypt, encrypt, generate_data_key, unwrap_data_key, wrap_data_key, CryptoError};
pub use canonical::join_fields;
pub use hash::{hmac_sha256_bytes, hmac_sha256_hex, hmac_sha256_verify, sha256_bytes, sha256_hex};
pub use merkle::{verify_inclusion, MerkleTree};
pub use signing::{verify, KeyPair, SignatureError};
