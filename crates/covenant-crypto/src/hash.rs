use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 of arbitrary bytes, hex-encoded — the hash function every
/// `Hash32Hex` field in the data model is computed with.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_bytes(data))
}

pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// HMAC-SHA-256 over `data` keyed with `key`, hex-encoded. Used to sign
/// policy-rule bundles and canonical scope/purpose hashes where the
/// signer and verifier share a symmetric key rather than a keypair.
pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256_bytes(key, data))
}

pub fn hmac_sha256_bytes(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts key of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Verifies an HMAC tag in constant time. Always prefer this over
/// re-computing and comparing with `==`, which short-circuits on the
/// first differing byte.
pub fn hmac_sha256_verify(key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    let expected = hmac_sha256_bytes(key, data);
    if expected.len() != tag.len() {
        return false;
    }
    expected.ct_eq(tag).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_deterministic() {
        assert_eq!(sha256_hex(b"covenant"), sha256_hex(b"covenant"));
        assert_ne!(sha256_hex(b"covenant"), sha256_hex(b"covenant2"));
    }

    #[test]
    fn hmac_round_trip_verifies() {
        let key = b"policy-signing-key";
        let tag = hmac_sha256_bytes(key, b"payload");
        assert!(hmac_sha256_verify(key, b"payload", &tag));
        assert!(!hmac_sha256_verify(key, b"tampered", &tag));
    }
}
