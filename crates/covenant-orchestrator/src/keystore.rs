//! Process-local key store (§4.4 expansion): one mutex guards every
//! capsule data key and the Ed25519 plan-signing keypair, keyed by
//! `keyId`. Crypto-shred and the sweeper both act through this single
//! store, so "key removed" has one testable meaning platform-wide —
//! lookups after removal return `KeyDestroyed` and stay destroyed even
//! if the same `keyId` string were ever reused.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use covenant_crypto::KeyPair;
use covenant_state::StateDb;

use crate::error::OrchestratorError;

enum StoredKey {
    DataKey { key: [u8; 32], nonce: [u8; 12] },
    SigningKey(KeyPair),
}

pub struct KeyStore {
    db: Arc<StateDb>,
    keys: Mutex<HashMap<String, StoredKey>>,
}

impl KeyStore {
    /// The `destroyed` set itself lives in `destroyed_keys_registry`
    /// (§6) so a shred survives process restart even though the key
    /// material it destroyed never did.
    pub fn new(db: Arc<StateDb>) -> Self {
        Self {
            db,
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_data_key(&self, key_id: &str, key: [u8; 32], nonce: [u8; 12]) {
        let mut keys = self.keys.lock().expect("key store mutex poisoned");
        keys.insert(key_id.to_string(), StoredKey::DataKey { key, nonce });
    }

    pub fn register_signing_key(&self, key_id: &str, keypair: KeyPair) {
        let mut keys = self.keys.lock().expect("key store mutex poisoned");
        keys.insert(key_id.to_string(), StoredKey::SigningKey(keypair));
    }

    fn check_destroyed(&self, key_id: &str) -> Result<(), OrchestratorError> {
        if self.db.is_key_destroyed(key_id)? {
            return Err(OrchestratorError::KeyDestroyed(key_id.to_string()));
        }
        Ok(())
    }

    pub fn get_data_key(&self, key_id: &str) -> Result<([u8; 32], [u8; 12]), OrchestratorError> {
        self.check_destroyed(key_id)?;
        let keys = self.keys.lock().expect("key store mutex poisoned");
        match keys.get(key_id) {
            Some(StoredKey::DataKey { key, nonce }) => Ok((*key, *nonce)),
            _ => Err(OrchestratorError::KeyNotFound(key_id.to_string())),
        }
    }

    pub fn sign_with(&self, key_id: &str, message: &[u8]) -> Result<Vec<u8>, OrchestratorError> {
        self.check_destroyed(key_id)?;
        let keys = self.keys.lock().expect("key store mutex poisoned");
        match keys.get(key_id) {
            Some(StoredKey::SigningKey(keypair)) => Ok(keypair.sign(message).to_bytes().to_vec()),
            _ => Err(OrchestratorError::KeyNotFound(key_id.to_string())),
        }
    }

    pub fn public_key_bytes(&self, key_id: &str) -> Result<[u8; 32], OrchestratorError> {
        let keys = self.keys.lock().expect("key store mutex poisoned");
        match keys.get(key_id) {
            Some(StoredKey::SigningKey(keypair)) => Ok(keypair.public_key_bytes()),
            _ => Err(OrchestratorError::KeyNotFound(key_id.to_string())),
        }
    }

    /// Removes the key from the store. Idempotent: a second shred returns
    /// `AlreadyShredded` rather than erroring on a missing key.
    pub fn shred(&self, key_id: &str) -> Result<(), OrchestratorError> {
        if self.db.is_key_destroyed(key_id)? {
            return Err(OrchestratorError::AlreadyShredded(key_id.to_string()));
        }
        self.keys.lock().expect("key store mutex poisoned").remove(key_id);
        self.db.mark_key_destroyed(key_id)?;
        Ok(())
    }

    pub fn is_destroyed(&self, key_id: &str) -> Result<bool, OrchestratorError> {
        Ok(self.db.is_key_destroyed(key_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str) -> Arc<StateDb> {
        let dir = std::env::temp_dir().join(format!("covenant_keystore_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(StateDb::open(&dir).unwrap())
    }

    #[test]
    fn data_key_round_trips_until_shredded() {
        let store = KeyStore::new(db("round_trip"));
        store.register_data_key("k1", [1u8; 32], [2u8; 12]);
        assert!(store.get_data_key("k1").is_ok());
        store.shred("k1").unwrap();
        assert!(matches!(store.get_data_key("k1"), Err(OrchestratorError::KeyDestroyed(_))));
    }

    #[test]
    fn second_shred_is_already_shredded_not_error() {
        let store = KeyStore::new(db("second_shred"));
        store.register_data_key("k1", [1u8; 32], [2u8; 12]);
        store.shred("k1").unwrap();
        assert!(matches!(store.shred("k1"), Err(OrchestratorError::AlreadyShredded(_))));
    }

    #[test]
    fn destroyed_key_id_stays_destroyed_even_if_reregistered() {
        let store = KeyStore::new(db("reregistered"));
        store.register_data_key("k1", [1u8; 32], [2u8; 12]);
        store.shred("k1").unwrap();
        store.register_data_key("k1", [9u8; 32], [9u8; 12]);
        assert!(matches!(store.get_data_key("k1"), Err(OrchestratorError::KeyDestroyed(_))));
    }

    #[test]
    fn signing_key_signs_and_verifies() {
        let store = KeyStore::new(db("sign"));
        let keypair = KeyPair::generate();
        let public = keypair.public_key_bytes();
        store.register_signing_key("plan-key", keypair);
        let sig = store.sign_with("plan-key", b"payload").unwrap();
        assert!(covenant_crypto::verify(&public, b"payload", &sig).is_ok());
    }
}
