//! k-anonymity gate (§4.4, gate 1). Cohort-size estimates are cached by
//! `SHA-256(canonical(criteria))` with a TTL rather than recomputed on
//! every dispatch.

use std::sync::Arc;

use covenant_core::governor::CohortCacheEntry;
use covenant_core::ids::now;
use covenant_crypto::sha256_hex;
use covenant_state::StateDb;

use crate::error::GovernorError;

pub struct KAnonymityGate {
    db: Arc<StateDb>,
    k_min: u64,
    cache_ttl_seconds: i64,
}

pub struct KAnonymityResult {
    pub allowed: bool,
    pub cohort_size: u64,
    pub reason_codes: Vec<String>,
}

impl KAnonymityGate {
    pub fn new(db: Arc<StateDb>, k_min: u64, cache_ttl_seconds: i64) -> Self {
        Self {
            db,
            k_min,
            cache_ttl_seconds,
        }
    }

    /// `estimate` is supplied by the caller (the screening engine's
    /// `estimate_cohort_size`, or a richer source in a fuller deployment);
    /// this gate is only responsible for caching and thresholding it.
    pub fn check(&self, criteria_canonical: &str, estimate: impl Fn() -> u64) -> Result<KAnonymityResult, GovernorError> {
        let criteria_hash = sha256_hex(criteria_canonical.as_bytes());
        let now_ts = now();

        let cohort_size = match self.db.get_cohort_cache(&criteria_hash)? {
            Some(entry) if now_ts - entry.cached_at < self.cache_ttl_seconds => entry.cohort_size,
            _ => {
                let size = estimate();
                self.db.put_cohort_cache(&CohortCacheEntry {
                    criteria_hash: criteria_hash.clone(),
                    cohort_size: size,
                    cached_at: now_ts,
                })?;
                size
            }
        };

        if cohort_size < self.k_min {
            Ok(KAnonymityResult {
                allowed: false,
                cohort_size,
                reason_codes: vec!["COHORT_TOO_SMALL".to_string()],
            })
        } else {
            Ok(KAnonymityResult {
                allowed: true,
                cohort_size,
                reason_codes: Vec::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str) -> Arc<StateDb> {
        let dir = std::env::temp_dir().join(format!("covenant_kanon_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(StateDb::open(&dir).unwrap())
    }

    #[test]
    fn cohort_below_k_min_denied() {
        let gate = KAnonymityGate::new(db("small"), 50, 3600);
        let result = gate.check("criteria-a", || 10).unwrap();
        assert!(!result.allowed);
        assert_eq!(result.cohort_size, 10);
    }

    #[test]
    fn cohort_above_k_min_allowed() {
        let gate = KAnonymityGate::new(db("large"), 50, 3600);
        let result = gate.check("criteria-a", || 500).unwrap();
        assert!(result.allowed);
    }

    #[test]
    fn repeated_check_uses_cache_not_new_estimate() {
        let gate = KAnonymityGate::new(db("cache"), 50, 3600);
        gate.check("criteria-a", || 500).unwrap();
        let calls = std::cell::Cell::new(0);
        let result = gate
            .check("criteria-a", || {
                calls.set(calls.get() + 1);
                1
            })
            .unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(result.cohort_size, 500);
    }
}
