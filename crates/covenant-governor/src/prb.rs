//! Privacy Risk Budget gate (§4.4, gate 3). Atomic CAS on
//! `{consumed, remaining}` via the shared optimistic-concurrency retry
//! helper; once LOCKED, `allocated` never changes again.

use std::sync::Arc;

use covenant_core::ids::now;
use covenant_core::ids::Id;
use covenant_core::settlement::Prb;
use covenant_state::{retry_with_occ, StateDb};

use crate::error::GovernorError;

pub struct PrbGate {
    db: Arc<StateDb>,
    retry_attempts: u32,
}

pub struct PrbResult {
    pub allowed: bool,
    pub remaining: f64,
    pub reason_codes: Vec<String>,
}

impl PrbGate {
    pub fn new(db: Arc<StateDb>, retry_attempts: u32) -> Self {
        Self { db, retry_attempts }
    }

    pub fn lock(&self, ds_id: Id) -> Result<Prb, GovernorError> {
        let mut prb = self.db.get_prb(&ds_id)?.ok_or(GovernorError::PrbNotFound(ds_id))?;
        prb.is_locked = true;
        prb.version += 1;
        self.db.put_prb(&prb)?;
        Ok(prb)
    }

    /// Debits `cost` from the DS's PRB if enough remains; denies
    /// otherwise. Uses the workspace's generic OCC retry loop since this
    /// may race with other dispatches consuming the same budget.
    pub fn check_and_consume(&self, ds_id: Id, cost: f64) -> Result<PrbResult, GovernorError> {
        let current = self.db.get_prb(&ds_id)?.unwrap_or_else(|| fresh_prb(ds_id));
        if current.remaining() < cost {
            return Ok(PrbResult {
                allowed: false,
                remaining: current.remaining(),
                reason_codes: vec!["PRB_EXHAUSTED".to_string()],
            });
        }

        let db = self.db.clone();
        let read = {
            let db = db.clone();
            move || -> Result<(Prb, u64), covenant_state::StateError> {
                let prb = db.get_prb(&ds_id)?.unwrap_or_else(|| fresh_prb(ds_id));
                let version = prb.version;
                Ok((prb, version))
            }
        };
        let modify = move |mut prb: Prb| -> Result<Prb, covenant_state::StateError> {
            prb.consumed += cost;
            prb.version += 1;
            Ok(prb)
        };
        let write = {
            let db = db.clone();
            move |next: &Prb, version: u64| -> Result<bool, covenant_state::StateError> {
                match db.get_prb(&ds_id)? {
                    Some(existing) if existing.version != version => Ok(false),
                    _ => {
                        db.put_prb(next)?;
                        Ok(true)
                    }
                }
            }
        };

        let updated = retry_with_occ(self.retry_attempts, read, modify, write)?;
        Ok(PrbResult {
            allowed: true,
            remaining: updated.remaining(),
            reason_codes: Vec::new(),
        })
    }
}

fn fresh_prb(ds_id: Id) -> Prb {
    Prb {
        ds_id,
        version: 0,
        allocated: covenant_core::constants::DEFAULT_PRB_ALLOCATED,
        consumed: 0.0,
        window_start: now(),
        is_locked: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str) -> Arc<StateDb> {
        let dir = std::env::temp_dir().join(format!("covenant_prb_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(StateDb::open(&dir).unwrap())
    }

    #[test]
    fn consumes_when_remaining_sufficient() {
        let store = db("consume");
        let ds_id = Id::new();
        store
            .put_prb(&Prb {
                ds_id,
                version: 0,
                allocated: 1.0,
                consumed: 0.0,
                window_start: 0,
                is_locked: false,
            })
            .unwrap();
        let gate = PrbGate::new(store.clone(), 3);
        let result = gate.check_and_consume(ds_id, 0.3).unwrap();
        assert!(result.allowed);
        assert!((result.remaining - 0.7).abs() < 1e-9);
    }

    #[test]
    fn denies_when_cost_exceeds_remaining() {
        let store = db("deny");
        let ds_id = Id::new();
        store
            .put_prb(&Prb {
                ds_id,
                version: 0,
                allocated: 1.0,
                consumed: 0.9,
                window_start: 0,
                is_locked: false,
            })
            .unwrap();
        let gate = PrbGate::new(store, 3);
        let result = gate.check_and_consume(ds_id, 0.5).unwrap();
        assert!(!result.allowed);
        assert!(result.reason_codes.contains(&"PRB_EXHAUSTED".to_string()));
    }

    #[test]
    fn locked_prb_allocated_is_immutable_across_consumption() {
        let store = db("lock");
        let ds_id = Id::new();
        store
            .put_prb(&Prb {
                ds_id,
                version: 0,
                allocated: 1.0,
                consumed: 0.0,
                window_start: 0,
                is_locked: false,
            })
            .unwrap();
        let gate = PrbGate::new(store.clone(), 3);
        let locked = gate.lock(ds_id).unwrap();
        assert!(locked.is_locked);
        gate.check_and_consume(ds_id, 0.2).unwrap();
        let after = store.get_prb(&ds_id).unwrap().unwrap();
        assert_eq!(after.allocated, 1.0);
    }
}
