//! Composition root: opens the embedded store, runs the one-time policy
//! rule bootstrap, and wires every service engine against the same
//! `StateDb`/`AuditChain`/`EventBus`. Opens the store, applies a
//! one-time bootstrap if fresh, then builds every engine; the only
//! bootstrap step here is seeding policy rules as data.

use std::sync::Arc;

use covenant_core::error::CoreError;
use covenant_core::CovenantConfig;
use covenant_consent::{ConsentEngine, ObligationEngine};
use covenant_crypto::KeyPair;
use covenant_events::EventBus;
use covenant_governor::{KAnonymityGate, LinkageGate, PrbGate, PrivacyGovernor};
use covenant_ledger::AuditChain;
use covenant_orchestrator::{CapsuleOrchestrator, KeyStore, PlanOrchestrator};
use covenant_screening::{seed_built_in_rules, ScreeningEngine};
use covenant_settlement::{CreditsEngine, EscrowEngine, PayoutEngine, SettlementCoordinator};
use covenant_state::StateDb;

/// The default key-store identifiers every node registers its signing
/// keys under. A production deployment would persist these keypairs and
/// rotate them out of band; the demo node regenerates them on each
/// bootstrap since `KeyStore` keeps key material process-local by design.
pub const PLAN_SIGNING_KEY_ID: &str = "node-plan-signing-key";
pub const DS_SIGNING_KEY_ID: &str = "node-ds-signing-key";

/// Every wired service, held together for the lifetime of one process.
pub struct Platform {
    pub db: Arc<StateDb>,
    pub events: Arc<EventBus>,
    pub ledger: Arc<AuditChain>,
    pub keystore: Arc<KeyStore>,
    pub screening: ScreeningEngine,
    pub consent: ConsentEngine,
    pub obligations: ObligationEngine,
    pub governor: PrivacyGovernor,
    pub plans: PlanOrchestrator,
    pub capsules: CapsuleOrchestrator,
    pub escrow: Arc<EscrowEngine>,
    pub credits: Arc<CreditsEngine>,
    pub payouts: PayoutEngine,
    pub settlement: SettlementCoordinator,
}

impl Platform {
    /// Opens (or creates) the store at `config.data_dir`, seeds the
    /// built-in policy rules if this is a fresh store, and wires every
    /// engine. Safe to call repeatedly against the same data directory:
    /// the rule seed is idempotent and no other step here is destructive.
    pub fn open(config: &CovenantConfig) -> Result<Self, CoreError> {
        let db = Arc::new(StateDb::open(&config.data_dir).map_err(CoreError::from)?);
        let events = Arc::new(EventBus::new(db.clone(), config.event_max_retry_count));
        let ledger = Arc::new(AuditChain::new(db.clone(), events.clone()));

        seed_built_in_rules(&db).map_err(CoreError::from)?;

        let keystore = Arc::new(KeyStore::new(db.clone()));
        keystore.register_signing_key(PLAN_SIGNING_KEY_ID, KeyPair::generate());
        keystore.register_signing_key(DS_SIGNING_KEY_ID, KeyPair::generate());

        let screening = ScreeningEngine::new(db.clone(), ledger.clone(), config.manual_review_threshold);
        let consent = ConsentEngine::new(db.clone(), ledger.clone());
        let obligations = ObligationEngine::new(db.clone(), ledger.clone());

        let kanon = KAnonymityGate::new(db.clone(), config.min_cohort_size, 3600);
        let linkage = LinkageGate::new(
            db.clone(),
            config.linkage_window_seconds,
            config.linkage_max_per_window,
            config.linkage_similarity_threshold,
            config.linkage_max_linkage_count,
        );
        let prb = PrbGate::new(db.clone(), config.optimistic_retry_attempts);
        let governor = PrivacyGovernor::new(db.clone(), kanon, linkage, prb);

        let plans = PlanOrchestrator::new(db.clone(), keystore.clone(), PLAN_SIGNING_KEY_ID);
        let capsules = CapsuleOrchestrator::new(db.clone(), keystore.clone(), DS_SIGNING_KEY_ID);

        let escrow = Arc::new(EscrowEngine::new(db.clone(), ledger.clone()));
        let credits = Arc::new(CreditsEngine::new(db.clone(), ledger.clone(), config.yc_transfers_enabled));
        let payouts = PayoutEngine::new(db.clone(), ledger.clone(), credits.clone());
        let settlement = SettlementCoordinator::new(ledger.clone(), escrow.clone(), credits.clone());

        Ok(Self {
            db,
            events,
            ledger,
            keystore,
            screening,
            consent,
            obligations,
            governor,
            plans,
            capsules,
            escrow,
            credits,
            payouts,
            settlement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(name: &str) -> CovenantConfig {
        let dir = std::env::temp_dir().join(format!("covenant_platform_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let mut cfg = CovenantConfig::default();
        cfg.require_configured_policy_key = false;
        cfg.data_dir = dir.to_string_lossy().to_string();
        cfg
    }

    #[test]
    fn open_seeds_rules_exactly_once() {
        let cfg = test_config("seed_once");
        let platform = Platform::open(&cfg).unwrap();
        let count = platform.db.iter_policy_rules().unwrap().len();
        assert_eq!(count, 5);
        drop(platform);

        // Reopening against the same data_dir must not duplicate rules.
        let platform = Platform::open(&cfg).unwrap();
        assert_eq!(platform.db.iter_policy_rules().unwrap().len(), count);
    }

    #[test]
    fn plan_signing_key_is_usable_immediately() {
        let cfg = test_config("signing_key");
        let platform = Platform::open(&cfg).unwrap();
        assert!(platform.keystore.public_key_bytes(PLAN_SIGNING_KEY_ID).is_ok());
        assert!(platform.keystore.public_key_bytes(DS_SIGNING_KEY_ID).is_ok());
    }
}
