//! Deployment configuration — §6. A single `serde`-deserialisable struct
//! threaded explicitly through constructors; no global/lazily-initialised
//! config state anywhere in the workspace.

use serde::{Deserialize, Serialize};

use crate::constants::*;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CovenantConfig {
    pub min_cohort_size: u64,
    pub manual_review_threshold: f64,
    pub capsule_ttl_seconds: i64,
    pub default_prb_allocated: f64,
    pub linkage_window_seconds: i64,
    pub linkage_max_per_window: u32,
    pub linkage_similarity_threshold: f64,
    pub linkage_max_linkage_count: u32,
    pub yc_transfers_enabled: bool,
    pub require_configured_policy_key: bool,
    pub optimistic_retry_attempts: u32,
    pub max_reasonable_criteria: usize,
    pub max_reasonable_duration_days: i64,
    pub event_max_retry_count: u32,

    /// Base58/hex-encoded HMAC key material for policy-rule signing. Must
    /// be set explicitly outside of test/dev profiles when
    /// `require_configured_policy_key` is true — see
    /// `covenant-screening`'s coordinator bootstrap gate.
    pub policy_signing_key: Option<String>,

    /// Filesystem path the `sled` database is opened at.
    pub data_dir: String,
}

impl Default for CovenantConfig {
    fn default() -> Self {
        Self {
            min_cohort_size: DEFAULT_MIN_COHORT_SIZE,
            manual_review_threshold: DEFAULT_MANUAL_REVIEW_THRESHOLD,
            capsule_ttl_seconds: DEFAULT_CAPSULE_TTL_SECONDS,
            default_prb_allocated: DEFAULT_PRB_ALLOCATED,
            linkage_window_seconds: DEFAULT_LINKAGE_WINDOW_SECONDS,
            linkage_max_per_window: DEFAULT_LINKAGE_MAX_PER_WINDOW,
            linkage_similarity_threshold: DEFAULT_LINKAGE_SIMILARITY_THRESHOLD,
            linkage_max_linkage_count: DEFAULT_LINKAGE_MAX_LINKAGE_COUNT,
            yc_transfers_enabled: DEFAULT_YC_TRANSFERS_ENABLED,
            require_configured_policy_key: DEFAULT_REQUIRE_CONFIGURED_POLICY_KEY,
            optimistic_retry_attempts: OPTIMISTIC_RETRY_ATTEMPTS,
            max_reasonable_criteria: MAX_REASONABLE_CRITERIA,
            max_reasonable_duration_days: MAX_REASONABLE_DURATION_DAYS,
            event_max_retry_count: EVENT_MAX_RETRY_COUNT,
            policy_signing_key: None,
            data_dir: "./data/covenant".to_string(),
        }
    }
}

impl CovenantConfig {
    /// The coordinator refuses to start if this returns an error: a
    /// missing policy key with `require_configured_policy_key` set would
    /// otherwise silently sign policy artifacts with no real key.
    pub fn require_configured_key(&self) -> Result<&str, crate::error::CoreError> {
        match (&self.policy_signing_key, self.require_configured_policy_key) {
            (Some(k), _) => Ok(k.as_str()),
            (None, false) => Ok(""),
            (None, true) => Err(crate::error::CoreError::InvalidState(
                "policy_signing_key is required when require_configured_policy_key is set"
                    .to_string(),
            )),
        }
    }
}
