//! ─── Covenant Protocol Constants ────────────────────────────────────────────
//!
//! Default values for every configuration option enumerated in §6. These
//! are the literal defaults `CovenantConfig` falls back to via
//! `#[serde(default = "...")]`; a deployment overrides them explicitly
//! rather than relying on silent globals.

/// Minimum cohort size admitted by screening / the k-anonymity gate.
pub const DEFAULT_MIN_COHORT_SIZE: u64 = 50;

/// Risk score at/above which screening routes to MANUAL_REVIEW instead of
/// APPROVED.
pub const DEFAULT_MANUAL_REVIEW_THRESHOLD: f64 = 0.5;

/// Default Time Capsule TTL (seconds) when the caller does not specify one.
pub const DEFAULT_CAPSULE_TTL_SECONDS: i64 = 3600;

/// Default PRB allocation for a freshly created campaign budget.
pub const DEFAULT_PRB_ALLOCATED: f64 = 1.0;

/// Linkage rolling-window length (seconds). Default: 24 hours.
pub const DEFAULT_LINKAGE_WINDOW_SECONDS: i64 = 24 * 3600;

/// Maximum queries per `(requesterId, queryHash)` pair within the window.
pub const DEFAULT_LINKAGE_MAX_PER_WINDOW: u32 = 10;

/// Jaccard similarity above which two queries are considered linked.
pub const DEFAULT_LINKAGE_SIMILARITY_THRESHOLD: f64 = 0.5;

/// Number of linked queries tolerated before the linkage gate blocks.
pub const DEFAULT_LINKAGE_MAX_LINKAGE_COUNT: u32 = 3;

/// Whether peer-to-peer YC credit transfers are permitted. Platform-wide
/// off switch; Property 8 depends on this defaulting to `false`.
pub const DEFAULT_YC_TRANSFERS_ENABLED: bool = false;

/// Whether the coordinator refuses to start without a configured HMAC
/// policy key. Defaults to `true` in every profile except test/dev.
pub const DEFAULT_REQUIRE_CONFIGURED_POLICY_KEY: bool = true;

/// Bounded retry budget for optimistic-concurrency write conflicts.
pub const OPTIMISTIC_RETRY_ATTEMPTS: u32 = 3;

/// Criteria count above which policy review flags `CRITERIA_TOO_SPECIFIC`.
pub const MAX_REASONABLE_CRITERIA: usize = 5;

/// Duration (days) above which screening's `DURATION_REASONABLE` warning
/// fires.
pub const MAX_REASONABLE_DURATION_DAYS: i64 = 365;

/// Current schema version stamped on canonical event envelopes.
pub const CANONICAL_EVENT_SCHEMA_VERSION: &str = "1.0";

/// Maximum retry count before a canonical event is moved to DEAD_LETTER.
pub const EVENT_MAX_RETRY_COUNT: u32 = 5;
