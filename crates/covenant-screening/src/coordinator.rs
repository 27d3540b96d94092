//! Policy coordination (§4.2): enforces the ODX vocabulary on a
//! request's scope/criteria keys, flags high-risk attribute
//! co-occurrences, and signs the resulting policy stamp with the
//! platform's HMAC key, refusing to sign until that key is configured
//! unless explicitly allowed to fall back.

use covenant_core::config::CovenantConfig;
use covenant_core::ids::{now, Id};
use covenant_core::request::Request;
use covenant_crypto::{hmac_sha256_bytes, hmac_sha256_verify, join_fields, sha256_hex};
use serde::{Deserialize, Serialize};

use crate::error::ScreeningError;

const ALLOWED_PREFIXES: &[&str] = &[
    "domain.",
    "time.",
    "geo.",
    "quality.",
    "privacy.",
    "availability.",
    "account.",
];

const SENSITIVE_PAIRS: &[(&str, &str)] = &[
    ("health", "location"),
    ("health", "city_bucket"),
    ("finance", "location"),
    ("communication", "location"),
];

const MINOR_INDICATORS: &[&str] = &[
    "minors", "children", "kids", "teens", "youth", "under_18", "school", "student", "pediatric",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    Approved,
    ManualReview,
    Rejected,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HighRiskFinding {
    pub pattern: String,
    pub remediation_hint: String,
    pub required_safeguards: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyReview {
    pub request_id: Id,
    pub decision: ReviewDecision,
    pub reason_codes: Vec<String>,
    pub safeguards: Vec<String>,
    pub high_risk_findings: Vec<HighRiskFinding>,
    pub policy_version: String,
    pub created_at: i64,
    /// HMAC-SHA-256 over the canonical review payload, hex-encoded.
    pub stamp: String,
    /// SHA-256(payload ‖ signature) — a tamper-evident fingerprint of the
    /// stamp that callers can compare without holding the signing key.
    pub stamp_hash: String,
}

fn decision_str(decision: &ReviewDecision) -> &'static str {
    match decision {
        ReviewDecision::Approved => "APPROVED",
        ReviewDecision::ManualReview => "MANUAL_REVIEW",
        ReviewDecision::Rejected => "REJECTED",
    }
}

fn default_safeguards_for(token: &str) -> Vec<String> {
    match token {
        "health" => vec!["CLEAN_ROOM_ONLY".to_string(), "PRIVACY_FLOOR_HIGH".to_string()],
        "location" => vec!["COARSE_GEO".to_string()],
        "finance" => vec!["AGGREGATE_ONLY".to_string(), "PRIVACY_FLOOR_HIGH".to_string()],
        "communication" => vec!["COARSE_TIME".to_string()],
        _ => Vec::new(),
    }
}

/// Reviews a request's declared scope/criteria against the allowed ODX
/// vocabulary and known high-risk attribute combinations, then signs the
/// resulting stamp. Does not touch storage: callers persist the
/// `PolicyReview` alongside the `ScreeningResult` it accompanies.
pub fn review(request: &Request, config: &CovenantConfig) -> Result<PolicyReview, ScreeningError> {
    let mut reason_codes = Vec::new();
    // Every request carries this floor regardless of what else is found.
    let mut safeguards: Vec<String> = vec!["K_ANONYMITY_50".to_string(), "TTL_72H".to_string()];
    let mut high_risk_findings = Vec::new();

    let all_keys: Vec<&String> = request
        .scope
        .keys()
        .chain(request.eligibility_criteria.keys())
        .collect();

    for key in &all_keys {
        if !ALLOWED_PREFIXES.iter().any(|p| key.starts_with(p)) {
            reason_codes.push(format!("NON_ODX_CRITERIA:{key}"));
        }
    }

    if request.eligibility_criteria.len() > config.max_reasonable_criteria {
        reason_codes.push("CRITERIA_TOO_SPECIFIC".to_string());
    }

    let tokens: Vec<String> = request
        .scope
        .values()
        .chain(request.eligibility_criteria.values())
        .map(|v| v.to_lowercase())
        .chain(all_keys.iter().map(|k| k.to_lowercase()))
        .collect();

    for (a, b) in SENSITIVE_PAIRS {
        if tokens.iter().any(|t| t.contains(a)) && tokens.iter().any(|t| t.contains(b)) {
            high_risk_findings.push(HighRiskFinding {
                pattern: format!("{a}+{b}"),
                remediation_hint: format!("narrow scope to avoid combining {a} with {b}"),
                required_safeguards: vec![
                    default_safeguards_for(a),
                    default_safeguards_for(b),
                ]
                .into_iter()
                .flatten()
                .collect(),
            });
            reason_codes.push(format!("HIGH_RISK_COMBINATION:{a}+{b}"));
        }
    }

    for finding in &high_risk_findings {
        for s in &finding.required_safeguards {
            if !safeguards.contains(s) {
                safeguards.push(s.clone());
            }
        }
    }

    let minors_detected = tokens.iter().any(|t| MINOR_INDICATORS.iter().any(|m| t.contains(m)));
    if minors_detected {
        reason_codes.push("MINORS_INDICATOR".to_string());
    }

    let has_blocking_vocab_violation = reason_codes.iter().any(|c| c.starts_with("NON_ODX_CRITERIA"));
    let decision = if has_blocking_vocab_violation {
        ReviewDecision::Rejected
    } else if minors_detected || !high_risk_findings.is_empty() {
        ReviewDecision::ManualReview
    } else {
        ReviewDecision::Approved
    };

    safeguards.sort();
    safeguards.dedup();
    let mut sorted_reason_codes = reason_codes.clone();
    sorted_reason_codes.sort();

    let policy_version = "1.0".to_string();
    let created_at = now();
    let key = config
        .require_configured_key()
        .map_err(|_| ScreeningError::PolicyKeyNotConfigured)?;

    let payload = join_fields(&[
        &request.id.to_string(),
        decision_str(&decision),
        &safeguards.join(","),
        &sorted_reason_codes.join(","),
        &policy_version,
        &created_at.to_string(),
    ]);
    let signature = hmac_sha256_bytes(key.as_bytes(), payload.as_bytes());
    let stamp = hex::encode(&signature);
    let stamp_hash = sha256_hex(&[payload.as_bytes(), signature.as_slice()].concat());

    Ok(PolicyReview {
        request_id: request.id,
        decision,
        reason_codes,
        safeguards,
        high_risk_findings,
        policy_version,
        created_at,
        stamp,
        stamp_hash,
    })
}

/// Recomputes the canonical payload for `review` and checks both the HMAC
/// signature (constant-time) and the stamp hash, rejecting any tampering
/// with the review itself, not just the signature.
pub fn verify_stamp(
    review: &PolicyReview,
    request: &Request,
    config: &CovenantConfig,
) -> Result<(), ScreeningError> {
    let key = config
        .require_configured_key()
        .map_err(|_| ScreeningError::PolicyKeyNotConfigured)?;

    let mut sorted_reason_codes = review.reason_codes.clone();
    sorted_reason_codes.sort();
    let mut sorted_safeguards = review.safeguards.clone();
    sorted_safeguards.sort();

    let payload = join_fields(&[
        &request.id.to_string(),
        decision_str(&review.decision),
        &sorted_safeguards.join(","),
        &sorted_reason_codes.join(","),
        &review.policy_version,
        &review.created_at.to_string(),
    ]);

    let tag = hex::decode(&review.stamp)
        .map_err(|_| ScreeningError::StampVerificationFailed(review.request_id))?;
    if !hmac_sha256_verify(key.as_bytes(), payload.as_bytes(), &tag) {
        return Err(ScreeningError::StampVerificationFailed(review.request_id));
    }

    let expected_stamp_hash = sha256_hex(&[payload.as_bytes(), tag.as_slice()].concat());
    if expected_stamp_hash != review.stamp_hash {
        return Err(ScreeningError::StampVerificationFailed(review.request_id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::request::{LabelMap, RequestStatus, UnitType};

    fn base_request() -> Request {
        Request {
            id: Id::new(),
            version: 0,
            created_at: 0,
            requester_id: Id::new(),
            purpose: "research".to_string(),
            scope: LabelMap::new(),
            eligibility_criteria: LabelMap::new(),
            duration_start: 0,
            duration_end: 86_400 * 30,
            unit_type: UnitType::Survey,
            unit_price: 10,
            max_participants: 100,
            budget: 1_000,
            escrow_id: None,
            status: RequestStatus::Screening,
        }
    }

    fn configured() -> CovenantConfig {
        let mut cfg = CovenantConfig::default();
        cfg.policy_signing_key = Some("test-key".to_string());
        cfg
    }

    #[test]
    fn request_with_only_odx_vocabulary_approves() {
        let mut request = base_request();
        request.scope.insert("domain.category".to_string(), "survey".to_string());
        let review = review(&request, &configured()).unwrap();
        assert_eq!(review.decision, ReviewDecision::Approved);
        assert!(review.reason_codes.is_empty());
    }

    #[test]
    fn non_odx_key_is_rejected() {
        let mut request = base_request();
        request.scope.insert("custom_field".to_string(), "x".to_string());
        let review = review(&request, &configured()).unwrap();
        assert_eq!(review.decision, ReviewDecision::Rejected);
        assert!(review.reason_codes.contains(&"NON_ODX_CRITERIA:custom_field".to_string()));
    }

    #[test]
    fn sensitive_pair_forces_manual_review_with_safeguards() {
        let mut request = base_request();
        request.scope.insert("domain.category".to_string(), "health".to_string());
        request.scope.insert("geo.precision".to_string(), "location".to_string());
        let review = review(&request, &configured()).unwrap();
        assert_eq!(review.decision, ReviewDecision::ManualReview);
        assert!(!review.high_risk_findings.is_empty());
        assert!(!review.safeguards.is_empty());
    }

    #[test]
    fn missing_signing_key_errors_when_required() {
        let request = base_request();
        let cfg = CovenantConfig::default();
        assert!(review(&request, &cfg).is_err());
    }

    #[test]
    fn stamp_changes_if_payload_changes() {
        let mut request = base_request();
        let cfg = configured();
        let first = review(&request, &cfg).unwrap();
        request.scope.insert("domain.category".to_string(), "survey".to_string());
        let second = review(&request, &cfg).unwrap();
        assert_ne!(first.stamp, second.stamp);
    }

    #[test]
    fn floor_safeguards_are_always_present() {
        let mut request = base_request();
        request.scope.insert("domain.category".to_string(), "survey".to_string());
        let review = review(&request, &configured()).unwrap();
        assert_eq!(review.decision, ReviewDecision::Approved);
        assert!(review.safeguards.contains(&"K_ANONYMITY_50".to_string()));
        assert!(review.safeguards.contains(&"TTL_72H".to_string()));
    }

    #[test]
    fn named_safeguards_attach_by_scope_family() {
        let mut request = base_request();
        request.scope.insert("domain.category".to_string(), "health".to_string());
        request.scope.insert("geo.precision".to_string(), "location".to_string());
        let review = review(&request, &configured()).unwrap();
        assert!(review.safeguards.contains(&"CLEAN_ROOM_ONLY".to_string()));
        assert!(review.safeguards.contains(&"PRIVACY_FLOOR_HIGH".to_string()));
        assert!(review.safeguards.contains(&"COARSE_GEO".to_string()));
    }

    #[test]
    fn teens_indicator_forces_manual_review() {
        let mut request = base_request();
        request.scope.insert("domain.category".to_string(), "teens".to_string());
        let review = review(&request, &configured()).unwrap();
        assert_eq!(review.decision, ReviewDecision::ManualReview);
        assert!(review.reason_codes.contains(&"MINORS_INDICATOR".to_string()));
    }

    #[test]
    fn criteria_count_ignores_scope_keys() {
        let mut request = base_request();
        for i in 0..10 {
            request.scope.insert(format!("domain.field_{i}"), "x".to_string());
        }
        request.eligibility_criteria.insert("domain.age_bracket".to_string(), "30-39".to_string());
        let review = review(&request, &configured()).unwrap();
        assert!(!review.reason_codes.contains(&"CRITERIA_TOO_SPECIFIC".to_string()));
    }

    #[test]
    fn excess_eligibility_criteria_triggers_too_specific() {
        let mut request = base_request();
        for i in 0..6 {
            request.eligibility_criteria.insert(format!("domain.field_{i}"), "x".to_string());
        }
        let review = review(&request, &configured()).unwrap();
        assert!(review.reason_codes.contains(&"CRITERIA_TOO_SPECIFIC".to_string()));
    }

    #[test]
    fn verify_stamp_accepts_a_genuine_review_and_rejects_tampering() {
        let request = base_request();
        let cfg = configured();
        let review_result = review(&request, &cfg).unwrap();
        assert!(verify_stamp(&review_result, &request, &cfg).is_ok());

        let mut tampered = review_result.clone();
        tampered.safeguards.push("EXTRA".to_string());
        assert!(verify_stamp(&tampered, &request, &cfg).is_err());
    }
}
