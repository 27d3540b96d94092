//! Built-in screening rules, seeded as ordinary `PolicyRule` rows rather
//! than hard-coded in the evaluator. Seeding writes directly into
//! `covenant-state`, outside the normal engine path, and runs exactly
//! once per store.

use covenant_core::request::{PolicyRule, RuleType};
use covenant_state::StateDb;
use tracing::info;

use crate::error::ScreeningError;

pub const COHORT_MIN_SIZE: &str = "COHORT_MIN_SIZE";
pub const BUDGET_ESCROW_MATCH: &str = "BUDGET_ESCROW_MATCH";
pub const DURATION_REASONABLE: &str = "DURATION_REASONABLE";
pub const REIDENTIFICATION_RISK: &str = "REIDENTIFICATION_RISK";
pub const SCOPE_SENSITIVE: &str = "SCOPE_SENSITIVE";

fn built_in_rules() -> Vec<PolicyRule> {
    vec![
        PolicyRule {
            rule_code: COHORT_MIN_SIZE.to_string(),
            rule_type: RuleType::Blocking,
            category: "cohort".to_string(),
            severity: 10,
            is_active: true,
        },
        PolicyRule {
            rule_code: BUDGET_ESCROW_MATCH.to_string(),
            rule_type: RuleType::Blocking,
            category: "settlement".to_string(),
            severity: 10,
            is_active: true,
        },
        PolicyRule {
            rule_code: REIDENTIFICATION_RISK.to_string(),
            rule_type: RuleType::Blocking,
            category: "privacy".to_string(),
            severity: 9,
            is_active: true,
        },
        PolicyRule {
            rule_code: SCOPE_SENSITIVE.to_string(),
            rule_type: RuleType::Warning,
            category: "privacy".to_string(),
            severity: 5,
            is_active: true,
        },
        PolicyRule {
            rule_code: DURATION_REASONABLE.to_string(),
            rule_type: RuleType::Warning,
            category: "duration".to_string(),
            severity: 3,
            is_active: true,
        },
    ]
}

/// Seeds the five built-in rules once. Idempotent: if the rule table is
/// already non-empty this is a no-op, never a duplicate insert — this is
/// the platform's only bootstrap write outside the normal engine paths.
pub fn seed_built_in_rules(db: &StateDb) -> Result<(), ScreeningError> {
    if !db.iter_policy_rules()?.is_empty() {
        info!("policy rule table already seeded, skipping bootstrap");
        return Ok(());
    }
    for rule in built_in_rules() {
        info!(rule_code = %rule.rule_code, "seeding built-in policy rule");
        db.put_policy_rule(&rule)?;
    }
    Ok(())
}
