//! Linkage rate-limit gate (§4.4, gate 2). Tracks a rolling window of
//! queries per requester and blocks once too many are similar enough to
//! be linkable.

use std::collections::HashSet;
use std::sync::Arc;

use covenant_core::governor::LinkageWindowEntry;
use covenant_core::ids::{now, Id};
use covenant_state::StateDb;

use crate::error::GovernorError;

pub struct LinkageGate {
    db: Arc<StateDb>,
    window_seconds: i64,
    max_per_window: u32,
    similarity_threshold: f64,
    max_linkage_count: u32,
}

pub struct LinkageResult {
    pub allowed: bool,
    pub reason_codes: Vec<String>,
    pub linkage_count: u32,
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    let sa: HashSet<&String> = a.iter().collect();
    let sb: HashSet<&String> = b.iter().collect();
    if sa.is_empty() && sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count() as f64;
    let union = sa.union(&sb).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

impl LinkageGate {
    pub fn new(
        db: Arc<StateDb>,
        window_seconds: i64,
        max_per_window: u32,
        similarity_threshold: f64,
        max_linkage_count: u32,
    ) -> Self {
        Self {
            db,
            window_seconds,
            max_per_window,
            similarity_threshold,
            max_linkage_count,
        }
    }

    pub fn check(
        &self,
        requester_id: Id,
        query_hash: &str,
        criteria_tokens: &[String],
    ) -> Result<LinkageResult, GovernorError> {
        let now_ts = now();
        let window_start = now_ts - self.window_seconds;

        let prior: Vec<LinkageWindowEntry> = self
            .db
            .iter_linkage_entries_for_requester(&requester_id)?
            .into_iter()
            .filter(|e| e.created_at >= window_start)
            .collect();

        if prior.len() as u32 >= self.max_per_window {
            return Ok(LinkageResult {
                allowed: false,
                reason_codes: vec!["LINKAGE_WINDOW_EXHAUSTED".to_string()],
                linkage_count: prior.len() as u32,
            });
        }

        let linked_count = prior
            .iter()
            .filter(|e| jaccard(&e.criteria_tokens, criteria_tokens) > self.similarity_threshold)
            .count() as u32;

        let allowed = linked_count <= self.max_linkage_count;
        let reason_codes = if allowed {
            Vec::new()
        } else {
            vec!["LINKAGE_LIMIT_EXCEEDED".to_string()]
        };

        self.db.put_linkage_entry(&LinkageWindowEntry {
            id: Id::new(),
            requester_id,
            query_hash: query_hash.to_string(),
            criteria_tokens: criteria_tokens.to_vec(),
            created_at: now_ts,
        })?;

        Ok(LinkageResult {
            allowed,
            reason_codes,
            linkage_count: linked_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str) -> Arc<StateDb> {
        let dir = std::env::temp_dir().join(format!("covenant_linkage_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(StateDb::open(&dir).unwrap())
    }

    #[test]
    fn dissimilar_queries_stay_under_linkage_limit() {
        let gate = LinkageGate::new(db("dissimilar"), 86_400, 10, 0.5, 3);
        let requester = Id::new();
        for i in 0..3 {
            let tokens = vec![format!("domain.field{i}")];
            let result = gate.check(requester, &format!("q{i}"), &tokens).unwrap();
            assert!(result.allowed);
        }
    }

    #[test]
    fn many_similar_queries_exceed_linkage_limit() {
        let gate = LinkageGate::new(db("similar"), 86_400, 100, 0.3, 2);
        let requester = Id::new();
        let tokens = vec!["domain.age".to_string(), "geo.region".to_string()];
        for i in 0..5 {
            let result = gate.check(requester, &format!("q{i}"), &tokens).unwrap();
            if i > 2 {
                assert!(!result.allowed);
            }
        }
    }

    #[test]
    fn window_exhaustion_blocks_regardless_of_similarity() {
        let gate = LinkageGate::new(db("exhaust"), 86_400, 2, 0.9, 10);
        let requester = Id::new();
        gate.check(requester, "q0", &["domain.a".to_string()]).unwrap();
        gate.check(requester, "q1", &["domain.b".to_string()]).unwrap();
        let result = gate.check(requester, "q2", &["domain.c".to_string()]).unwrap();
        assert!(!result.allowed);
        assert!(result.reason_codes.contains(&"LINKAGE_WINDOW_EXHAUSTED".to_string()));
    }
}
