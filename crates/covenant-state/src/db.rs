use std::path::Path;

use covenant_core::consent::{ConsentContract, ConsentObligation, ObligationViolation};
use covenant_core::events::{CanonicalEvent, Subscription};
use covenant_core::governor::{CohortCacheEntry, LinkageWindowEntry, PolicyDecisionReceipt};
use covenant_core::ids::Id;
use covenant_core::ledger::{AuditReceipt, InclusionProof, MerkleBatch};
use covenant_core::query::{QueryPlan, TimeCapsule};
use covenant_core::request::{PolicyRule, Request, ScreeningResult};
use covenant_core::settlement::{DsBalance, EscrowAccount, JournalEntry, PayoutInstruction, Prb, YcToken};

use crate::error::StateError;

/// The embedded `sled` store backing every entity in the data model.
///
/// Named trees:
///   requests            — Id bytes → bincode(Request)
///   screening_results    — Id bytes → bincode(ScreeningResult)
///   policy_rules         — utf8 rule_code → bincode(PolicyRule)
///   consent_contracts    — Id bytes → bincode(ConsentContract)
///   obligations          — Id bytes → bincode(ConsentObligation)
///   violations           — Id bytes → bincode(ObligationViolation)
///   query_plans          — Id bytes → bincode(QueryPlan)
///   time_capsules        — Id bytes → bincode(TimeCapsule)
///   audit_receipts       — be(u64 sequence) → bincode(AuditReceipt)
///   merkle_batches       — Id bytes → bincode(MerkleBatch)
///   escrow_accounts      — Id bytes → bincode(EscrowAccount)
///   journal_entries      — Id bytes → bincode(JournalEntry)
///   ds_balances          — Id bytes → bincode(DsBalance)
///   yc_tokens            — Id bytes → bincode(YcToken)
///   prb                  — Id bytes → bincode(Prb)
///   payout_instructions  — Id bytes → bincode(PayoutInstruction)
///   canonical_events     — be(u64 sequence) → bincode(CanonicalEvent)
///   subscriptions        — Id bytes → bincode(Subscription)
///   meta                 — utf8 key → raw bytes
pub struct StateDb {
    db: sled::Db,
    requests: sled::Tree,
    screening_results: sled::Tree,
    policy_rules: sled::Tree,
    consent_contracts: sled::Tree,
    obligations: sled::Tree,
    violations: sled::Tree,
    query_plans: sled::Tree,
    time_capsules: sled::Tree,
    audit_receipts: sled::Tree,
    merkle_batches: sled::Tree,
    escrow_accounts: sled::Tree,
    journal_entries: sled::Tree,
    ds_balances: sled::Tree,
    yc_tokens: sled::Tree,
    prb: sled::Tree,
    payout_instructions: sled::Tree,
    canonical_events: sled::Tree,
    subscriptions: sled::Tree,
    inclusion_proofs: sled::Tree,
    linkage_entries: sled::Tree,
    cohort_cache: sled::Tree,
    policy_decision_receipts: sled::Tree,
    nonce_registry: sled::Tree,
    destroyed_keys_registry: sled::Tree,
    meta: sled::Tree,
}

macro_rules! tree_crud_by_id {
    ($get:ident, $put:ident, $exists:ident, $tree:ident, $ty:ty, $id_field:ident) => {
        pub fn $get(&self, id: &Id) -> Result<Option<$ty>, StateError> {
            match self.$tree.get(id.as_bytes())? {
                Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
                None => Ok(None),
            }
        }

        pub fn $put(&self, value: &$ty) -> Result<(), StateError> {
            let bytes = bincode::serialize(value)?;
            self.$tree.insert(value.$id_field.as_bytes(), bytes)?;
            Ok(())
        }

        pub fn $exists(&self, id: &Id) -> bool {
            self.$tree.contains_key(id.as_bytes()).unwrap_or(false)
        }
    };
}

impl StateDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let db = sled::open(path)?;
        Ok(Self {
            requests: db.open_tree("requests")?,
            screening_results: db.open_tree("screening_results")?,
            policy_rules: db.open_tree("policy_rules")?,
            consent_contracts: db.open_tree("consent_contracts")?,
            obligations: db.open_tree("obligations")?,
            violations: db.open_tree("violations")?,
            query_plans: db.open_tree("query_plans")?,
            time_capsules: db.open_tree("time_capsules")?,
            audit_receipts: db.open_tree("audit_receipts")?,
            merkle_batches: db.open_tree("merkle_batches")?,
            escrow_accounts: db.open_tree("escrow_accounts")?,
            journal_entries: db.open_tree("journal_entries")?,
            ds_balances: db.open_tree("ds_balances")?,
            yc_tokens: db.open_tree("yc_tokens")?,
            prb: db.open_tree("prb")?,
            payout_instructions: db.open_tree("payout_instructions")?,
            canonical_events: db.open_tree("canonical_events")?,
            subscriptions: db.open_tree("subscriptions")?,
            inclusion_proofs: db.open_tree("inclusion_proofs")?,
            linkage_entries: db.open_tree("linkage_entries")?,
            cohort_cache: db.open_tree("cohort_cache")?,
            policy_decision_receipts: db.open_tree("policy_decision_receipts")?,
            nonce_registry: db.open_tree("nonce_registry")?,
            destroyed_keys_registry: db.open_tree("destroyed_keys_registry")?,
            meta: db.open_tree("meta")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), StateError> {
        self.db.flush()?;
        Ok(())
    }

    // ── Requests ──────────────────────────────────────────────────────────
    tree_crud_by_id!(get_request, put_request, request_exists, requests, Request, id);

    pub fn iter_requests(&self) -> Result<Vec<Request>, StateError> {
        self.iter_tree(&self.requests)
    }

    // ── Screening ─────────────────────────────────────────────────────────
    tree_crud_by_id!(
        get_screening_result,
        put_screening_result,
        screening_result_exists,
        screening_results,
        ScreeningResult,
        id
    );

    pub fn iter_screening_results(&self) -> Result<Vec<ScreeningResult>, StateError> {
        self.iter_tree(&self.screening_results)
    }

    pub fn get_policy_rule(&self, rule_code: &str) -> Result<Option<PolicyRule>, StateError> {
        match self.policy_rules.get(rule_code.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_policy_rule(&self, rule: &PolicyRule) -> Result<(), StateError> {
        let bytes = bincode::serialize(rule)?;
        self.policy_rules.insert(rule.rule_code.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn iter_policy_rules(&self) -> Result<Vec<PolicyRule>, StateError> {
        let mut out = Vec::new();
        for item in self.policy_rules.iter() {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    // ── Consent ───────────────────────────────────────────────────────────
    tree_crud_by_id!(
        get_consent_contract,
        put_consent_contract,
        consent_contract_exists,
        consent_contracts,
        ConsentContract,
        id
    );
    tree_crud_by_id!(get_obligation, put_obligation, obligation_exists, obligations, ConsentObligation, id);
    tree_crud_by_id!(get_violation, put_violation, violation_exists, violations, ObligationViolation, id);

    pub fn iter_consent_contracts(&self) -> Result<Vec<ConsentContract>, StateError> {
        self.iter_tree(&self.consent_contracts)
    }

    pub fn iter_obligations_for_contract(&self, contract_id: &Id) -> Result<Vec<ConsentObligation>, StateError> {
        let all: Vec<ConsentObligation> = self.iter_tree(&self.obligations)?;
        Ok(all.into_iter().filter(|o| o.contract_id == *contract_id).collect())
    }

    pub fn iter_violations_for_contract(&self, contract_id: &Id) -> Result<Vec<ObligationViolation>, StateError> {
        let all: Vec<ObligationViolation> = self.iter_tree(&self.violations)?;
        Ok(all.into_iter().filter(|v| v.contract_id == *contract_id).collect())
    }

    // ── Orchestration ─────────────────────────────────────────────────────
    tree_crud_by_id!(get_query_plan, put_query_plan, query_plan_exists, query_plans, QueryPlan, id);
    tree_crud_by_id!(get_time_capsule, put_time_capsule, time_capsule_exists, time_capsules, TimeCapsule, id);

    pub fn iter_query_plans_for_contract(&self, contract_id: &Id) -> Result<Vec<QueryPlan>, StateError> {
        let all: Vec<QueryPlan> = self.iter_tree(&self.query_plans)?;
        Ok(all.into_iter().filter(|p| p.contract_id == *contract_id).collect())
    }

    pub fn iter_time_capsules(&self) -> Result<Vec<TimeCapsule>, StateError> {
        self.iter_tree(&self.time_capsules)
    }

    // ── Privacy Governor ──────────────────────────────────────────────────
    pub fn get_cohort_cache(&self, criteria_hash: &str) -> Result<Option<CohortCacheEntry>, StateError> {
        match self.cohort_cache.get(criteria_hash.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_cohort_cache(&self, entry: &CohortCacheEntry) -> Result<(), StateError> {
        let bytes = bincode::serialize(entry)?;
        self.cohort_cache.insert(entry.criteria_hash.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn put_linkage_entry(&self, entry: &LinkageWindowEntry) -> Result<(), StateError> {
        let bytes = bincode::serialize(entry)?;
        self.linkage_entries.insert(entry.id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn iter_linkage_entries_for_requester(
        &self,
        requester_id: &Id,
    ) -> Result<Vec<LinkageWindowEntry>, StateError> {
        let all: Vec<LinkageWindowEntry> = self.iter_tree(&self.linkage_entries)?;
        Ok(all.into_iter().filter(|e| e.requester_id == *requester_id).collect())
    }

    pub fn put_policy_decision_receipt(&self, receipt: &PolicyDecisionReceipt) -> Result<(), StateError> {
        let bytes = bincode::serialize(receipt)?;
        self.policy_decision_receipts.insert(receipt.id.as_bytes(), bytes)?;
        Ok(())
    }

    // ── Nonces & key destruction registry ────────────────────────────────
    /// Returns `true` if the nonce was newly registered, `false` if it had
    /// already been seen (i.e. a re-presentation).
    pub fn register_nonce(&self, nonce: &[u8]) -> Result<bool, StateError> {
        let inserted = self.nonce_registry.insert(nonce, &[])?.is_none();
        Ok(inserted)
    }

    pub fn mark_key_destroyed(&self, key_id: &str) -> Result<(), StateError> {
        self.destroyed_keys_registry.insert(key_id.as_bytes(), &[])?;
        Ok(())
    }

    pub fn is_key_destroyed(&self, key_id: &str) -> Result<bool, StateError> {
        Ok(self.destroyed_keys_registry.contains_key(key_id.as_bytes())?)
    }

    // ── Audit ledger ──────────────────────────────────────────────────────
    pub fn get_receipt(&self, sequence_number: u64) -> Result<Option<AuditReceipt>, StateError> {
        match self.audit_receipts.get(sequence_number.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_receipt(&self, receipt: &AuditReceipt) -> Result<(), StateError> {
        let bytes = bincode::serialize(receipt)?;
        self.audit_receipts.insert(receipt.sequence_number.to_be_bytes(), bytes)?;
        Ok(())
    }

    pub fn last_receipt(&self) -> Result<Option<AuditReceipt>, StateError> {
        match self.audit_receipts.last()? {
            Some((_, bytes)) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn receipt_count(&self) -> u64 {
        self.audit_receipts.len() as u64
    }

    pub fn iter_receipts_range(&self, start: u64, end: u64) -> Result<Vec<AuditReceipt>, StateError> {
        let mut out = Vec::new();
        for item in self.audit_receipts.range(start.to_be_bytes()..=end.to_be_bytes()) {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    tree_crud_by_id!(get_merkle_batch, put_merkle_batch, merkle_batch_exists, merkle_batches, MerkleBatch, id);

    pub fn put_inclusion_proof(&self, proof: &InclusionProof) -> Result<(), StateError> {
        let mut key = proof.batch_id.as_bytes().to_vec();
        key.extend_from_slice(&proof.leaf_index.to_be_bytes());
        let bytes = bincode::serialize(proof)?;
        self.inclusion_proofs.insert(key, bytes)?;
        Ok(())
    }

    pub fn get_inclusion_proof(&self, batch_id: &Id, leaf_index: u64) -> Result<Option<InclusionProof>, StateError> {
        let mut key = batch_id.as_bytes().to_vec();
        key.extend_from_slice(&leaf_index.to_be_bytes());
        match self.inclusion_proofs.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_meta_last_anchored_sequence(&self) -> Result<Option<u64>, StateError> {
        match self.meta.get("last_anchored_sequence")? {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes[..8]);
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn put_meta_last_anchored_sequence(&self, sequence: u64) -> Result<(), StateError> {
        self.meta.insert("last_anchored_sequence", &sequence.to_be_bytes())?;
        Ok(())
    }

    // ── Settlement ────────────────────────────────────────────────────────
    tree_crud_by_id!(get_escrow, put_escrow, escrow_exists, escrow_accounts, EscrowAccount, id);
    tree_crud_by_id!(get_ds_balance, put_ds_balance, ds_balance_exists, ds_balances, DsBalance, account_id);
    tree_crud_by_id!(get_yc_token, put_yc_token, yc_token_exists, yc_tokens, YcToken, account_id);
    tree_crud_by_id!(get_prb, put_prb, prb_exists, prb, Prb, ds_id);
    tree_crud_by_id!(get_payout, put_payout, payout_exists, payout_instructions, PayoutInstruction, id);

    pub fn iter_payouts_for_ds(&self, ds_id: &Id) -> Result<Vec<PayoutInstruction>, StateError> {
        let all: Vec<PayoutInstruction> = self.iter_tree(&self.payout_instructions)?;
        Ok(all.into_iter().filter(|p| p.ds_id == *ds_id).collect())
    }

    pub fn iter_yc_tokens(&self) -> Result<Vec<YcToken>, StateError> {
        self.iter_tree(&self.yc_tokens)
    }

    pub fn get_journal_entry(&self, id: &Id) -> Result<Option<JournalEntry>, StateError> {
        match self.journal_entries.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_journal_entry(&self, entry: &JournalEntry) -> Result<(), StateError> {
        let bytes = bincode::serialize(entry)?;
        self.journal_entries.insert(entry.id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn iter_journal_entries(&self) -> Result<Vec<JournalEntry>, StateError> {
        self.iter_tree(&self.journal_entries)
    }

    pub fn journal_entry_with_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<JournalEntry>, StateError> {
        for item in self.journal_entries.iter() {
            let (_, bytes) = item?;
            let entry: JournalEntry = bincode::deserialize(&bytes)?;
            if entry.idempotency_key == key {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    // ── Events ────────────────────────────────────────────────────────────
    pub fn put_event(&self, event: &CanonicalEvent) -> Result<(), StateError> {
        let bytes = bincode::serialize(event)?;
        self.canonical_events.insert(event.sequence_number.to_be_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_event(&self, sequence_number: u64) -> Result<Option<CanonicalEvent>, StateError> {
        match self.canonical_events.get(sequence_number.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn iter_events_from(&self, sequence_number: u64) -> Result<Vec<CanonicalEvent>, StateError> {
        let mut out = Vec::new();
        for item in self.canonical_events.range(sequence_number.to_be_bytes()..) {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    pub fn event_count(&self) -> u64 {
        self.canonical_events.len() as u64
    }

    tree_crud_by_id!(get_subscription, put_subscription, subscription_exists, subscriptions, Subscription, id);

    pub fn iter_subscriptions(&self) -> Result<Vec<Subscription>, StateError> {
        self.iter_tree(&self.subscriptions)
    }

    // ── Meta / sequence counters ──────────────────────────────────────────
    pub fn next_sequence(&self, counter_key: &str) -> Result<u64, StateError> {
        let current = self
            .meta
            .get(counter_key.as_bytes())?
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b[..8]);
                u64::from_be_bytes(arr)
            })
            .unwrap_or(0);
        self.meta.insert(counter_key.as_bytes(), &(current + 1).to_be_bytes())?;
        Ok(current)
    }

    fn iter_tree<T: serde::de::DeserializeOwned>(&self, tree: &sled::Tree) -> Result<Vec<T>, StateError> {
        let mut out = Vec::new();
        for item in tree.iter() {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::request::{LabelMap, RequestStatus, UnitType};

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("covenant_state_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn sample_request() -> Request {
        Request {
            id: Id::new(),
            version: 0,
            created_at: 0,
            requester_id: Id::new(),
            purpose: "research".to_string(),
            scope: LabelMap::new(),
            eligibility_criteria: LabelMap::new(),
            duration_start: 0,
            duration_end: 86_400,
            unit_type: UnitType::Survey,
            unit_price: 10,
            max_participants: 100,
            budget: 1_000,
            escrow_id: None,
            status: RequestStatus::Draft,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let db = temp_db("put_get");
        let request = sample_request();
        db.put_request(&request).unwrap();
        let fetched = db.get_request(&request.id).unwrap().unwrap();
        assert_eq!(fetched.purpose, request.purpose);
        assert!(db.request_exists(&request.id));
    }

    #[test]
    fn missing_entity_returns_none() {
        let db = temp_db("missing");
        assert!(db.get_request(&Id::new()).unwrap().is_none());
    }

    #[test]
    fn sequence_counter_is_strictly_increasing() {
        let db = temp_db("sequence");
        let a = db.next_sequence("receipts").unwrap();
        let b = db.next_sequence("receipts").unwrap();
        let c = db.next_sequence("receipts").unwrap();
        assert_eq!((a, b, c), (0, 1, 2));
    }

    #[test]
    fn iter_requests_returns_all_written() {
        let db = temp_db("iter");
        for _ in 0..3 {
            db.put_request(&sample_request()).unwrap();
        }
        assert_eq!(db.iter_requests().unwrap().len(), 3);
    }
}
