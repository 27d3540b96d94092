//! Read-side queries over the audit chain (§6 "Audit receipt retrieval").

use std::sync::Arc;

use covenant_core::ids::{Id, Timestamp};
use covenant_core::ledger::AuditReceipt;
use covenant_state::StateDb;

use crate::error::LedgerError;

pub struct AuditQueries {
    db: Arc<StateDb>,
}

impl AuditQueries {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self { db }
    }

    pub fn by_id(&self, sequence_number: u64) -> Result<AuditReceipt, LedgerError> {
        self.db
            .get_receipt(sequence_number)?
            .ok_or(LedgerError::ReceiptNotFound(Id::nil()))
    }

    pub fn by_actor(&self, actor_id: Id, offset: usize, limit: usize) -> Result<Vec<AuditReceipt>, LedgerError> {
        let all = self.all_receipts()?;
        Ok(all
            .into_iter()
            .filter(|r| r.actor_id == actor_id)
            .skip(offset)
            .take(limit)
            .collect())
    }

    pub fn by_resource(&self, entity_id: Id) -> Result<Vec<AuditReceipt>, LedgerError> {
        let all = self.all_receipts()?;
        Ok(all.into_iter().filter(|r| r.entity_id == entity_id).collect())
    }

    pub fn by_event_type(&self, action: &str) -> Result<Vec<AuditReceipt>, LedgerError> {
        let all = self.all_receipts()?;
        Ok(all.into_iter().filter(|r| r.action == action).collect())
    }

    pub fn by_time_range(&self, start: Timestamp, end: Timestamp) -> Result<Vec<AuditReceipt>, LedgerError> {
        let all = self.all_receipts()?;
        Ok(all
            .into_iter()
            .filter(|r| r.created_at >= start && r.created_at < end)
            .collect())
    }

    fn all_receipts(&self) -> Result<Vec<AuditReceipt>, LedgerError> {
        let total = self.db.receipt_count();
        if total == 0 {
            return Ok(Vec::new());
        }
        Ok(self.db.iter_receipts_range(0, total - 1)?)
    }
}
