//! Payout requests (§4.6 expansion): debits `availableBalance`, redeems
//! the matching YC credits, and records a `payout_instructions` row. The
//! raw destination never reaches this operation, only its hash.

use std::sync::Arc;

use covenant_core::ids::{now, Hash32Hex, Id};
use covenant_core::ledger::ActorType;
use covenant_core::settlement::{PayoutInstruction, PayoutStatus};
use covenant_ledger::AuditChain;
use covenant_state::StateDb;
use tracing::info;

use crate::credits::CreditsEngine;
use crate::error::SettlementError;

pub struct PayoutEngine {
    db: Arc<StateDb>,
    ledger: Arc<AuditChain>,
    credits: Arc<CreditsEngine>,
}

impl PayoutEngine {
    pub fn new(db: Arc<StateDb>, ledger: Arc<AuditChain>, credits: Arc<CreditsEngine>) -> Self {
        Self { db, ledger, credits }
    }

    pub fn request_payout(
        &self,
        ds_id: Id,
        amount: u64,
        method: &str,
        destination_hash: Hash32Hex,
    ) -> Result<PayoutInstruction, SettlementError> {
        let mut balance = self
            .db
            .get_ds_balance(&ds_id)?
            .ok_or(SettlementError::DsBalanceNotFound(ds_id))?;
        if balance.available < amount {
            return Err(SettlementError::InsufficientBalance(ds_id));
        }

        let payout = PayoutInstruction {
            id: Id::new(),
            version: 0,
            created_at: now(),
            ds_id,
            amount,
            method: method.to_string(),
            destination_hash,
            status: PayoutStatus::Pending,
        };

        self.credits.redeem_for_payout(ds_id, amount, payout.id)?;

        balance.available -= amount;
        balance.version += 1;
        self.db.put_ds_balance(&balance)?;

        let mut completed = payout;
        completed.status = PayoutStatus::Completed;
        self.db.put_payout(&completed)?;

        self.ledger.append_receipt(
            "payout.requested",
            "PayoutInstruction",
            completed.id,
            ds_id,
            ActorType::Ds,
            &covenant_crypto::sha256_hex(format!("{}|{}", completed.id, amount).as_bytes()),
        )?;
        info!(payout_id = %completed.id, ds_id = %ds_id, amount, "payout requested");
        Ok(completed)
    }
}
