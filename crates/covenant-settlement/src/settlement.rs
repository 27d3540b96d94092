//! `processSettlement` (§4.6): the top-level operation that moves funds
//! escrow -> DS balance and issues the matching YC credits in one
//! fenced step.

use std::sync::Arc;

use covenant_core::ids::Id;
use covenant_core::ledger::ActorType;
use covenant_core::settlement::{EscrowAccount, YcToken};
use covenant_ledger::AuditChain;
use covenant_state::StateDb;
use tracing::info;

use crate::credits::CreditsEngine;
use crate::error::SettlementError;
use crate::escrow::EscrowEngine;

pub struct SettlementResult {
    pub escrow: EscrowAccount,
    pub yc_token: YcToken,
}

pub struct SettlementCoordinator {
    ledger: Arc<AuditChain>,
    escrow: Arc<EscrowEngine>,
    credits: Arc<CreditsEngine>,
}

impl SettlementCoordinator {
    pub fn new(ledger: Arc<AuditChain>, escrow: Arc<EscrowEngine>, credits: Arc<CreditsEngine>) -> Self {
        Self {
            ledger,
            escrow,
            credits,
        }
    }

    pub fn process_settlement(
        &self,
        contract_id: Id,
        ds_id: Id,
        escrow_id: Id,
        amount: u64,
    ) -> Result<SettlementResult, SettlementError> {
        let settlement_id = Id::new();
        let escrow = self.escrow.release_to_ds(
            escrow_id,
            ds_id,
            amount,
            &format!("SETTLE:{settlement_id}:{ds_id}:release"),
        )?;
        let yc_token = self.credits.issue_from_settlement(escrow_id, ds_id, amount, settlement_id)?;

        self.ledger.append_receipt(
            "settlement.processed",
            "EscrowAccount",
            escrow_id,
            ds_id,
            ActorType::System,
            &covenant_crypto::sha256_hex(format!("{contract_id}|{ds_id}|{escrow_id}|{amount}").as_bytes()),
        )?;
        info!(contract_id = %contract_id, ds_id = %ds_id, amount, "settlement processed");
        Ok(SettlementResult { escrow, yc_token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_events::EventBus;

    fn setup(name: &str) -> (SettlementCoordinator, Arc<StateDb>) {
        let dir = std::env::temp_dir().join(format!("covenant_settlement_coord_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).unwrap());
        let events = Arc::new(EventBus::new(db.clone(), 5));
        let ledger = Arc::new(AuditChain::new(db.clone(), events));
        let escrow = Arc::new(EscrowEngine::new(db.clone(), ledger.clone()));
        let credits = Arc::new(CreditsEngine::new(db.clone(), ledger.clone(), false));
        (SettlementCoordinator::new(ledger, escrow, credits), db)
    }

    #[test]
    fn settlement_moves_funds_and_issues_credits() {
        let (coordinator, db) = setup("straight_through");
        let requester_id = Id::new();
        let request_id = Id::new();
        let escrow_engine = EscrowEngine::new(
            db.clone(),
            Arc::new(AuditChain::new(db.clone(), Arc::new(EventBus::new(db.clone(), 5)))),
        );
        let escrow = escrow_engine.fund(requester_id, request_id, 100, "FUND:s1").unwrap();
        let escrow = escrow_engine.lock(escrow.id, 100, "LOCK:s1").unwrap();

        let ds_id = Id::new();
        let contract_id = Id::new();
        let result = coordinator
            .process_settlement(contract_id, ds_id, escrow.id, 100)
            .unwrap();
        assert_eq!(result.escrow.released_amount, 100);
        assert_eq!(result.yc_token.balance, 100);
        assert_eq!(db.get_ds_balance(&ds_id).unwrap().unwrap().pending, 100);
    }
}
