use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{Address, HouseId, Wei},
    error::RejectReason,
};

/// State-changing request submitted to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SubmitCall {
    Mint {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Address>,
    },
    List {
        house_id: HouseId,
        price: Wei,
    },
    Buy {
        house_id: HouseId,
    },
}

/// One submission as it crosses the wire. `value` is the attached payment
/// (only meaningful for buy); the submission fee is charged on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitEnvelope {
    pub submission_id: Uuid,
    pub caller: Address,
    pub value: Wei,
    pub call: SubmitCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub submission_id: Uuid,
    pub committed_at: DateTime<Utc>,
    pub fee_paid: Wei,
    /// Set for mint commits. Clients reconcile through refresh rather than
    /// relying on this being present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minted_house_id: Option<HouseId>,
}

/// Terminal answer of the ledger for a submission. A rejection is a real
/// ledger answer (the fee was consumed), not a transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed { receipt: CommitReceipt },
    Rejected { reason: RejectReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerResponse {
    pub manager: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: Address,
    pub balance: Wei,
}
