use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the ledger refused a submission. Crosses the wire verbatim inside a
/// `CommitOutcome::Rejected` and is surfaced to the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("not owner")]
    NotOwner,
    #[error("not listed")]
    NotListed,
    #[error("invalid price")]
    InvalidPrice,
    #[error("insufficient payment")]
    InsufficientPayment,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("buyer is owner")]
    BuyerIsOwner,
    #[error("unauthorized")]
    Unauthorized,
    #[error("unknown house")]
    UnknownHouse,
    #[error("zero identity")]
    ZeroIdentity,
    #[error("fee unpayable")]
    FeeUnpayable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Internal,
}

/// Error body returned by the gateway's query routes. Submission rejections
/// are not transported this way; they arrive as a `CommitOutcome`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
