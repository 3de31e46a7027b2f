use thiserror::Error;

use shared::{
    domain::HouseId,
    error::{ErrorCode, RejectReason},
};

/// Precondition failure detected client-side. Never submitted to the ledger;
/// the registry re-checks everything authoritatively anyway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("price must be a positive amount")]
    InvalidPrice,
    #[error("minting to another identity requires the manager identity")]
    UnauthorizedMint,
    #[error("house {0} is not listed for sale")]
    NotListed(HouseId),
    #[error("house {0} is not owned by this session")]
    NotOwner(HouseId),
    #[error("house {0} does not exist")]
    UnknownHouse(HouseId),
    #[error("house {0} is already owned by this session")]
    SelfPurchase(HouseId),
}

/// A read failed, or a write could not be dispatched at all. Retryable; the
/// cache keeps its last-known values for failed slots.
#[derive(Debug, Error, Clone)]
pub enum QueryError {
    #[error("gateway endpoint is invalid: {0}")]
    InvalidEndpoint(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected ledger response: {0}")]
    Decode(String),
    #[error("ledger query failed ({code:?}): {message}")]
    Api { code: ErrorCode, message: String },
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            QueryError::Decode(err.to_string())
        } else {
            QueryError::Transport(err.to_string())
        }
    }
}

/// Operation-level error of the lifecycle controller. Nothing here is fatal
/// to the session; the controller stays ready for further operations.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Query(#[from] QueryError),
    /// The ledger refused the submission and consumed the fee. Retrying the
    /// same request fails identically until state changes.
    #[error("submission rejected by the ledger: {0}")]
    Rejected(RejectReason),
    /// Outcome unknown: neither success nor failure. The submission may
    /// still commit; a refresh observes whatever actually happened.
    #[error("submission outcome unknown: deadline expired while awaiting commit")]
    TimedOut,
}
