use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use shared::{
    domain::{Address, HouseId, HouseRecord, Wei},
    protocol::{CommitOutcome, CommitReceipt, SubmitCall, SubmitEnvelope},
};

pub mod chain;
pub mod error;

pub use chain::{ChainAccess, HttpChainAccess, SubmitStatus};
pub use error::{MarketError, QueryError, ValidationError};

/// Local projection of ledger state for one session. Replaced wholesale on
/// every refresh — individual fields are never patched in place, so a reader
/// can never observe a half-updated snapshot.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub caller: Address,
    pub caller_balance: Wei,
    /// Unknown until the first successful manager query.
    pub manager: Option<Address>,
    pub my_houses: Vec<HouseRecord>,
    pub listed_houses: Vec<HouseRecord>,
}

impl SessionState {
    fn empty(caller: Address) -> Self {
        Self {
            caller,
            caller_balance: Wei::ZERO,
            manager: None,
            my_houses: Vec::new(),
            listed_houses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSlot {
    Balance,
    MyHouses,
    ListedHouses,
    Manager,
}

/// Which refresh queries failed. Failed slots kept their previous
/// (stale-but-present) values.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub failed: Vec<(CacheSlot, QueryError)>,
}

impl RefreshReport {
    fn record(&mut self, slot: CacheSlot, error: QueryError) {
        self.failed.push((slot, error));
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_slot(&self, slot: CacheSlot) -> bool {
        self.failed.iter().any(|(failed, _)| *failed == slot)
    }
}

/// House lifecycle controller: validates preconditions client-side, issues
/// submissions through the chain adapter one at a time, and reconciles the
/// session snapshot after every outcome.
///
/// Every client-side check here is advisory — it saves a wasted fee, nothing
/// more. The registry enforces the same rules on every submission.
pub struct MarketClient {
    chain: Arc<dyn ChainAccess>,
    caller: Address,
    session: RwLock<SessionState>,
    // Serializes submissions: a second one must not be issued while a prior
    // one is awaiting commit.
    submit_gate: Mutex<()>,
}

impl MarketClient {
    pub fn new(chain: Arc<dyn ChainAccess>, caller: Address) -> Arc<Self> {
        Arc::new(Self {
            chain,
            caller,
            session: RwLock::new(SessionState::empty(caller)),
            submit_gate: Mutex::new(()),
        })
    }

    /// Creates the client and performs the session-start refresh.
    pub async fn start_session(
        chain: Arc<dyn ChainAccess>,
        caller: Address,
    ) -> (Arc<Self>, RefreshReport) {
        let client = Self::new(chain, caller);
        let report = client.refresh().await;
        (client, report)
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    /// Cloned snapshot for the presentation layer.
    pub async fn session(&self) -> SessionState {
        self.session.read().await.clone()
    }

    /// Best-effort, non-transactional batch of the four session queries,
    /// issued concurrently. Each failure is isolated: the slot keeps its
    /// prior value and the rest still update. The new snapshot replaces the
    /// old one wholesale.
    pub async fn refresh(&self) -> RefreshReport {
        let (balance, my_houses, listed_houses, manager) = tokio::join!(
            self.chain.balance(self.caller),
            self.chain.houses_owned_by(self.caller),
            self.chain.listed_houses(),
            self.chain.manager(),
        );

        let mut report = RefreshReport::default();
        let prior = self.session.read().await.clone();

        let next = SessionState {
            caller: self.caller,
            caller_balance: match balance {
                Ok(value) => value,
                Err(error) => {
                    report.record(CacheSlot::Balance, error);
                    prior.caller_balance
                }
            },
            manager: match manager {
                Ok(value) => Some(value),
                Err(error) => {
                    report.record(CacheSlot::Manager, error);
                    prior.manager
                }
            },
            my_houses: match my_houses {
                Ok(value) => value,
                Err(error) => {
                    report.record(CacheSlot::MyHouses, error);
                    prior.my_houses
                }
            },
            listed_houses: match listed_houses {
                Ok(value) => value,
                Err(error) => {
                    report.record(CacheSlot::ListedHouses, error);
                    prior.listed_houses
                }
            },
        };

        *self.session.write().await = next;

        for (slot, error) in &report.failed {
            warn!(?slot, %error, "refresh slot failed; retaining prior value");
        }
        report
    }

    /// Mints a house. `None` mints to this session's identity; targeting
    /// another identity is manager-privileged. The fresh house id is
    /// reconciled through refresh; the returned id is informational.
    pub async fn mint(&self, target: Option<Address>) -> Result<Option<HouseId>, MarketError> {
        if let Some(target) = target {
            if target != self.caller {
                let manager = self.session.read().await.manager;
                if manager.is_some_and(|manager| manager != self.caller) {
                    return Err(ValidationError::UnauthorizedMint.into());
                }
            }
        }
        let receipt = self
            .submit_and_refresh(SubmitCall::Mint { target }, Wei::ZERO)
            .await?;
        Ok(receipt.minted_house_id)
    }

    /// Lists a house for sale. Re-listing an already-listed house updates
    /// its price and timestamp.
    pub async fn list(&self, house_id: HouseId, price: Wei) -> Result<(), MarketError> {
        if price.is_zero() {
            return Err(ValidationError::InvalidPrice.into());
        }
        {
            // Fail fast when the cache can already prove the caller is not
            // the owner; an absent record goes to the ledger for the verdict.
            let session = self.session.read().await;
            let owned = session.my_houses.iter().any(|h| h.house_id == house_id);
            if !owned {
                if let Some(listed) = session
                    .listed_houses
                    .iter()
                    .find(|h| h.house_id == house_id)
                {
                    if listed.owner != self.caller {
                        return Err(ValidationError::NotOwner(house_id).into());
                    }
                }
            }
        }
        self.submit_and_refresh(SubmitCall::List { house_id, price }, Wei::ZERO)
            .await
            .map(drop)
    }

    /// Buys a listed house, attaching exactly the current price. The price
    /// is re-fetched from the ledger immediately before submission — never
    /// taken from the cache, which may be stale.
    pub async fn buy(&self, house_id: HouseId) -> Result<(), MarketError> {
        let record = self
            .chain
            .house(house_id)
            .await?
            .ok_or(ValidationError::UnknownHouse(house_id))?;
        if !record.is_listed {
            return Err(ValidationError::NotListed(house_id).into());
        }
        if record.owner == self.caller {
            return Err(ValidationError::SelfPurchase(house_id).into());
        }
        self.submit_and_refresh(SubmitCall::Buy { house_id }, record.price)
            .await
            .map(drop)
    }

    pub async fn manager_identity(&self) -> Result<Address, MarketError> {
        Ok(self.chain.manager().await?)
    }

    pub async fn balance_of(&self, address: Address) -> Result<Wei, MarketError> {
        Ok(self.chain.balance(address).await?)
    }

    pub async fn houses_owned_by(&self, owner: Address) -> Result<Vec<HouseRecord>, MarketError> {
        Ok(self.chain.houses_owned_by(owner).await?)
    }

    pub async fn all_listed_houses(&self) -> Result<Vec<HouseRecord>, MarketError> {
        Ok(self.chain.listed_houses().await?)
    }

    async fn submit_and_refresh(
        &self,
        call: SubmitCall,
        value: Wei,
    ) -> Result<CommitReceipt, MarketError> {
        let envelope = SubmitEnvelope {
            submission_id: Uuid::new_v4(),
            caller: self.caller,
            value,
            call,
        };

        let result = {
            let _gate = self.submit_gate.lock().await;
            info!(
                submission_id = %envelope.submission_id,
                caller = %envelope.caller,
                "submitting to ledger"
            );
            self.chain.submit(envelope).await
        };

        let outcome = match result {
            Ok(SubmitStatus::Resolved(CommitOutcome::Committed { receipt })) => Ok(receipt),
            Ok(SubmitStatus::Resolved(CommitOutcome::Rejected { reason })) => {
                Err(MarketError::Rejected(reason))
            }
            Ok(SubmitStatus::TimedOut) => {
                warn!(
                    submission_id = %envelope.submission_id,
                    "submission deadline expired; outcome unknown until a later refresh"
                );
                Err(MarketError::TimedOut)
            }
            Err(error) => Err(MarketError::Query(error)),
        };

        // Refresh on every path: a rejection still consumed the fee, and a
        // timed-out submission may land later.
        self.refresh().await;
        outcome
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
