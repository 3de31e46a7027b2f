use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use shared::{
    domain::{Address, HouseId, HouseRecord, Wei},
    error::RejectReason,
    protocol::{CommitOutcome, CommitReceipt, SubmitCall, SubmitEnvelope},
};
use storage::RegistryStore;

/// The authoritative side of the house registry. Every rule enforced here
/// holds regardless of what a client pre-checked: a submission that bypasses
/// the client entirely is validated from scratch.
#[derive(Clone)]
pub struct ChainContext {
    pub store: RegistryStore,
    pub params: ChainParams,
}

#[derive(Debug, Clone, Copy)]
pub struct ChainParams {
    pub manager: Address,
    /// Flat fee debited from the caller for every submission that reaches
    /// the ledger, consumed even when the operation is rejected.
    pub submission_fee: Wei,
}

pub fn manager(ctx: &ChainContext) -> Address {
    ctx.params.manager
}

pub async fn balance(ctx: &ChainContext, address: Address) -> Result<Wei> {
    ctx.store.balance(address).await
}

pub async fn house(ctx: &ChainContext, house_id: HouseId) -> Result<Option<HouseRecord>> {
    ctx.store.house(house_id).await
}

pub async fn houses_owned_by(ctx: &ChainContext, owner: Address) -> Result<Vec<HouseRecord>> {
    ctx.store.houses_owned_by(owner).await
}

pub async fn listed_houses(ctx: &ChainContext) -> Result<Vec<HouseRecord>> {
    ctx.store.listed_houses().await
}

/// Executes one submission to its terminal outcome. `Err` is an internal
/// storage failure only; every domain-level refusal comes back as
/// `Ok(CommitOutcome::Rejected)` with the fee already consumed.
pub async fn submit(ctx: &ChainContext, envelope: &SubmitEnvelope) -> Result<CommitOutcome> {
    if envelope.caller.is_zero() {
        return Ok(rejected(RejectReason::ZeroIdentity));
    }

    let fee = ctx.params.submission_fee;
    if !ctx.store.debit(envelope.caller, fee).await? {
        return Ok(rejected(RejectReason::FeeUnpayable));
    }

    let committed_at = Utc::now();
    let applied = match envelope.call {
        SubmitCall::Mint { target } => apply_mint(ctx, envelope.caller, target).await?,
        SubmitCall::List { house_id, price } => {
            apply_list(ctx, envelope.caller, house_id, price, committed_at).await?
        }
        SubmitCall::Buy { house_id } => {
            apply_buy(ctx, envelope.caller, house_id, envelope.value).await?
        }
    };

    Ok(match applied {
        Ok(minted_house_id) => {
            info!(
                submission_id = %envelope.submission_id,
                caller = %envelope.caller,
                "submission committed"
            );
            CommitOutcome::Committed {
                receipt: CommitReceipt {
                    submission_id: envelope.submission_id,
                    committed_at,
                    fee_paid: fee,
                    minted_house_id,
                },
            }
        }
        Err(reason) => {
            info!(
                submission_id = %envelope.submission_id,
                caller = %envelope.caller,
                %reason,
                "submission rejected"
            );
            rejected(reason)
        }
    })
}

fn rejected(reason: RejectReason) -> CommitOutcome {
    CommitOutcome::Rejected { reason }
}

/// Open self-service mint; minting to another identity is manager-only.
async fn apply_mint(
    ctx: &ChainContext,
    caller: Address,
    target: Option<Address>,
) -> Result<Result<Option<HouseId>, RejectReason>> {
    let target = target.unwrap_or(caller);
    if target.is_zero() {
        return Ok(Err(RejectReason::ZeroIdentity));
    }
    if target != caller && caller != ctx.params.manager {
        return Ok(Err(RejectReason::Unauthorized));
    }
    let house_id = ctx.store.insert_house(target).await?;
    Ok(Ok(Some(house_id)))
}

/// Listing an already-listed house updates its price and timestamp; that is
/// not an error.
async fn apply_list(
    ctx: &ChainContext,
    caller: Address,
    house_id: HouseId,
    price: Wei,
    committed_at: DateTime<Utc>,
) -> Result<Result<Option<HouseId>, RejectReason>> {
    let Some(record) = ctx.store.house(house_id).await? else {
        return Ok(Err(RejectReason::UnknownHouse));
    };
    if record.owner != caller {
        return Ok(Err(RejectReason::NotOwner));
    }
    if price.is_zero() {
        return Ok(Err(RejectReason::InvalidPrice));
    }
    ctx.store.set_listing(house_id, price, committed_at).await?;
    Ok(Ok(None))
}

/// The attached value must equal the price exactly; any mismatch rejects,
/// which keeps refund logic out of the registry.
async fn apply_buy(
    ctx: &ChainContext,
    caller: Address,
    house_id: HouseId,
    value: Wei,
) -> Result<Result<Option<HouseId>, RejectReason>> {
    let Some(record) = ctx.store.house(house_id).await? else {
        return Ok(Err(RejectReason::UnknownHouse));
    };
    if !record.is_listed {
        return Ok(Err(RejectReason::NotListed));
    }
    if record.owner == caller {
        return Ok(Err(RejectReason::BuyerIsOwner));
    }
    if value != record.price {
        return Ok(Err(RejectReason::InsufficientPayment));
    }
    if !ctx
        .store
        .apply_buy(house_id, caller, record.owner, record.price)
        .await?
    {
        return Ok(Err(RejectReason::InsufficientFunds));
    }
    Ok(Ok(None))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
