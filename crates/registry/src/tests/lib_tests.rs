use super::*;
use uuid::Uuid;

const FEE: Wei = Wei(10);

fn addr(byte: u8) -> Address {
    Address([byte; 20])
}

fn manager_addr() -> Address {
    addr(0xee)
}

async fn setup() -> ChainContext {
    let store = RegistryStore::new("sqlite::memory:").await.expect("db");
    ChainContext {
        store,
        params: ChainParams {
            manager: manager_addr(),
            submission_fee: FEE,
        },
    }
}

async fn fund(ctx: &ChainContext, address: Address, amount: Wei) {
    ctx.store.seed_account(address, amount).await.expect("seed");
}

fn envelope(caller: Address, value: Wei, call: SubmitCall) -> SubmitEnvelope {
    SubmitEnvelope {
        submission_id: Uuid::new_v4(),
        caller,
        value,
        call,
    }
}

async fn expect_commit(ctx: &ChainContext, env: SubmitEnvelope) -> CommitReceipt {
    match submit(ctx, &env).await.expect("submit") {
        CommitOutcome::Committed { receipt } => receipt,
        CommitOutcome::Rejected { reason } => panic!("unexpected rejection: {reason}"),
    }
}

async fn expect_reject(ctx: &ChainContext, env: SubmitEnvelope) -> RejectReason {
    match submit(ctx, &env).await.expect("submit") {
        CommitOutcome::Rejected { reason } => reason,
        CommitOutcome::Committed { .. } => panic!("unexpected commit"),
    }
}

async fn mint_for(ctx: &ChainContext, owner: Address) -> HouseId {
    let receipt = expect_commit(ctx, envelope(owner, Wei::ZERO, SubmitCall::Mint { target: None })).await;
    receipt.minted_house_id.expect("minted id")
}

async fn assert_listed_invariant(ctx: &ChainContext) {
    for record in listed_houses(ctx).await.expect("listed") {
        assert!(
            record.price > Wei::ZERO,
            "listed house {} has zero price",
            record.house_id
        );
    }
}

#[tokio::test]
async fn self_mint_is_open_and_ids_are_never_reused() {
    let ctx = setup().await;
    let alice = addr(1);
    fund(&ctx, alice, Wei(1_000)).await;

    let mut seen = Vec::new();
    for _ in 0..3 {
        let id = mint_for(&ctx, alice).await;
        assert!(!seen.contains(&id), "house id {id} reused");
        seen.push(id);
    }

    let mine = houses_owned_by(&ctx, alice).await.expect("mine");
    assert_eq!(mine.len(), 3);
    assert!(mine.iter().all(|h| h.owner == alice && !h.is_listed));
}

#[tokio::test]
async fn mint_to_target_requires_the_manager_identity() {
    let ctx = setup().await;
    let mallory = addr(2);
    let beneficiary = addr(3);
    fund(&ctx, mallory, Wei(1_000)).await;
    fund(&ctx, manager_addr(), Wei(1_000)).await;

    // Straight to the ledger, no client-side check in the way.
    let reason = expect_reject(
        &ctx,
        envelope(
            mallory,
            Wei::ZERO,
            SubmitCall::Mint {
                target: Some(beneficiary),
            },
        ),
    )
    .await;
    assert_eq!(reason, RejectReason::Unauthorized);
    assert!(houses_owned_by(&ctx, beneficiary)
        .await
        .expect("query")
        .is_empty());

    let receipt = expect_commit(
        &ctx,
        envelope(
            manager_addr(),
            Wei::ZERO,
            SubmitCall::Mint {
                target: Some(beneficiary),
            },
        ),
    )
    .await;
    assert!(receipt.minted_house_id.is_some());
    assert_eq!(
        houses_owned_by(&ctx, beneficiary).await.expect("query").len(),
        1
    );
}

#[tokio::test]
async fn mint_to_the_zero_identity_is_rejected() {
    let ctx = setup().await;
    fund(&ctx, manager_addr(), Wei(1_000)).await;
    let reason = expect_reject(
        &ctx,
        envelope(
            manager_addr(),
            Wei::ZERO,
            SubmitCall::Mint {
                target: Some(Address::ZERO),
            },
        ),
    )
    .await;
    assert_eq!(reason, RejectReason::ZeroIdentity);
}

#[tokio::test]
async fn list_by_non_owner_is_rejected_and_state_unchanged() {
    let ctx = setup().await;
    let alice = addr(1);
    let carol = addr(4);
    fund(&ctx, alice, Wei(1_000)).await;
    fund(&ctx, carol, Wei(1_000)).await;
    let id = mint_for(&ctx, alice).await;

    let reason = expect_reject(
        &ctx,
        envelope(
            carol,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei(100),
            },
        ),
    )
    .await;
    assert_eq!(reason, RejectReason::NotOwner);

    let record = house(&ctx, id).await.expect("query").expect("record");
    assert_eq!(record.owner, alice);
    assert!(!record.is_listed);
    assert_eq!(record.price, Wei::ZERO);
}

#[tokio::test]
async fn zero_price_listing_is_rejected_ledger_side() {
    let ctx = setup().await;
    let alice = addr(1);
    fund(&ctx, alice, Wei(1_000)).await;
    let id = mint_for(&ctx, alice).await;

    let reason = expect_reject(
        &ctx,
        envelope(
            alice,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei::ZERO,
            },
        ),
    )
    .await;
    assert_eq!(reason, RejectReason::InvalidPrice);
    assert_listed_invariant(&ctx).await;
}

#[tokio::test]
async fn relisting_updates_price_and_timestamp() {
    let ctx = setup().await;
    let alice = addr(1);
    fund(&ctx, alice, Wei(1_000)).await;
    let id = mint_for(&ctx, alice).await;

    expect_commit(
        &ctx,
        envelope(
            alice,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei(100),
            },
        ),
    )
    .await;
    let first = house(&ctx, id).await.expect("query").expect("record");

    expect_commit(
        &ctx,
        envelope(
            alice,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei(175),
            },
        ),
    )
    .await;
    let second = house(&ctx, id).await.expect("query").expect("record");

    assert!(second.is_listed);
    assert_eq!(second.price, Wei(175));
    assert!(second.listed_at >= first.listed_at);
    assert_listed_invariant(&ctx).await;
}

#[tokio::test]
async fn exact_price_buy_transfers_ownership_and_funds() {
    let ctx = setup().await;
    let alice = addr(1);
    let bob = addr(5);
    fund(&ctx, alice, Wei(1_000)).await;
    fund(&ctx, bob, Wei(1_000)).await;
    let id = mint_for(&ctx, alice).await;
    expect_commit(
        &ctx,
        envelope(
            alice,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei(100),
            },
        ),
    )
    .await;

    let listed = house(&ctx, id).await.expect("query").expect("record");
    assert_eq!(listed.owner, alice);
    assert_eq!(listed.price, Wei(100));
    assert!(listed.is_listed);

    let alice_before = balance(&ctx, alice).await.expect("alice");
    let bob_before = balance(&ctx, bob).await.expect("bob");

    expect_commit(&ctx, envelope(bob, Wei(100), SubmitCall::Buy { house_id: id })).await;

    let sold = house(&ctx, id).await.expect("query").expect("record");
    assert_eq!(sold.owner, bob);
    assert!(!sold.is_listed);
    assert_eq!(sold.price, Wei(100));

    // Seller receives the full price; the buyer pays price plus the fee.
    let alice_after = balance(&ctx, alice).await.expect("alice");
    let bob_after = balance(&ctx, bob).await.expect("bob");
    assert_eq!(alice_after, alice_before.checked_add(Wei(100)).expect("add"));
    assert_eq!(
        bob_after,
        bob_before
            .checked_sub(Wei(100))
            .and_then(|w| w.checked_sub(FEE))
            .expect("sub")
    );
    assert_listed_invariant(&ctx).await;
}

#[tokio::test]
async fn underpayment_is_rejected_with_ownership_unchanged() {
    let ctx = setup().await;
    let alice = addr(1);
    let bob = addr(5);
    fund(&ctx, alice, Wei(1_000)).await;
    fund(&ctx, bob, Wei(1_000)).await;
    let id = mint_for(&ctx, alice).await;
    expect_commit(
        &ctx,
        envelope(
            alice,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei(100),
            },
        ),
    )
    .await;

    let reason = expect_reject(&ctx, envelope(bob, Wei(50), SubmitCall::Buy { house_id: id })).await;
    assert_eq!(reason, RejectReason::InsufficientPayment);

    let record = house(&ctx, id).await.expect("query").expect("record");
    assert_eq!(record.owner, alice);
    assert!(record.is_listed);
}

#[tokio::test]
async fn overpayment_is_rejected_the_same_way() {
    let ctx = setup().await;
    let alice = addr(1);
    let bob = addr(5);
    fund(&ctx, alice, Wei(1_000)).await;
    fund(&ctx, bob, Wei(1_000)).await;
    let id = mint_for(&ctx, alice).await;
    expect_commit(
        &ctx,
        envelope(
            alice,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei(100),
            },
        ),
    )
    .await;

    let reason =
        expect_reject(&ctx, envelope(bob, Wei(150), SubmitCall::Buy { house_id: id })).await;
    assert_eq!(reason, RejectReason::InsufficientPayment);
}

#[tokio::test]
async fn buying_an_unlisted_house_is_rejected_never_a_no_op() {
    let ctx = setup().await;
    let alice = addr(1);
    let bob = addr(5);
    fund(&ctx, alice, Wei(1_000)).await;
    fund(&ctx, bob, Wei(1_000)).await;
    let id = mint_for(&ctx, alice).await;

    let reason =
        expect_reject(&ctx, envelope(bob, Wei(100), SubmitCall::Buy { house_id: id })).await;
    assert_eq!(reason, RejectReason::NotListed);

    let record = house(&ctx, id).await.expect("query").expect("record");
    assert_eq!(record.owner, alice);
}

#[tokio::test]
async fn self_purchase_is_rejected() {
    let ctx = setup().await;
    let alice = addr(1);
    fund(&ctx, alice, Wei(1_000)).await;
    let id = mint_for(&ctx, alice).await;
    expect_commit(
        &ctx,
        envelope(
            alice,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei(100),
            },
        ),
    )
    .await;

    let reason =
        expect_reject(&ctx, envelope(alice, Wei(100), SubmitCall::Buy { house_id: id })).await;
    assert_eq!(reason, RejectReason::BuyerIsOwner);
}

#[tokio::test]
async fn buyer_without_funds_for_the_price_is_rejected() {
    let ctx = setup().await;
    let alice = addr(1);
    let pauper = addr(6);
    fund(&ctx, alice, Wei(1_000)).await;
    fund(&ctx, pauper, Wei(60)).await; // covers the fee, not the price
    let id = mint_for(&ctx, alice).await;
    expect_commit(
        &ctx,
        envelope(
            alice,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei(100),
            },
        ),
    )
    .await;

    let reason = expect_reject(
        &ctx,
        envelope(pauper, Wei(100), SubmitCall::Buy { house_id: id }),
    )
    .await;
    assert_eq!(reason, RejectReason::InsufficientFunds);
    let record = house(&ctx, id).await.expect("query").expect("record");
    assert_eq!(record.owner, alice);
    assert!(record.is_listed);
}

#[tokio::test]
async fn the_fee_is_consumed_even_when_the_operation_is_rejected() {
    let ctx = setup().await;
    let carol = addr(4);
    fund(&ctx, carol, Wei(1_000)).await;

    let before = balance(&ctx, carol).await.expect("balance");
    expect_reject(
        &ctx,
        envelope(
            carol,
            Wei::ZERO,
            SubmitCall::List {
                house_id: HouseId(999),
                price: Wei(100),
            },
        ),
    )
    .await;
    let after = balance(&ctx, carol).await.expect("balance");
    assert_eq!(after, before.checked_sub(FEE).expect("sub"));
}

#[tokio::test]
async fn fee_unpayable_rejects_without_any_effect() {
    let ctx = setup().await;
    let broke = addr(7);
    let reason = expect_reject(&ctx, envelope(broke, Wei::ZERO, SubmitCall::Mint { target: None })).await;
    assert_eq!(reason, RejectReason::FeeUnpayable);
    assert!(houses_owned_by(&ctx, broke).await.expect("query").is_empty());
    assert_eq!(balance(&ctx, broke).await.expect("balance"), Wei::ZERO);
}

#[tokio::test]
async fn unknown_house_rejections_are_distinguishable() {
    let ctx = setup().await;
    let bob = addr(5);
    fund(&ctx, bob, Wei(1_000)).await;
    let reason = expect_reject(
        &ctx,
        envelope(bob, Wei(100), SubmitCall::Buy { house_id: HouseId(42) }),
    )
    .await;
    assert_eq!(reason, RejectReason::UnknownHouse);
}

#[tokio::test]
async fn zero_caller_cannot_submit() {
    let ctx = setup().await;
    let reason = expect_reject(
        &ctx,
        envelope(Address::ZERO, Wei::ZERO, SubmitCall::Mint { target: None }),
    )
    .await;
    assert_eq!(reason, RejectReason::ZeroIdentity);
}

#[tokio::test]
async fn full_lifecycle_scenario() {
    let ctx = setup().await;
    let a = addr(0xa0);
    let b = addr(0xb0);
    fund(&ctx, a, Wei(1_000)).await;
    fund(&ctx, b, Wei(1_000)).await;

    let id = mint_for(&ctx, a).await;
    expect_commit(
        &ctx,
        envelope(
            a,
            Wei::ZERO,
            SubmitCall::List {
                house_id: id,
                price: Wei(100),
            },
        ),
    )
    .await;

    let listed = house(&ctx, id).await.expect("query").expect("record");
    assert_eq!((listed.owner, listed.price, listed.is_listed), (a, Wei(100), true));

    expect_commit(&ctx, envelope(b, Wei(100), SubmitCall::Buy { house_id: id })).await;

    let sold = house(&ctx, id).await.expect("query").expect("record");
    assert_eq!((sold.owner, sold.price, sold.is_listed), (b, Wei(100), false));
}
