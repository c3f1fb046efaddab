//! Integration tests for cart reconciliation.
//!
//! These scenarios drive the reconciler's query-then-write sequences end to
//! end against the in-memory store and verify the uniqueness invariant:
//! at most one stored record per (user, product) pair, deleted exactly when
//! the running quantity reaches zero.

use velvet_bean_core::{ProductId, UserId};
use velvet_bean_integration_tests::{TestContext, test_product};
use velvet_bean_sync::{
    CartLine, CollectionStore, Filter, MutationGate, StoreError, SyncError,
};

async fn stored_quantity(ctx: &TestContext, user: &str, product: &str) -> Option<u32> {
    let docs = ctx
        .store
        .query(
            &ctx.config.cart_collection,
            &Filter::key(UserId::new(user), ProductId::new(product)),
        )
        .await
        .expect("query");
    docs.first()
        .map(|doc| doc.deserialize::<CartLine>().expect("cart line").quantity)
}

// =============================================================================
// Upsert/Increment Scenarios
// =============================================================================

#[tokio::test]
async fn add_then_add_then_remove_all() {
    let ctx = TestContext::signed_in("u1");
    let product = test_product("p1", 1450);

    // Empty cart: first add inserts quantity 1.
    ctx.reconciler.add_to_cart(&product).await.expect("add");
    assert_eq!(stored_quantity(&ctx, "u1", "p1").await, Some(1));

    // Second add updates the same record to 2; no second record.
    ctx.reconciler.add_to_cart(&product).await.expect("add");
    assert_eq!(ctx.store.len(&ctx.config.cart_collection), 1);
    assert_eq!(stored_quantity(&ctx, "u1", "p1").await, Some(2));

    // Delta -2 reaches zero: the record is deleted, not stored at zero.
    ctx.reconciler
        .upsert_or_increment(&product, -2)
        .await
        .expect("remove");
    assert!(ctx.store.is_empty(&ctx.config.cart_collection));
}

#[tokio::test]
async fn stored_quantity_equals_sum_of_deltas() {
    let ctx = TestContext::signed_in("u1");
    let product = test_product("p1", 999);

    for delta in [1, 4, -2, 3] {
        ctx.reconciler
            .upsert_or_increment(&product, delta)
            .await
            .expect("delta");
    }

    assert_eq!(stored_quantity(&ctx, "u1", "p1").await, Some(6));
    assert_eq!(ctx.store.len(&ctx.config.cart_collection), 1);
}

#[tokio::test]
async fn remove_on_absent_key_is_a_noop() {
    let ctx = TestContext::signed_in("u1");
    let product = test_product("p1", 1450);

    ctx.reconciler
        .upsert_or_increment(&product, -1)
        .await
        .expect("noop remove");
    assert!(ctx.store.is_empty(&ctx.config.cart_collection));
}

#[tokio::test]
async fn distinct_products_get_distinct_records() {
    let ctx = TestContext::signed_in("u1");

    ctx.reconciler
        .add_to_cart(&test_product("p1", 1450))
        .await
        .expect("add p1");
    ctx.reconciler
        .add_to_cart(&test_product("p2", 500))
        .await
        .expect("add p2");

    assert_eq!(ctx.store.len(&ctx.config.cart_collection), 2);
    assert_eq!(stored_quantity(&ctx, "u1", "p1").await, Some(1));
    assert_eq!(stored_quantity(&ctx, "u1", "p2").await, Some(1));
}

// =============================================================================
// Drawer Operations
// =============================================================================

#[tokio::test]
async fn drawer_stepper_updates_and_deletes() {
    let ctx = TestContext::signed_in("u1");
    let product = test_product("p1", 1450);
    ctx.reconciler.add_to_cart(&product).await.expect("add");

    let docs = ctx
        .store
        .query(
            &ctx.config.cart_collection,
            &Filter::key(UserId::new("u1"), ProductId::new("p1")),
        )
        .await
        .expect("query");
    let record_id = docs.first().expect("record").id.clone();

    ctx.reconciler
        .set_quantity(&record_id, 3)
        .await
        .expect("set");
    assert_eq!(stored_quantity(&ctx, "u1", "p1").await, Some(3));

    // Stepping down to zero is equivalent to the remove button.
    ctx.reconciler
        .set_quantity(&record_id, 0)
        .await
        .expect("set zero");
    assert!(ctx.store.is_empty(&ctx.config.cart_collection));
    assert_eq!(ctx.notice_text().as_deref(), Some("Item removed from cart"));
}

#[tokio::test]
async fn drawer_gate_blocks_overlapping_mutations() {
    let gate = MutationGate::new();

    let permit = gate.try_begin().expect("idle gate");
    // The drawer refuses a second mutation while the first is in flight.
    assert!(gate.try_begin().is_none());
    drop(permit);
    assert!(gate.try_begin().is_some());

    // A different entry point (product card) shares no flag and proceeds.
    let card_gate = MutationGate::new();
    let _drawer = gate.try_begin().expect("idle again");
    assert!(card_gate.try_begin().is_some());
}

// =============================================================================
// Auth and Error Paths
// =============================================================================

#[tokio::test]
async fn signed_out_mutations_are_rejected_with_prompt() {
    let ctx = TestContext::signed_out();

    let err = ctx
        .reconciler
        .add_to_cart(&test_product("p1", 1450))
        .await
        .expect_err("no user");
    assert!(matches!(err, SyncError::AuthRequired));
    assert!(ctx.store.is_empty(&ctx.config.cart_collection));
    assert_eq!(
        ctx.notice_text().as_deref(),
        Some("Please log in to add items to cart")
    );
}

#[tokio::test]
async fn store_outage_surfaces_without_partial_write() {
    let ctx = TestContext::signed_in("u1");

    ctx.store
        .fail_next(StoreError::Unavailable("connection reset".to_string()));
    let err = ctx
        .reconciler
        .add_to_cart(&test_product("p1", 1450))
        .await
        .expect_err("outage");
    assert!(matches!(err, SyncError::StoreUnavailable(_)));
    assert!(ctx.store.is_empty(&ctx.config.cart_collection));
    assert_eq!(ctx.notice_text().as_deref(), Some("Error adding item to cart"));

    // Not retried automatically; an explicit re-trigger succeeds.
    ctx.reconciler
        .add_to_cart(&test_product("p1", 1450))
        .await
        .expect("retry by user");
    assert_eq!(stored_quantity(&ctx, "u1", "p1").await, Some(1));
}

#[tokio::test]
async fn rejected_write_surfaces_verbatim_taxonomy() {
    let ctx = TestContext::signed_in("u1");

    ctx.store
        .fail_next(StoreError::Rejected("schema mismatch".to_string()));
    let err = ctx
        .reconciler
        .add_to_cart(&test_product("p1", 1450))
        .await
        .expect_err("rejected");
    match err {
        SyncError::StoreWriteRejected(msg) => assert!(msg.contains("schema mismatch")),
        other => panic!("expected StoreWriteRejected, got {other:?}"),
    }
}
