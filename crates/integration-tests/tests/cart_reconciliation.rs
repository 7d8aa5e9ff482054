//! Integration tests for cart reconciliation on login.
//!
//! Run with: cargo test -p ledgerline-integration-tests --test cart_reconciliation

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use ledgerline_billing::models::{SessionCartItem, session_keys};
use ledgerline_billing::services::{CartError, PendingCart, reconcile};
use ledgerline_core::UserId;
use ledgerline_integration_tests::MemoryBilling;
use tower_sessions::{MemoryStore, Session};

const ALICE: UserId = UserId::new(100);

fn store_with_plans() -> MemoryBilling {
    let store = MemoryBilling::new();
    let provider = store.add_organization("cowork", "Cowork Inc.", true);
    store.add_plan("basic", &provider);
    store.add_plan("premium", &provider);
    store.add_coupon("WELCOME", &provider);
    store
}

fn entry(plan: &str, quantity: Option<u32>) -> SessionCartItem {
    SessionCartItem {
        quantity,
        ..SessionCartItem::for_plan(plan)
    }
}

fn new_session() -> Session {
    Session::new(None, Arc::new(MemoryStore::default()), None)
}

// ============================================================================
// Merge Tests
// ============================================================================

#[tokio::test]
async fn test_reconcile_twice_is_idempotent() {
    let store = store_with_plans();
    let items = vec![entry("basic", Some(2)), entry("premium", None)];

    let mut first = PendingCart::new(Some(items.clone()), Some(vec!["WELCOME".to_owned()]));
    let summary = reconcile(&store, ALICE, None, &mut first).await.unwrap();
    assert_eq!(summary.merged.created, 2);
    assert_eq!(summary.redeemed, 2);
    let after_first = store.cart_items();

    // Same session contents replayed (e.g. the save failed after the commit)
    let mut second = PendingCart::new(Some(items), Some(vec!["WELCOME".to_owned()]));
    let summary = reconcile(&store, ALICE, None, &mut second).await.unwrap();
    assert_eq!(summary.merged.created, 0);
    assert_eq!(summary.merged.unchanged, 2);
    assert_eq!(summary.redeemed, 0);

    assert_eq!(store.cart_items(), after_first);
}

#[tokio::test]
async fn test_existing_quantity_is_not_overwritten() {
    let store = store_with_plans();

    let mut pending = PendingCart::new(Some(vec![entry("basic", Some(3))]), None);
    reconcile(&store, ALICE, None, &mut pending).await.unwrap();

    let mut pending = PendingCart::new(Some(vec![entry("basic", Some(5))]), None);
    reconcile(&store, ALICE, None, &mut pending).await.unwrap();

    let items = store.open_items(ALICE);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, Some(3));
}

#[tokio::test]
async fn test_unset_quantity_is_filled() {
    let store = store_with_plans();

    let mut pending = PendingCart::new(Some(vec![entry("basic", None)]), None);
    reconcile(&store, ALICE, None, &mut pending).await.unwrap();

    let mut pending = PendingCart::new(Some(vec![entry("basic", Some(5))]), None);
    let summary = reconcile(&store, ALICE, None, &mut pending).await.unwrap();

    assert_eq!(summary.merged.updated, 1);
    assert_eq!(store.open_items(ALICE)[0].quantity, Some(5));
}

#[tokio::test]
async fn test_on_behalf_of_entries_are_separate_items() {
    let store = store_with_plans();
    let for_bob = SessionCartItem {
        first_name: Some("Bob".to_owned()),
        last_name: Some("Smith".to_owned()),
        sync_on: Some("bob@acme.io".to_owned()),
        ..SessionCartItem::for_plan("basic")
    };

    let mut pending = PendingCart::new(Some(vec![entry("basic", Some(1)), for_bob]), None);
    let summary = reconcile(&store, ALICE, None, &mut pending).await.unwrap();

    assert_eq!(summary.merged.created, 2);
    assert_eq!(store.open_items(ALICE).len(), 2);
}

// ============================================================================
// Claim And Redeem Tests
// ============================================================================

#[tokio::test]
async fn test_claim_code_transfers_ownership() {
    let store = store_with_plans();
    store.add_claimable("premium", "gift-42");

    let mut pending = PendingCart::default();
    let summary = reconcile(&store, ALICE, Some("gift-42"), &mut pending)
        .await
        .unwrap();

    assert_eq!(summary.claimed, 1);
    let items = store.open_items(ALICE);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].claim_code, None);

    // The code cannot be used twice
    let summary = reconcile(&store, UserId::new(200), Some("gift-42"), &mut pending)
        .await
        .unwrap();
    assert_eq!(summary.claimed, 0);
}

#[tokio::test]
async fn test_unknown_coupon_is_skipped() {
    let store = store_with_plans();
    let mut pending = PendingCart::new(
        Some(vec![entry("basic", Some(1))]),
        Some(vec!["NOPE".to_owned(), "WELCOME".to_owned()]),
    );

    let summary = reconcile(&store, ALICE, None, &mut pending).await.unwrap();

    assert_eq!(summary.redeemed, 1);
    assert!(pending.is_empty());
    assert_eq!(
        store.open_items(ALICE)[0].coupon.as_deref(),
        Some("WELCOME")
    );
}

#[tokio::test]
async fn test_unknown_plan_keeps_session_cart() {
    let store = store_with_plans();
    let items = vec![entry("basic", Some(1)), entry("gold", Some(1))];
    let mut pending = PendingCart::new(Some(items), None);

    let err = reconcile(&store, ALICE, None, &mut pending)
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::PlanNotFound(plan) if plan == "gold"));
    assert!(store.cart_items().is_empty());
    assert_eq!(pending.cart_items().map(<[_]>::len), Some(2));
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_session_keys_removed_after_reconcile() {
    let store = store_with_plans();
    let session = new_session();
    session
        .insert(session_keys::CART_ITEMS, vec![entry("basic", Some(1))])
        .await
        .unwrap();
    session
        .insert(session_keys::REDEEMED, vec!["WELCOME".to_owned()])
        .await
        .unwrap();

    let mut pending = PendingCart::load(&session).await.unwrap();
    reconcile(&store, ALICE, None, &mut pending).await.unwrap();
    pending.save(&session).await.unwrap();

    let left: Option<Vec<SessionCartItem>> = session.get(session_keys::CART_ITEMS).await.unwrap();
    assert!(left.is_none());
    let left: Option<Vec<String>> = session.get(session_keys::REDEEMED).await.unwrap();
    assert!(left.is_none());
    assert!(PendingCart::load(&session).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_merge_leaves_session_untouched() {
    let store = store_with_plans();
    let session = new_session();
    session
        .insert(session_keys::CART_ITEMS, vec![entry("gold", Some(1))])
        .await
        .unwrap();

    let mut pending = PendingCart::load(&session).await.unwrap();
    assert!(reconcile(&store, ALICE, None, &mut pending).await.is_err());
    pending.save(&session).await.unwrap();

    let left: Option<Vec<SessionCartItem>> = session.get(session_keys::CART_ITEMS).await.unwrap();
    assert_eq!(left.map(|items| items.len()), Some(1));
}
