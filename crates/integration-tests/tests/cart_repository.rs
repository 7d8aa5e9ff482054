//! Cart reconciliation against `PostgreSQL`.
//!
//! These tests require a database; they are skipped unless
//! `BILLING_DATABASE_URL` (or `DATABASE_URL`) is set. Migrations are applied
//! on first use and every test works on freshly created rows.
//!
//! Run with: cargo test -p ledgerline-integration-tests --test cart_repository

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use ledgerline_billing::db::{
    CartItemRepository, OrganizationRepository, PlanRepository, UserRepository,
};
use ledgerline_billing::models::{NewOrganization, Plan, SessionCartItem};
use ledgerline_billing::services::{CartError, PendingCart, reconcile};
use ledgerline_core::{CurrencyCode, Email, PlanId, PlanInterval, Slug, UserId};
use sqlx::PgPool;
use uuid::Uuid;

/// Connect and migrate, or `None` when no database is configured.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("BILLING_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;
    let pool = PgPool::connect(&url).await.unwrap();
    sqlx::migrate!("../billing/migrations").run(&pool).await.unwrap();
    Some(pool)
}

struct Fixture {
    user: UserId,
    plan: Slug,
}

/// A fresh user and a provider selling one plan, with unique slugs.
async fn fixture(pool: &PgPool) -> Fixture {
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..12];

    let user = UserRepository::new(pool)
        .create(
            &Slug::parse(&format!("user-{suffix}")).unwrap(),
            &Email::parse(&format!("user-{suffix}@acme.io")).unwrap(),
            "Alice",
            "Doe",
        )
        .await
        .unwrap();

    let provider = OrganizationRepository::new(pool)
        .create(
            &NewOrganization {
                slug: Slug::parse(&format!("provider-{suffix}")).unwrap(),
                full_name: "Cowork Inc.".to_owned(),
                email: Email::parse(&format!("billing-{suffix}@acme.io")).unwrap(),
                is_provider: true,
            },
            None,
        )
        .await
        .unwrap();

    let plan = PlanRepository::new(pool)
        .create(&Plan {
            id: PlanId::new(0),
            slug: Slug::parse(&format!("basic-{suffix}")).unwrap(),
            title: "Basic".to_owned(),
            description: String::new(),
            organization_id: provider.id,
            is_active: true,
            period_amount: 2000,
            unit: CurrencyCode::Usd,
            interval: PlanInterval::Monthly,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    Fixture {
        user: user.id,
        plan: plan.slug,
    }
}

fn entry(plan: &Slug, quantity: Option<u32>) -> SessionCartItem {
    SessionCartItem {
        quantity,
        ..SessionCartItem::for_plan(plan.as_str())
    }
}

/// `(plan slug, quantity)` of the user's open cart items, oldest first.
async fn open_items(pool: &PgPool, user: UserId) -> Vec<(String, Option<i32>)> {
    sqlx::query_as(
        r"
        SELECT p.slug, ci.quantity
        FROM saas.cart_item ci
        JOIN saas.plan p ON p.id = ci.plan_id
        WHERE ci.user_id = $1 AND NOT ci.recorded
        ORDER BY ci.id
        ",
    )
    .bind(user)
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_repository_reconcile_twice_is_idempotent() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let fx = fixture(&pool).await;
    let store = CartItemRepository::new(&pool);
    let items = vec![entry(&fx.plan, Some(2))];

    let mut first = PendingCart::new(Some(items.clone()), None);
    let summary = reconcile(&store, fx.user, None, &mut first).await.unwrap();
    assert_eq!(summary.merged.created, 1);
    let after_first = open_items(&pool, fx.user).await;

    let mut second = PendingCart::new(Some(items), None);
    let summary = reconcile(&store, fx.user, None, &mut second).await.unwrap();
    assert_eq!(summary.merged.created, 0);
    assert_eq!(summary.merged.unchanged, 1);

    assert_eq!(open_items(&pool, fx.user).await, after_first);
}

#[tokio::test]
async fn test_repository_keeps_existing_quantity() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let fx = fixture(&pool).await;
    let store = CartItemRepository::new(&pool);

    let mut pending = PendingCart::new(Some(vec![entry(&fx.plan, Some(3))]), None);
    reconcile(&store, fx.user, None, &mut pending).await.unwrap();

    let mut pending = PendingCart::new(Some(vec![entry(&fx.plan, Some(5))]), None);
    reconcile(&store, fx.user, None, &mut pending).await.unwrap();

    assert_eq!(
        open_items(&pool, fx.user).await,
        [(fx.plan.to_string(), Some(3))]
    );
}

#[tokio::test]
async fn test_repository_fills_unset_quantity() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let fx = fixture(&pool).await;
    let store = CartItemRepository::new(&pool);

    let mut pending = PendingCart::new(Some(vec![entry(&fx.plan, None)]), None);
    reconcile(&store, fx.user, None, &mut pending).await.unwrap();

    let mut pending = PendingCart::new(Some(vec![entry(&fx.plan, Some(5))]), None);
    let summary = reconcile(&store, fx.user, None, &mut pending).await.unwrap();

    assert_eq!(summary.merged.updated, 1);
    assert_eq!(
        open_items(&pool, fx.user).await,
        [(fx.plan.to_string(), Some(5))]
    );
}

#[tokio::test]
async fn test_repository_unknown_plan_rolls_back_merge() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let fx = fixture(&pool).await;
    let store = CartItemRepository::new(&pool);
    let unknown = Slug::parse(&format!("gone-{}", Uuid::new_v4().simple())).unwrap();

    let mut pending = PendingCart::new(
        Some(vec![entry(&fx.plan, Some(1)), entry(&unknown, Some(1))]),
        None,
    );
    let err = reconcile(&store, fx.user, None, &mut pending)
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::PlanNotFound(plan) if plan == unknown.as_str()));
    assert!(open_items(&pool, fx.user).await.is_empty());
    assert_eq!(pending.cart_items().map(<[_]>::len), Some(2));
}
