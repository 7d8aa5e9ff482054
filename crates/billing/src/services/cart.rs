//! Cart reconciliation.
//!
//! Moves everything a visitor put in their cart before logging in into
//! durable cart items owned by the now-authenticated user:
//!
//! 1. cart items previously prepared under a claim code change owner,
//! 2. session cart entries are merged into open cart items,
//! 3. coupon codes redeemed in the session are applied.
//!
//! Each step is its own transaction in the store. A step's session key is
//! only consumed once that step has been persisted, so a failure in a later
//! step never loses what an earlier step already saved, and re-running the
//! whole reconciliation converges instead of duplicating records.

use std::future::Future;

use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use ledgerline_core::UserId;

use crate::db::RepositoryError;
use crate::models::{MergeSummary, SessionCartItem, session_keys};

/// Errors raised while reconciling a cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// A session entry references a plan that does not exist.
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    /// Storage failure.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Storage operations reconciliation relies on.
///
/// Every method runs in its own transaction.
pub trait CartStore: Send + Sync {
    /// Give every cart item prepared under `code` to `user`.
    ///
    /// Returns the number of items claimed.
    fn claim(&self, user: UserId, code: &str)
    -> impl Future<Output = Result<u64, CartError>> + Send;

    /// Merge session entries into the user's open cart items.
    ///
    /// For each entry, the first open item matching (user, plan, first name,
    /// last name, `sync_on`) absorbs the entry's unset fields; when none
    /// matches a new item is created. Fails with [`CartError::PlanNotFound`]
    /// and persists nothing if any entry names an unknown plan.
    fn merge_items(
        &self,
        user: UserId,
        items: &[SessionCartItem],
    ) -> impl Future<Output = Result<MergeSummary, CartError>> + Send;

    /// Apply redeemed coupon codes to the user's open cart items.
    ///
    /// Returns the number of items that received a coupon.
    fn redeem(
        &self,
        user: UserId,
        codes: &[String],
    ) -> impl Future<Output = Result<u64, CartError>> + Send;
}

/// Cart state carried in the session, loaded once per request.
///
/// Reconciliation consumes the parts it persisted; [`PendingCart::save`]
/// then writes the remaining state back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingCart {
    cart_items: Option<Vec<SessionCartItem>>,
    redeemed: Option<Vec<String>>,
    consumed_items: bool,
    consumed_redeemed: bool,
}

impl PendingCart {
    /// Build from explicit values (keys absent from the session are `None`).
    #[must_use]
    pub const fn new(cart_items: Option<Vec<SessionCartItem>>, redeemed: Option<Vec<String>>) -> Self {
        Self {
            cart_items,
            redeemed,
            consumed_items: false,
            consumed_redeemed: false,
        }
    }

    /// Read the pending cart keys from the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails or a key does not
    /// deserialize.
    pub async fn load(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        let cart_items = session
            .get::<Vec<SessionCartItem>>(session_keys::CART_ITEMS)
            .await?;
        let redeemed = session.get::<Vec<String>>(session_keys::REDEEMED).await?;
        Ok(Self::new(cart_items, redeemed))
    }

    /// Remove the keys whose content has been persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        if self.consumed_items {
            session
                .remove::<Vec<SessionCartItem>>(session_keys::CART_ITEMS)
                .await?;
        }
        if self.consumed_redeemed {
            session.remove::<Vec<String>>(session_keys::REDEEMED).await?;
        }
        Ok(())
    }

    /// Session cart entries not yet persisted.
    #[must_use]
    pub fn cart_items(&self) -> Option<&[SessionCartItem]> {
        self.cart_items.as_deref()
    }

    /// Redeemed coupon codes not yet persisted.
    #[must_use]
    pub fn redeemed(&self) -> Option<&[String]> {
        self.redeemed.as_deref()
    }

    /// Returns `true` if nothing is left to persist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cart_items.is_none() && self.redeemed.as_ref().is_none_or(Vec::is_empty)
    }

    fn consume_cart_items(&mut self) {
        self.cart_items = None;
        self.consumed_items = true;
    }

    fn consume_redeemed(&mut self) {
        self.redeemed = None;
        self.consumed_redeemed = true;
    }
}

/// What a reconciliation run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub claimed: u64,
    pub merged: MergeSummary,
    pub redeemed: u64,
}

/// Transfer the pending cart into durable storage for `user`.
///
/// `pending` is updated in place as each step succeeds; callers should save
/// it back to the session whether or not this returns an error.
///
/// # Errors
///
/// Returns the first failing step's error. Steps before it stay persisted
/// and consumed.
#[instrument(skip(store, pending), fields(user_id = %user))]
pub async fn reconcile<S: CartStore>(
    store: &S,
    user: UserId,
    claim_code: Option<&str>,
    pending: &mut PendingCart,
) -> Result<ReconcileSummary, CartError> {
    let mut summary = ReconcileSummary::default();

    if let Some(code) = claim_code.filter(|c| !c.is_empty()) {
        summary.claimed = store.claim(user, code).await?;
    }

    if let Some(items) = pending.cart_items() {
        summary.merged = store.merge_items(user, items).await?;
        pending.consume_cart_items();
    }

    if let Some(codes) = pending.redeemed().filter(|codes| !codes.is_empty()) {
        summary.redeemed = store.redeem(user, codes).await?;
        pending.consume_redeemed();
    }

    tracing::info!(
        claimed = summary.claimed,
        created = summary.merged.created,
        updated = summary.merged.updated,
        redeemed = summary.redeemed,
        "Cart reconciled"
    );

    Ok(summary)
}
