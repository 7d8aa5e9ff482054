//! Cart item repository.
//!
//! Implements [`CartStore`] on `PostgreSQL`. Each store operation runs in
//! its own transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use ledgerline_core::{CartItemId, PlanId, Slug, UserId};

use super::RepositoryError;
use crate::models::{CartItem, MergeSummary, SessionCartItem};
use crate::services::cart::{CartError, CartStore};

/// Repository for cart item database operations.
pub struct CartItemRepository<'a> {
    pool: &'a PgPool,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    user_id: Option<UserId>,
    plan_id: PlanId,
    plan_slug: Slug,
    coupon: Option<String>,
    quantity: Option<i32>,
    first_name: String,
    last_name: String,
    sync_on: String,
    claim_code: Option<String>,
    recorded: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = row
            .quantity
            .map(u32::try_from)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid quantity: {e}")))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            plan_id: row.plan_id,
            plan_slug: row.plan_slug,
            coupon: row.coupon,
            quantity,
            first_name: row.first_name,
            last_name: row.last_name,
            sync_on: row.sync_on,
            claim_code: row.claim_code,
            recorded: row.recorded,
            created_at: row.created_at,
        })
    }
}

const SELECT_ITEM: &str = r"
    SELECT ci.id, ci.user_id, ci.plan_id, p.slug AS plan_slug, ci.coupon,
           ci.quantity, ci.first_name, ci.last_name, ci.sync_on,
           ci.claim_code, ci.recorded, ci.created_at
    FROM saas.cart_item ci
    JOIN saas.plan p ON p.id = ci.plan_id
";

impl<'a> CartItemRepository<'a> {
    /// Create a new cart item repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn merge_one(
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        entry: &SessionCartItem,
        summary: &mut MergeSummary,
    ) -> Result<(), CartError> {
        // Duplicates are tolerated; the oldest match wins
        let existing: Option<CartItemRow> = sqlx::query_as(&format!(
            "{SELECT_ITEM}
             WHERE ci.user_id = $1 AND p.slug = $2 AND NOT ci.recorded
               AND ci.first_name = $3 AND ci.last_name = $4 AND ci.sync_on = $5
             ORDER BY ci.id
             LIMIT 1
             FOR UPDATE OF ci"
        ))
        .bind(user)
        .bind(&entry.plan)
        .bind(entry.first_name())
        .bind(entry.last_name())
        .bind(entry.sync_on())
        .fetch_optional(&mut **tx)
        .await
        .map_err(RepositoryError::from)?;

        if let Some(row) = existing {
            let mut item = CartItem::try_from(row)?;
            if !item.absorb(entry) {
                summary.unchanged += 1;
                return Ok(());
            }
            sqlx::query(
                r"
                UPDATE saas.cart_item
                SET coupon = $2, quantity = $3, first_name = $4, last_name = $5, sync_on = $6
                WHERE id = $1
                ",
            )
            .bind(item.id)
            .bind(&item.coupon)
            .bind(quantity_column(item.quantity)?)
            .bind(&item.first_name)
            .bind(&item.last_name)
            .bind(&item.sync_on)
            .execute(&mut **tx)
            .await
            .map_err(RepositoryError::from)?;
            summary.updated += 1;
            return Ok(());
        }

        let plan_id: Option<PlanId> = sqlx::query_scalar("SELECT id FROM saas.plan WHERE slug = $1")
            .bind(&entry.plan)
            .fetch_optional(&mut **tx)
            .await
            .map_err(RepositoryError::from)?;
        let plan_id = plan_id.ok_or_else(|| CartError::PlanNotFound(entry.plan.clone()))?;

        sqlx::query(
            r"
            INSERT INTO saas.cart_item (user_id, plan_id, coupon, quantity, first_name, last_name, sync_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(user)
        .bind(plan_id)
        .bind(entry.coupon())
        .bind(quantity_column(entry.quantity())?)
        .bind(entry.first_name())
        .bind(entry.last_name())
        .bind(entry.sync_on())
        .execute(&mut **tx)
        .await
        .map_err(RepositoryError::from)?;
        summary.created += 1;
        Ok(())
    }
}

fn quantity_column(quantity: Option<u32>) -> Result<Option<i32>, RepositoryError> {
    quantity
        .map(i32::try_from)
        .transpose()
        .map_err(|e| RepositoryError::DataCorruption(format!("quantity out of range: {e}")))
}

impl CartStore for CartItemRepository<'_> {
    #[instrument(skip(self, code))]
    async fn claim(&self, user: UserId, code: &str) -> Result<u64, CartError> {
        let result = sqlx::query(
            r"
            UPDATE saas.cart_item
            SET user_id = $1, claim_code = NULL
            WHERE claim_code = $2 AND NOT recorded
            ",
        )
        .bind(user)
        .bind(code)
        .execute(self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn merge_items(
        &self,
        user: UserId,
        items: &[SessionCartItem],
    ) -> Result<MergeSummary, CartError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let mut summary = MergeSummary::default();
        for entry in items {
            Self::merge_one(&mut tx, user, entry, &mut summary).await?;
        }
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(summary)
    }

    #[instrument(skip(self, codes))]
    async fn redeem(&self, user: UserId, codes: &[String]) -> Result<u64, CartError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let mut applied = 0;
        for code in codes {
            let known: bool = sqlx::query_scalar(
                r"
                SELECT EXISTS(
                    SELECT 1 FROM saas.coupon
                    WHERE code = $1 AND (ends_at IS NULL OR ends_at > NOW())
                )
                ",
            )
            .bind(code)
            .fetch_one(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            if !known {
                tracing::warn!(code = %code, "Skipping unknown or expired coupon");
                continue;
            }

            let result = sqlx::query(
                r"
                UPDATE saas.cart_item ci
                SET coupon = c.code
                FROM saas.coupon c, saas.plan p
                WHERE c.code = $2
                  AND (c.ends_at IS NULL OR c.ends_at > NOW())
                  AND p.id = ci.plan_id
                  AND p.organization_id = c.organization_id
                  AND ci.user_id = $1
                  AND NOT ci.recorded
                  AND COALESCE(ci.coupon, '') = ''
                ",
            )
            .bind(user)
            .bind(code)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
            applied += result.rows_affected();
        }
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(applied)
    }
}
