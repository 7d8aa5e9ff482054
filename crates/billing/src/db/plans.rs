//! Plan repository.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ledgerline_core::{CurrencyCode, OrganizationId, PlanId, PlanInterval, Slug};

use super::RepositoryError;
use crate::models::Plan;

#[derive(sqlx::FromRow)]
struct PlanRow {
    id: PlanId,
    slug: Slug,
    title: String,
    description: String,
    organization_id: OrganizationId,
    is_active: bool,
    period_amount: i64,
    unit: String,
    interval: PlanInterval,
    created_at: DateTime<Utc>,
}

impl TryFrom<PlanRow> for Plan {
    type Error = RepositoryError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let unit: CurrencyCode = row
            .unit
            .parse()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid plan unit: {e}")))?;
        Ok(Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            organization_id: row.organization_id,
            is_active: row.is_active,
            period_amount: row.period_amount,
            unit,
            interval: row.interval,
            created_at: row.created_at,
        })
    }
}

const PLAN_COLUMNS: &str =
    "id, slug, title, description, organization_id, is_active, period_amount, unit, interval, created_at";

/// Repository for plan database operations.
pub struct PlanRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PlanRepository<'a> {
    /// Create a new plan repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Plans of a provider, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored unit is unknown.
    pub async fn list_for_provider(
        &self,
        provider: OrganizationId,
    ) -> Result<Vec<Plan>, RepositoryError> {
        let rows: Vec<PlanRow> = sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM saas.plan WHERE organization_id = $1 ORDER BY id"
        ))
        .bind(provider)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Plan::try_from).collect()
    }

    /// Get a provider's plan by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        provider: OrganizationId,
        slug: &Slug,
    ) -> Result<Option<Plan>, RepositoryError> {
        let row: Option<PlanRow> = sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM saas.plan WHERE organization_id = $1 AND slug = $2"
        ))
        .bind(provider)
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Plan::try_from).transpose()
    }

    /// Existing slugs equal to `base` or of the form `base-...`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn slugs_like(&self, base: &str) -> Result<BTreeSet<String>, RepositoryError> {
        let slugs: Vec<String> = sqlx::query_scalar(
            r"
            SELECT slug FROM saas.plan
            WHERE slug = $1 OR starts_with(slug, $1 || '-')
            ",
        )
        .bind(base)
        .fetch_all(self.pool)
        .await?;

        Ok(slugs.into_iter().collect())
    }

    /// Returns `true` if any subscription, past or present, references the plan.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_subscriptions(&self, plan: PlanId) -> Result<bool, RepositoryError> {
        let exists =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM saas.subscription WHERE plan_id = $1)")
                .bind(plan)
                .fetch_one(self.pool)
                .await?;

        Ok(exists)
    }

    /// Insert a plan. `plan.id` and `plan.created_at` are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, plan: &Plan) -> Result<Plan, RepositoryError> {
        let row: PlanRow = sqlx::query_as(&format!(
            r"
            INSERT INTO saas.plan
                (slug, title, description, organization_id, is_active, period_amount, unit, interval)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PLAN_COLUMNS}
            "
        ))
        .bind(plan.slug.as_str())
        .bind(&plan.title)
        .bind(&plan.description)
        .bind(plan.organization_id)
        .bind(plan.is_active)
        .bind(plan.period_amount)
        .bind(plan.unit.as_str())
        .bind(plan.interval)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "plan"))?;

        Plan::try_from(row)
    }

    /// Write every mutable field of `plan`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the plan no longer exists.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(&self, plan: &Plan) -> Result<Plan, RepositoryError> {
        let row: Option<PlanRow> = sqlx::query_as(&format!(
            r"
            UPDATE saas.plan
            SET slug = $2, title = $3, description = $4, is_active = $5,
                period_amount = $6, unit = $7, interval = $8
            WHERE id = $1
            RETURNING {PLAN_COLUMNS}
            "
        ))
        .bind(plan.id)
        .bind(plan.slug.as_str())
        .bind(&plan.title)
        .bind(&plan.description)
        .bind(plan.is_active)
        .bind(plan.period_amount)
        .bind(plan.unit.as_str())
        .bind(plan.interval)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "plan"))?;

        row.ok_or(RepositoryError::NotFound).and_then(Plan::try_from)
    }

    /// Set whether the plan accepts new subscribers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the plan does not exist.
    pub async fn set_active(&self, plan: PlanId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE saas.plan SET is_active = $2 WHERE id = $1")
            .bind(plan)
            .bind(is_active)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a plan.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the plan does not exist.
    pub async fn delete(&self, plan: PlanId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM saas.plan WHERE id = $1")
            .bind(plan)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
