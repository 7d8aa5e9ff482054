//! Read-only queries backing provider reports.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ledgerline_core::OrganizationId;

use super::RepositoryError;
use crate::models::metrics::{RegisteredUser, SubscriptionRecord, TransactionRecord};
use crate::services::metrics::ReportRange;

const SELECT_SUBSCRIPTION: &str = r"
    SELECT s.organization_id, o.slug AS organization_slug,
           CASE WHEN o.full_name = '' THEN o.slug ELSE o.full_name END AS organization_name,
           p.slug AS plan_slug, s.created_at, s.ends_at
    FROM saas.subscription s
    JOIN saas.plan p ON p.id = s.plan_id
    JOIN saas.organization o ON o.id = s.organization_id
";

/// Which subscriptions a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Ended within the range.
    Churned,
    /// Started within the range.
    Subscribed,
    /// In force at the end of the range.
    Active,
}

/// Repository for reporting queries.
pub struct MetricsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MetricsRepository<'a> {
    /// Create a new metrics repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Subscriptions to the provider's plans overlapping `range`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn subscriptions_overlapping(
        &self,
        provider: OrganizationId,
        range: &ReportRange,
    ) -> Result<Vec<SubscriptionRecord>, RepositoryError> {
        let records = sqlx::query_as(&format!(
            r"{SELECT_SUBSCRIPTION}
            WHERE p.organization_id = $1 AND s.created_at < $3 AND s.ends_at > $2
            ORDER BY s.created_at"
        ))
        .bind(provider)
        .bind(range.start_at)
        .bind(range.ends_at)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Subscriptions to the provider's plans selected by `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn subscriptions(
        &self,
        provider: OrganizationId,
        range: &ReportRange,
        filter: SubscriptionFilter,
    ) -> Result<Vec<SubscriptionRecord>, RepositoryError> {
        let condition = match filter {
            SubscriptionFilter::Churned => {
                "s.ends_at >= $2 AND s.ends_at < $3 ORDER BY s.ends_at DESC"
            }
            SubscriptionFilter::Subscribed => {
                "s.created_at >= $2 AND s.created_at < $3 ORDER BY s.created_at DESC"
            }
            SubscriptionFilter::Active => {
                "s.created_at <= $2 AND s.ends_at > $2 ORDER BY s.created_at DESC"
            }
        };
        let sql = format!("{SELECT_SUBSCRIPTION} WHERE p.organization_id = $1 AND {condition}");

        let query = sqlx::query_as::<_, SubscriptionRecord>(&sql).bind(provider);
        let query = match filter {
            SubscriptionFilter::Active => query.bind(range.ends_at),
            SubscriptionFilter::Churned | SubscriptionFilter::Subscribed => {
                query.bind(range.start_at).bind(range.ends_at)
            }
        };

        Ok(query.fetch_all(self.pool).await?)
    }

    /// Charges and refunds received by the provider before `until`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transactions(
        &self,
        provider: OrganizationId,
        until: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let records = sqlx::query_as(
            r"
            SELECT created_at, amount, kind
            FROM saas.transaction
            WHERE provider_id = $1 AND created_at < $2
            ORDER BY created_at
            ",
        )
        .bind(provider)
        .bind(until)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Users registered within `range` who hold no role on any organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn registered(&self, range: &ReportRange) -> Result<Vec<RegisteredUser>, RepositoryError> {
        let users = sqlx::query_as(
            r"
            SELECT u.username, u.email, u.first_name, u.last_name, u.created_at
            FROM saas.user u
            WHERE u.created_at >= $1 AND u.created_at < $2
              AND NOT EXISTS (SELECT 1 FROM saas.role r WHERE r.user_id = u.id)
            ORDER BY u.created_at DESC
            ",
        )
        .bind(range.start_at)
        .bind(range.ends_at)
        .fetch_all(self.pool)
        .await?;

        Ok(users)
    }
}
