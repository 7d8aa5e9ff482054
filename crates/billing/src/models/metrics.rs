//! Reporting types: raw records read for metrics and the tables built from them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ledgerline_core::{OrganizationId, Slug, TransactionKind};

/// A subscription of a customer to one of a provider's plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SubscriptionRecord {
    #[serde(skip)]
    pub organization_id: OrganizationId,
    #[serde(rename = "organization")]
    pub organization_slug: Slug,
    #[serde(rename = "printable_name")]
    pub organization_name: String,
    #[serde(rename = "plan")]
    pub plan_slug: Slug,
    pub created_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Returns `true` if the subscription is in force at `at`.
    #[must_use]
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.created_at <= at && at < self.ends_at
    }
}

/// A movement of money between a customer and a provider.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TransactionRecord {
    pub created_at: DateTime<Utc>,
    /// Positive amount in cents.
    pub amount: i64,
    pub kind: TransactionKind,
}

/// A user who registered but has no role on any organization.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RegisteredUser {
    pub username: Slug,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

/// One named series of a metrics table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSeries {
    pub key: String,
    /// `(period end, value)` pairs in ascending period order.
    pub values: Vec<(DateTime<Utc>, i64)>,
}

/// A metrics response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsTable {
    pub title: String,
    /// Divisor to apply to values for display (100 for cents).
    pub scale: u32,
    /// Unit of the values (`usd`, `number`, ...).
    pub unit: String,
    pub table: Vec<MetricsSeries>,
}

impl MetricsTable {
    /// Look up a series by key.
    #[must_use]
    pub fn series(&self, key: &str) -> Option<&MetricsSeries> {
        self.table.iter().find(|s| s.key == key)
    }
}

/// A list response with a total count.
#[derive(Debug, Clone, Serialize)]
pub struct Listing<T> {
    pub count: usize,
    pub results: Vec<T>,
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(results: Vec<T>) -> Self {
        Self {
            count: results.len(),
            results,
        }
    }
}
