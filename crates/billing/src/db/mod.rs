//! Database operations for the billing `PostgreSQL` database.
//!
//! # Schema: `saas`
//!
//! ## Tables
//!
//! - `user` - Accounts known to billing (identity is owned by the login service)
//! - `organization` - Tenants, including the broker
//! - `role` - Manager/contributor links between users and organizations
//! - `plan` - Plans sold by provider organizations
//! - `coupon` - Discount codes scoped to a provider
//! - `cart_item` - Pending plan selections awaiting checkout
//! - `subscription` - Organization subscriptions to plans
//! - `transaction` - Charges and refunds, read by reports
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/billing/migrations/` and run via:
//! ```bash
//! cargo run -p ledgerline-cli -- migrate
//! ```

pub mod cart_items;
pub mod metrics;
pub mod organizations;
pub mod plans;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart_items::CartItemRepository;
pub use metrics::MetricsRepository;
pub use organizations::OrganizationRepository;
pub use plans::PlanRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to [`RepositoryError::Conflict`].
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
