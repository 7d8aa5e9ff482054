//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! ll-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BILLING_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Billing migrations live in `crates/billing/migrations/`. They also create
//! the `tower_sessions.session` table the billing service reads sessions from.

use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run billing database migrations.
pub async fn run() -> Result<(), MigrationError> {
    let database_url =
        super::database_url().ok_or(MigrationError::MissingEnvVar("BILLING_DATABASE_URL"))?;

    tracing::info!("Connecting to billing database...");
    let pool = ledgerline_billing::db::create_pool(&database_url).await?;

    tracing::info!("Running billing migrations...");
    sqlx::migrate!("../billing/migrations").run(&pool).await?;

    tracing::info!("Billing migrations complete");
    Ok(())
}
