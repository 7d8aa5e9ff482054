//! Platform bootstrap commands.
//!
//! The billing service treats managers of the broker organization as
//! platform administrators, so a fresh install needs one user and the
//! broker organization before anything else works.
//!
//! # Environment Variables
//!
//! - `BILLING_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use ledgerline_billing::db::{self, OrganizationRepository, RepositoryError, UserRepository};
use ledgerline_billing::models::NewOrganization;
use ledgerline_core::{Email, EmailError, Slug, SlugError};
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur during bootstrap operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Invalid slug: {0}")]
    InvalidSlug(#[from] SlugError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The named manager does not exist.
    #[error("No user with username: {0}")]
    UnknownUser(String),
}

async fn connect() -> Result<PgPool, BrokerError> {
    let database_url =
        super::database_url().ok_or(BrokerError::MissingEnvVar("BILLING_DATABASE_URL"))?;
    tracing::info!("Connecting to billing database...");
    Ok(db::create_pool(&database_url).await?)
}

/// Create a user account.
pub async fn create_user(
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> Result<(), BrokerError> {
    let username = Slug::parse(username)?;
    let email = Email::parse(email)?;

    let pool = connect().await?;
    let user = UserRepository::new(&pool)
        .create(&username, &email, first_name, last_name)
        .await?;

    tracing::info!(user_id = %user.id, "Created user {}", user.username);
    Ok(())
}

/// Create the broker organization, optionally granting `manager` the manager role.
pub async fn create(
    slug: &str,
    name: &str,
    email: &str,
    manager: Option<&str>,
) -> Result<(), BrokerError> {
    let new = NewOrganization {
        slug: Slug::parse(slug)?,
        full_name: name.trim().to_owned(),
        email: Email::parse(email)?,
        is_provider: true,
    };

    let pool = connect().await?;

    let manager_id = match manager {
        Some(username) => {
            let user = UserRepository::new(&pool)
                .get_by_username(&Slug::parse(username)?)
                .await?
                .ok_or_else(|| BrokerError::UnknownUser(username.to_owned()))?;
            Some(user.id)
        }
        None => None,
    };

    let organization = OrganizationRepository::new(&pool)
        .create(&new, manager_id)
        .await?;

    tracing::info!(
        organization_id = %organization.id,
        "Created broker organization {}",
        organization.slug
    );
    if manager_id.is_none() {
        tracing::warn!("Broker has no manager; platform pages will be unreachable until one is granted");
    }
    Ok(())
}
