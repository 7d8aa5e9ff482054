//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::config::BillingConfig;
use crate::db::{OrganizationRepository, RepositoryError};
use crate::models::Organization;
use crate::services::redirect::OrganizationStore;

/// How long the broker organization is cached.
const BROKER_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BillingConfig,
    pool: PgPool,
    broker: Cache<(), Organization>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: BillingConfig, pool: PgPool) -> Self {
        let broker = Cache::builder()
            .max_capacity(1)
            .time_to_live(BROKER_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                broker,
            }),
        }
    }

    /// Get a reference to the billing configuration.
    #[must_use]
    pub fn config(&self) -> &BillingConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The organization operating the platform.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no organization has the
    /// configured broker slug, or a database error.
    pub async fn broker(&self) -> Result<Organization, RepositoryError> {
        if let Some(broker) = self.inner.broker.get(&()).await {
            return Ok(broker);
        }

        let broker = OrganizationRepository::new(self.pool())
            .find_by_slug(&self.config().broker_slug)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        self.inner.broker.insert((), broker.clone()).await;
        Ok(broker)
    }
}
