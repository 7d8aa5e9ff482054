//! User repository for database operations.

use sqlx::PgPool;

use ledgerline_core::{Email, Slug};

use super::RepositoryError;
use crate::models::User;

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_username(&self, username: &Slug) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as(
            r"
            SELECT id, username, email, first_name, last_name, created_at
            FROM saas.user
            WHERE username = $1
            ",
        )
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username or email is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &Slug,
        email: &Email,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as(
            r"
            INSERT INTO saas.user (username, email, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, first_name, last_name, created_at
            ",
        )
        .bind(username.as_str())
        .bind(email.as_str())
        .bind(first_name)
        .bind(last_name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "user"))
    }
}
