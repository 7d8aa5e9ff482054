//! Organization repository.

use sqlx::PgPool;
use tracing::instrument;

use ledgerline_core::{OrganizationId, RoleKind, Slug, UserId};

use super::RepositoryError;
use crate::models::Organization;
use crate::models::organization::NewOrganization;
use crate::services::redirect::OrganizationStore;

const SELECT_ORGANIZATION: &str = r"
    SELECT o.id, o.slug, o.full_name, o.email, o.is_provider, o.created_at
    FROM saas.organization o
";

/// Repository for organization and role database operations.
pub struct OrganizationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrganizationRepository<'a> {
    /// Create a new organization repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Returns `true` if `user` holds a role of `kind` on `organization`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_role(
        &self,
        user: UserId,
        organization: OrganizationId,
        kind: RoleKind,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1 FROM saas.role
                WHERE user_id = $1 AND organization_id = $2 AND kind = $3
            )
            ",
        )
        .bind(user)
        .bind(organization)
        .bind(kind)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Create an organization, optionally making `manager` its manager.
    ///
    /// Both writes happen in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, new), fields(slug = %new.slug))]
    pub async fn create(
        &self,
        new: &NewOrganization,
        manager: Option<UserId>,
    ) -> Result<Organization, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let organization: Organization = sqlx::query_as(
            r"
            INSERT INTO saas.organization (slug, full_name, email, is_provider)
            VALUES ($1, $2, $3, $4)
            RETURNING id, slug, full_name, email, is_provider, created_at
            ",
        )
        .bind(new.slug.as_str())
        .bind(&new.full_name)
        .bind(new.email.as_str())
        .bind(new.is_provider)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "organization"))?;

        if let Some(user) = manager {
            sqlx::query(
                r"
                INSERT INTO saas.role (organization_id, user_id, kind)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(organization.id)
            .bind(user)
            .bind(RoleKind::Manager)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(organization_id = %organization.id, "Organization created");
        Ok(organization)
    }

    /// Grant `user` a role on `organization`. Granting an existing role is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn grant(
        &self,
        user: UserId,
        organization: OrganizationId,
        kind: RoleKind,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO saas.role (organization_id, user_id, kind)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, user_id, kind) DO NOTHING
            ",
        )
        .bind(organization)
        .bind(user)
        .bind(kind)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

impl OrganizationStore for OrganizationRepository<'_> {
    async fn accessible_by(&self, user: UserId) -> Result<Vec<Organization>, RepositoryError> {
        let organizations = sqlx::query_as(&format!(
            r"{SELECT_ORGANIZATION}
            WHERE EXISTS (
                SELECT 1 FROM saas.role r
                WHERE r.organization_id = o.id AND r.user_id = $1
            )
            ORDER BY o.slug"
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        Ok(organizations)
    }

    async fn has_direct_role(
        &self,
        user: UserId,
        organization: OrganizationId,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1 FROM saas.role WHERE user_id = $1 AND organization_id = $2
            )
            ",
        )
        .bind(user)
        .bind(organization)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_by_slug(&self, slug: &Slug) -> Result<Option<Organization>, RepositoryError> {
        let organization = sqlx::query_as(&format!("{SELECT_ORGANIZATION} WHERE o.slug = $1"))
            .bind(slug.as_str())
            .fetch_optional(self.pool)
            .await?;

        Ok(organization)
    }
}
