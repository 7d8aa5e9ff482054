//! Context redirect handlers.
//!
//! Each handler first moves the visitor's session cart into the database,
//! then sends them into the right organization (or user) context.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use ledgerline_core::{RoleKind, UserId};

use crate::db::{CartItemRepository, OrganizationRepository, RepositoryError};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::cart::{PendingCart, ReconcileSummary, reconcile};
use crate::services::redirect::{
    ContextUrls, OrganizationRedirect, ProviderRedirect, RedirectChoice, RedirectOutcome,
    UserRedirect,
};
use crate::state::AppState;

/// Query parameters understood by every redirect endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    /// Claim code for cart items prepared by someone else.
    pub code: Option<String>,
}

/// Organization chooser page.
#[derive(Template, WebTemplate)]
#[template(path = "organization_redirects.html")]
pub struct OrganizationRedirectsTemplate {
    pub redirects: Vec<RedirectChoice>,
    pub urls: ContextUrls,
}

// =============================================================================
// Targets
// =============================================================================

fn app_target() -> OrganizationRedirect {
    OrganizationRedirect::new("/app/:organization/").create_on_none(true)
}

fn cart_target() -> OrganizationRedirect {
    OrganizationRedirect::new("/billing/:organization/cart/").create_on_none(true)
}

fn profile_target() -> OrganizationRedirect {
    OrganizationRedirect::new("/profile/:organization/")
}

fn metrics_target() -> ProviderRedirect {
    ProviderRedirect::new(OrganizationRedirect::new("/metrics/:organization/dashboard/"))
}

fn user_target() -> UserRedirect {
    UserRedirect::new("/users/:user/")
}

// =============================================================================
// Shared steps
// =============================================================================

/// Move the session cart into the database for `user`.
///
/// Whatever was persisted is removed from the session even when a later step
/// fails.
///
/// # Errors
///
/// Returns the reconciliation error, or a session error.
pub async fn reconcile_session_cart(
    state: &AppState,
    session: &Session,
    user: UserId,
    claim_code: Option<&str>,
) -> Result<ReconcileSummary> {
    let mut pending = PendingCart::load(session).await?;
    let store = CartItemRepository::new(state.pool());
    let result = reconcile(&store, user, claim_code, &mut pending).await;
    pending.save(session).await?;
    if let Ok(summary) = &result {
        let created = summary.merged.created.to_string();
        let redeemed = summary.redeemed.to_string();
        add_breadcrumb(
            "cart",
            "Session cart reconciled",
            Some(&[("created", &created), ("redeemed", &redeemed)]),
        );
    }
    Ok(result?)
}

/// Returns `true` if `user` manages the broker organization.
///
/// A broker missing from the database counts as "no".
///
/// # Errors
///
/// Returns an error if a lookup fails.
pub async fn is_broker_manager(state: &AppState, user: &CurrentUser) -> Result<bool> {
    let broker = match state.broker().await {
        Ok(broker) => broker,
        Err(RepositoryError::NotFound) => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    Ok(OrganizationRepository::new(state.pool())
        .has_role(user.id, broker.id, RoleKind::Manager)
        .await?)
}

fn render(outcome: RedirectOutcome, user: &CurrentUser) -> Response {
    match outcome {
        RedirectOutcome::Single(url) | RedirectOutcome::CreatePrompt(url) => {
            Redirect::to(&url).into_response()
        }
        RedirectOutcome::Choose(choices) => {
            let mut urls = ContextUrls::new().with_namespaced(
                "user",
                "profile",
                user_target().resolve(user, None),
            );
            urls.merge(choices.urls);
            OrganizationRedirectsTemplate {
                redirects: choices.redirects,
                urls,
            }
            .into_response()
        }
    }
}

async fn organization_flow(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    params: &RedirectQuery,
    query: Option<&str>,
    target: &OrganizationRedirect,
) -> Result<Response> {
    reconcile_session_cart(state, session, user.id, params.code.as_deref()).await?;
    let outcome = target
        .resolve_for(&OrganizationRepository::new(state.pool()), user.id, query)
        .await?;
    Ok(render(outcome, user))
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /app/` - into the user's organization dashboard.
#[instrument(skip(state, session, user))]
pub async fn app(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(params): Query<RedirectQuery>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    organization_flow(&state, &session, &user, &params, query.as_deref(), &app_target()).await
}

/// `GET /billing/cart/` - into the organization's cart.
#[instrument(skip(state, session, user))]
pub async fn cart(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(params): Query<RedirectQuery>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    organization_flow(&state, &session, &user, &params, query.as_deref(), &cart_target()).await
}

/// `GET /profile/` - into the organization's profile.
#[instrument(skip(state, session, user))]
pub async fn profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(params): Query<RedirectQuery>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    organization_flow(&state, &session, &user, &params, query.as_deref(), &profile_target()).await
}

/// `GET /metrics/` - broker staff go to the broker dashboard, providers to theirs.
#[instrument(skip(state, session, user))]
pub async fn metrics(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(params): Query<RedirectQuery>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let target = metrics_target();
    let broker = state.broker().await.map_err(|err| match err {
        RepositoryError::NotFound => {
            AppError::Internal("broker organization is missing".to_owned())
        }
        err => err.into(),
    })?;

    let store = OrganizationRepository::new(state.pool());
    if let Some(url) = target
        .bypass(&store, user.id, &broker, query.as_deref())
        .await?
    {
        return Ok(Redirect::to(&url).into_response());
    }

    organization_flow(&state, &session, &user, &params, query.as_deref(), &target.organizations).await
}

/// `GET /users/` - into the user's own profile.
#[instrument(skip(user))]
pub async fn user(RequireAuth(user): RequireAuth, RawQuery(query): RawQuery) -> Redirect {
    Redirect::to(&user_target().resolve(&user, query.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets() {
        assert!(app_target().create_on_none);
        assert!(cart_target().create_on_none);
        assert!(!profile_target().create_on_none);
        assert_eq!(
            metrics_target().organizations.target.pattern(),
            "/metrics/:organization/dashboard/"
        );
        assert_eq!(user_target().target.pattern(), "/users/:user/");
    }

    #[test]
    fn test_chooser_renders_choices() {
        let html = OrganizationRedirectsTemplate {
            redirects: vec![RedirectChoice {
                url: "/app/acme/".to_owned(),
                printable_name: "Acme Corp".to_owned(),
                slug: "acme".to_owned(),
            }],
            urls: ContextUrls::new()
                .with_link("organization_create", "/organizations/create/?next=%2Fapp%2F%3Aorganization%2F")
                .with_namespaced("user", "profile", "/users/alice/"),
        }
        .render()
        .unwrap_or_default();

        assert!(html.contains("href=\"/app/acme/\""));
        assert!(html.contains("Acme Corp"));
        assert!(html.contains("/organizations/create/?next=%2Fapp%2F%3Aorganization%2F"));
        assert!(html.contains("href=\"/users/alice/\""));
    }
}
