//! Provider reporting API.
//!
//! Every endpoint is read-only. Access requires a direct role on the
//! organization, or managing the broker.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use tracing::instrument;

use ledgerline_core::{DEFAULT_UNIT, Slug};

use crate::db::metrics::SubscriptionFilter;
use crate::db::{MetricsRepository, OrganizationRepository, PlanRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::metrics::{Listing, MetricsTable, RegisteredUser, SubscriptionRecord};
use crate::models::{CurrentUser, Organization};
use crate::routes::redirects::is_broker_manager;
use crate::services::metrics::{
    RangeQuery, ReportRange, balance_table, customer_table, plan_table, revenue_table,
};
use crate::services::redirect::OrganizationStore;
use crate::state::AppState;

/// Resolve `slug` and check `user` may read its reports.
///
/// # Errors
///
/// Returns `NotFound` for an unknown organization and `Forbidden` when the
/// user has no access.
pub async fn authorize_organization(
    state: &AppState,
    user: &CurrentUser,
    slug: &Slug,
) -> Result<Organization> {
    let repo = OrganizationRepository::new(state.pool());
    let organization = repo
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("organization {slug}")))?;

    if repo.has_direct_role(user.id, organization.id).await?
        || is_broker_manager(state, user).await?
    {
        return Ok(organization);
    }

    tracing::warn!(organization = %slug, user_id = %user.id, "Report access denied");
    Err(AppError::Forbidden(format!("no access to organization {slug}")))
}

fn report_range(query: RangeQuery) -> Result<ReportRange> {
    Ok(ReportRange::from_query(query, Utc::now())?)
}

/// Unit reports are expressed in: the provider's first plan's.
async fn provider_unit(state: &AppState, organization: &Organization) -> Result<String> {
    let plans = PlanRepository::new(state.pool())
        .list_for_provider(organization.id)
        .await?;
    Ok(plans
        .first()
        .map_or(DEFAULT_UNIT, |plan| plan.unit)
        .as_str()
        .to_owned())
}

/// `GET /api/metrics/{organization}/balances`
#[instrument(skip(state, user))]
pub async fn balances(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(organization): Path<Slug>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<MetricsTable>> {
    let provider = authorize_organization(&state, &user, &organization).await?;
    let range = report_range(query)?;
    let transactions = MetricsRepository::new(state.pool())
        .transactions(provider.id, range.ends_at)
        .await?;
    let unit = provider_unit(&state, &provider).await?;
    Ok(Json(balance_table(&range, &unit, &transactions)))
}

/// `GET /api/metrics/{organization}/plans`
#[instrument(skip(state, user))]
pub async fn plans(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(organization): Path<Slug>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<MetricsTable>> {
    let provider = authorize_organization(&state, &user, &organization).await?;
    let range = report_range(query)?;
    let plans = PlanRepository::new(state.pool())
        .list_for_provider(provider.id)
        .await?;
    let subscriptions = MetricsRepository::new(state.pool())
        .subscriptions_overlapping(provider.id, &range)
        .await?;
    Ok(Json(plan_table(&range, &plans, &subscriptions)))
}

/// `GET /api/metrics/{organization}/customers`
#[instrument(skip(state, user))]
pub async fn customers(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(organization): Path<Slug>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<MetricsTable>> {
    let provider = authorize_organization(&state, &user, &organization).await?;
    let range = report_range(query)?;
    let subscriptions = MetricsRepository::new(state.pool())
        .subscriptions_overlapping(provider.id, &range)
        .await?;
    Ok(Json(customer_table(&range, &subscriptions)))
}

/// `GET /api/metrics/{organization}/revenue`
#[instrument(skip(state, user))]
pub async fn revenue(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(organization): Path<Slug>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<MetricsTable>> {
    let provider = authorize_organization(&state, &user, &organization).await?;
    let range = report_range(query)?;
    let transactions = MetricsRepository::new(state.pool())
        .transactions(provider.id, range.ends_at)
        .await?;
    let unit = provider_unit(&state, &provider).await?;
    Ok(Json(revenue_table(&range, &unit, &transactions)))
}

/// `GET /api/metrics/registered` - broker managers only.
#[instrument(skip(state, user))]
pub async fn registered(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Listing<RegisteredUser>>> {
    if !is_broker_manager(&state, &user).await? {
        return Err(AppError::Forbidden("broker managers only".to_owned()));
    }
    let range = report_range(query)?;
    let users = MetricsRepository::new(state.pool()).registered(&range).await?;
    Ok(Json(users.into()))
}

async fn subscriptions(
    state: &AppState,
    user: &CurrentUser,
    organization: &Slug,
    query: RangeQuery,
    filter: SubscriptionFilter,
) -> Result<Json<Listing<SubscriptionRecord>>> {
    let provider = authorize_organization(state, user, organization).await?;
    let range = report_range(query)?;
    let records = MetricsRepository::new(state.pool())
        .subscriptions(provider.id, &range, filter)
        .await?;
    Ok(Json(records.into()))
}

/// `GET /api/subscriptions/{organization}/churned`
#[instrument(skip(state, user))]
pub async fn churned(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(organization): Path<Slug>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Listing<SubscriptionRecord>>> {
    subscriptions(&state, &user, &organization, query, SubscriptionFilter::Churned).await
}

/// `GET /api/subscriptions/{organization}/subscribed`
#[instrument(skip(state, user))]
pub async fn subscribed(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(organization): Path<Slug>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Listing<SubscriptionRecord>>> {
    subscriptions(&state, &user, &organization, query, SubscriptionFilter::Subscribed).await
}

/// `GET /api/subscriptions/{organization}/active`
#[instrument(skip(state, user))]
pub async fn active(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(organization): Path<Slug>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Listing<SubscriptionRecord>>> {
    subscriptions(&state, &user, &organization, query, SubscriptionFilter::Active).await
}
