//! Plan management API for providers.
//!
//! Only managers of the provider (or of the broker) may change its plans.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::instrument;

use ledgerline_core::{PlanId, RoleKind, Slug, slugify};

use crate::db::{OrganizationRepository, PlanRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::plan::{ActivatePlan, CreatePlan, PlanResponse, UpdatePlan};
use crate::models::{CurrentUser, Organization, Plan};
use crate::routes::redirects::is_broker_manager;
use crate::services::plans::{
    PlanError, apply_update, default_unit, unique_slug, validate_amount,
};
use crate::services::redirect::OrganizationStore;
use crate::state::AppState;

/// Resolve `slug` and check `user` manages it.
async fn authorize_manager(
    state: &AppState,
    user: &CurrentUser,
    slug: &Slug,
) -> Result<Organization> {
    let repo = OrganizationRepository::new(state.pool());
    let provider = repo
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("organization {slug}")))?;

    if repo.has_role(user.id, provider.id, RoleKind::Manager).await?
        || is_broker_manager(state, user).await?
    {
        return Ok(provider);
    }
    Err(AppError::Forbidden(format!("not a manager of {slug}")))
}

async fn find_plan(state: &AppState, provider: &Organization, slug: &Slug) -> Result<Plan> {
    PlanRepository::new(state.pool())
        .get(provider.id, slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("plan {slug}")))
}

/// `POST /api/profile/{organization}/plans`
#[instrument(skip(state, user, body))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(organization): Path<Slug>,
    Json(body): Json<CreatePlan>,
) -> Result<(StatusCode, Json<PlanResponse>)> {
    let provider = authorize_manager(&state, &user, &organization).await?;
    validate_amount(Some(body.period_amount))?;

    let repo = PlanRepository::new(state.pool());
    let taken = repo.slugs_like(&slugify(&body.title)).await?;
    let slug = unique_slug(&body.title, &taken)?;
    let existing = repo.list_for_provider(provider.id).await?;

    let plan = repo
        .create(&Plan {
            id: PlanId::new(0),
            slug,
            title: body.title,
            description: body.description,
            organization_id: provider.id,
            is_active: body.is_active,
            period_amount: body.period_amount,
            unit: default_unit(body.unit, &existing),
            interval: body.interval,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(plan = %plan.slug, provider = %provider.slug, "Plan created");
    Ok((StatusCode::CREATED, Json(plan.into())))
}

/// `GET /api/profile/{organization}/plans/{plan}`
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((organization, plan)): Path<(Slug, Slug)>,
) -> Result<Json<PlanResponse>> {
    let provider = authorize_manager(&state, &user, &organization).await?;
    Ok(Json(find_plan(&state, &provider, &plan).await?.into()))
}

/// `PUT /api/profile/{organization}/plans/{plan}`
///
/// A new title re-derives the slug only while the plan has never had
/// subscribers, so URLs built from the old slug keep working.
#[instrument(skip(state, user, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((organization, plan)): Path<(Slug, Slug)>,
    Json(body): Json<UpdatePlan>,
) -> Result<Json<PlanResponse>> {
    let provider = authorize_manager(&state, &user, &organization).await?;
    let mut plan = find_plan(&state, &provider, &plan).await?;
    validate_amount(body.period_amount)?;

    let repo = PlanRepository::new(state.pool());
    let mut new_slug = None;
    if let Some(title) = body.title.as_deref()
        && slugify(title) != plan.slug.as_str()
        && !repo.has_subscriptions(plan.id).await?
    {
        let mut taken = repo.slugs_like(&slugify(title)).await?;
        taken.remove(plan.slug.as_str());
        new_slug = Some(unique_slug(title, &taken)?);
    }

    apply_update(&mut plan, body, new_slug);
    Ok(Json(repo.update(&plan).await?.into()))
}

/// `DELETE /api/profile/{organization}/plans/{plan}`
#[instrument(skip(state, user))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((organization, plan)): Path<(Slug, Slug)>,
) -> Result<StatusCode> {
    let provider = authorize_manager(&state, &user, &organization).await?;
    let plan = find_plan(&state, &provider, &plan).await?;

    let repo = PlanRepository::new(state.pool());
    if repo.has_subscriptions(plan.id).await? {
        return Err(PlanError::HasSubscribers.into());
    }
    repo.delete(plan.id).await?;

    tracing::info!(plan = %plan.slug, "Plan deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/profile/{organization}/plans/{plan}/activate`
#[instrument(skip(state, user))]
pub async fn activate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((organization, plan)): Path<(Slug, Slug)>,
    Json(body): Json<ActivatePlan>,
) -> Result<Json<PlanResponse>> {
    let provider = authorize_manager(&state, &user, &organization).await?;
    let mut plan = find_plan(&state, &provider, &plan).await?;

    PlanRepository::new(state.pool())
        .set_active(plan.id, body.is_active)
        .await?;
    plan.is_active = body.is_active;
    Ok(Json(plan.into()))
}
