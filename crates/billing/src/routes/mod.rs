//! HTTP route handlers for the billing service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Context redirects (reconcile the session cart first)
//! GET  /app/                   - Organization app home
//! GET  /billing/cart/          - Organization cart
//! GET  /profile/               - Organization profile
//! GET  /metrics/               - Provider dashboard (broker staff bypass)
//! GET  /users/                 - User profile
//!
//! # Organizations
//! GET  /organizations/create/  - Creation form
//! POST /organizations/create/  - Create organization
//!
//! # Reporting API (trailing slash optional on every API path)
//! GET  /api/metrics/{organization}/balances
//! GET  /api/metrics/{organization}/plans
//! GET  /api/metrics/{organization}/customers
//! GET  /api/metrics/{organization}/revenue
//! GET  /api/metrics/registered
//! GET  /api/subscriptions/{organization}/churned
//! GET  /api/subscriptions/{organization}/subscribed
//! GET  /api/subscriptions/{organization}/active
//!
//! # Plans API
//! POST   /api/profile/{organization}/plans
//! GET    /api/profile/{organization}/plans/{plan}
//! PUT    /api/profile/{organization}/plans/{plan}
//! DELETE /api/profile/{organization}/plans/{plan}
//! PUT    /api/profile/{organization}/plans/{plan}/activate
//! ```

pub mod metrics;
pub mod organizations;
pub mod plans;
pub mod redirects;

use axum::{
    Router,
    routing::{MethodRouter, get, post, put},
};

use crate::middleware::api_rate_limiter;
use crate::state::AppState;

/// Create the context redirect router.
pub fn redirect_routes() -> Router<AppState> {
    Router::new()
        .route("/app/", get(redirects::app))
        .route("/billing/cart/", get(redirects::cart))
        .route("/profile/", get(redirects::profile))
        .route("/metrics/", get(redirects::metrics))
        .route("/users/", get(redirects::user))
}

/// Create the organization routes router.
pub fn organization_routes() -> Router<AppState> {
    Router::new().route(
        "/create/",
        get(organizations::new).post(organizations::create),
    )
}

/// Route `path` both with and without a trailing slash.
fn route_either(
    router: Router<AppState>,
    path: &str,
    method_router: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(path, method_router.clone())
        .route(&format!("{path}/"), method_router)
}

/// Create the reporting API router.
pub fn metrics_api_routes() -> Router<AppState> {
    [
        ("/registered", get(metrics::registered)),
        ("/{organization}/balances", get(metrics::balances)),
        ("/{organization}/plans", get(metrics::plans)),
        ("/{organization}/customers", get(metrics::customers)),
        ("/{organization}/revenue", get(metrics::revenue)),
    ]
    .into_iter()
    .fold(Router::new(), |router, (path, handler)| route_either(router, path, handler))
}

/// Create the subscription listing API router.
pub fn subscription_api_routes() -> Router<AppState> {
    [
        ("/{organization}/churned", get(metrics::churned)),
        ("/{organization}/subscribed", get(metrics::subscribed)),
        ("/{organization}/active", get(metrics::active)),
    ]
    .into_iter()
    .fold(Router::new(), |router, (path, handler)| route_either(router, path, handler))
}

/// Create the plans API router.
pub fn plan_api_routes() -> Router<AppState> {
    [
        ("/{organization}/plans", post(plans::create)),
        (
            "/{organization}/plans/{plan}",
            get(plans::show).put(plans::update).delete(plans::destroy),
        ),
        ("/{organization}/plans/{plan}/activate", put(plans::activate)),
    ]
    .into_iter()
    .fold(Router::new(), |router, (path, handler)| route_either(router, path, handler))
}

/// Create the rate-limited JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/metrics", metrics_api_routes())
        .nest("/subscriptions", subscription_api_routes())
        .nest("/profile", plan_api_routes())
        .layer(api_rate_limiter())
}

/// Create all routes for the billing service.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(redirect_routes())
        .nest("/organizations", organization_routes())
        .nest("/api", api_routes())
}
