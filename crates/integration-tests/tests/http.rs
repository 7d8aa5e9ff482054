//! Integration tests for router wiring.
//!
//! These drive the full application router without a database: the pool
//! connects lazily and none of the requests below reach it.
//!
//! Run with: cargo test -p ledgerline-integration-tests --test http

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use ledgerline_billing::app;
use ledgerline_billing::state::AppState;
use ledgerline_integration_tests::test_config;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

fn test_app() -> axum::Router {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .connect_lazy(config.database_url.expose_secret())
        .unwrap();
    app(AppState::new(config, pool))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = test_app().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_redirect_views_require_login() {
    let response = test_app().oneshot(get("/app/?code=gift-42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/accounts/login/?next=%2Fapp%2F%3Fcode%3Dgift-42"
    );
}

#[tokio::test]
async fn test_nested_form_login_returns_to_full_path() {
    let response = test_app()
        .oneshot(get("/organizations/create/?next=/app/:organization/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/accounts/login/?next=%2Forganizations%2Fcreate%2F%3Fnext%3D%2Fapp%2F%3Aorganization%2F"
    );
}

#[tokio::test]
async fn test_api_requires_login() {
    let response = test_app()
        .oneshot(get("/api/metrics/acme/plans"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_accepts_trailing_slash() {
    for uri in [
        "/api/metrics/acme/balances/",
        "/api/subscriptions/acme/active/",
        "/api/profile/acme/plans/basic/",
    ] {
        let response = test_app().oneshot(get(uri)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = test_app().oneshot(get("/nowhere/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
