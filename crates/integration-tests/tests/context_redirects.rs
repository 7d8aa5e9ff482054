//! Integration tests for the context redirectors.
//!
//! Run with: cargo test -p ledgerline-integration-tests --test context_redirects

#![allow(clippy::unwrap_used)]

use ledgerline_billing::models::CurrentUser;
use ledgerline_billing::services::{
    OrganizationRedirect, ProviderRedirect, RedirectOutcome, UserRedirect,
};
use ledgerline_core::{Slug, UserId};
use ledgerline_integration_tests::MemoryBilling;

const ALICE: UserId = UserId::new(100);
const DASHBOARD: &str = "/orgs/:organization/dashboard/";

fn dashboard() -> OrganizationRedirect {
    OrganizationRedirect::new(DASHBOARD).create_on_none(true)
}

// ============================================================================
// Organization Redirect Tests
// ============================================================================

#[tokio::test]
async fn test_single_organization_redirects_directly() {
    let store = MemoryBilling::new();
    let acme = store.add_organization("acme", "Acme Corp", false);
    store.grant(ALICE, &acme);

    let outcome = dashboard().resolve_for(&store, ALICE, None).await.unwrap();

    assert_eq!(
        outcome,
        RedirectOutcome::Single("/orgs/acme/dashboard/".to_owned())
    );
}

#[tokio::test]
async fn test_no_organization_prompts_creation() {
    let store = MemoryBilling::new();
    store.add_organization("acme", "Acme Corp", false);

    let outcome = dashboard().resolve_for(&store, ALICE, None).await.unwrap();

    assert_eq!(
        outcome.location(),
        Some("/organizations/create/?next=%2Forgs%2F%3Aorganization%2Fdashboard%2F")
    );
    assert!(matches!(outcome, RedirectOutcome::CreatePrompt(_)));
}

#[tokio::test]
async fn test_no_organization_without_create_shows_empty_chooser() {
    let store = MemoryBilling::new();

    let outcome = OrganizationRedirect::new(DASHBOARD)
        .resolve_for(&store, ALICE, None)
        .await
        .unwrap();

    let RedirectOutcome::Choose(choices) = outcome else {
        panic!("expected chooser, got {outcome:?}");
    };
    assert!(choices.redirects.is_empty());
}

#[tokio::test]
async fn test_several_organizations_show_chooser_in_slug_order() {
    let store = MemoryBilling::new();
    let zeta = store.add_organization("zeta", "", false);
    let acme = store.add_organization("acme", "Acme Corp", false);
    store.grant(ALICE, &zeta);
    store.grant(ALICE, &acme);

    let outcome = dashboard()
        .resolve_for(&store, ALICE, Some("tab=usage"))
        .await
        .unwrap();

    let RedirectOutcome::Choose(choices) = outcome else {
        panic!("expected chooser, got {outcome:?}");
    };
    let urls: Vec<&str> = choices.redirects.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(
        urls,
        [
            "/orgs/acme/dashboard/?tab=usage",
            "/orgs/zeta/dashboard/?tab=usage"
        ]
    );
    // Organizations without a full name show their slug
    assert_eq!(choices.redirects[1].printable_name, "zeta");
    assert_eq!(
        choices.urls.link("organization_create"),
        Some("/organizations/create/?next=%2Forgs%2F%3Aorganization%2Fdashboard%2F")
    );
}

#[tokio::test]
async fn test_create_more_always_shows_chooser() {
    let store = MemoryBilling::new();
    let acme = store.add_organization("acme", "Acme Corp", false);
    store.grant(ALICE, &acme);

    let outcome = dashboard()
        .create_more(true)
        .resolve_for(&store, ALICE, None)
        .await
        .unwrap();

    assert!(outcome.location().is_none());
}

// ============================================================================
// Provider Redirect Tests
// ============================================================================

#[tokio::test]
async fn test_broker_staff_bypass_chooser() {
    let store = MemoryBilling::new();
    let broker = store.add_organization("broker", "Platform", true);
    let acme = store.add_organization("acme", "Acme Corp", false);
    store.grant(ALICE, &broker);
    store.grant(ALICE, &acme);

    let metrics = ProviderRedirect::new(OrganizationRedirect::new("/metrics/:organization/"));
    let url = metrics.bypass(&store, ALICE, &broker, None).await.unwrap();

    assert_eq!(url.as_deref(), Some("/metrics/broker/"));
}

#[tokio::test]
async fn test_non_broker_staff_fall_back_to_chooser() {
    let store = MemoryBilling::new();
    let broker = store.add_organization("broker", "Platform", true);
    let acme = store.add_organization("acme", "Acme Corp", true);
    store.grant(ALICE, &acme);

    let metrics = ProviderRedirect::new(OrganizationRedirect::new("/metrics/:organization/"));
    assert_eq!(
        metrics.bypass(&store, ALICE, &broker, None).await.unwrap(),
        None
    );

    let outcome = metrics
        .organizations
        .resolve_for(&store, ALICE, None)
        .await
        .unwrap();
    assert_eq!(outcome.location(), Some("/metrics/acme/"));
}

// ============================================================================
// User Redirect Tests
// ============================================================================

#[test]
fn test_user_redirect_uses_username() {
    let user = CurrentUser {
        id: ALICE,
        username: Slug::parse("alice").unwrap(),
        email: "alice@acme.io".to_owned(),
    };

    let redirect = UserRedirect::new("/users/:user/");
    assert_eq!(redirect.resolve(&user, None), "/users/alice/");
    assert_eq!(redirect.resolve(&user, Some("a=1")), "/users/alice/?a=1");
}
