//! Integration tests for redirect target validation.
//!
//! Run with: cargo test -p ledgerline-integration-tests --test next_url

use ledgerline_billing::config::AllowedHosts;
use ledgerline_billing::routes::organizations::success_url;
use ledgerline_billing::services::next_url::validate_redirect_url;

fn allowed() -> AllowedHosts {
    AllowedHosts::new(["billing.acme.io", ".acme.test"])
}

#[test]
fn test_foreign_host_falls_back_to_default_success_url() {
    let next = "https://evil.example/orgs/x/";

    assert_eq!(validate_redirect_url(next, &allowed(), None), None);
    assert_eq!(success_url(Some(next), &allowed(), "acme"), "/billing/acme/cart/");
}

#[test]
fn test_allowed_host_is_reduced_to_path() {
    assert_eq!(
        validate_redirect_url("https://billing.acme.io/orgs/x/?tab=1", &allowed(), None).as_deref(),
        Some("/orgs/x/?tab=1")
    );
    assert_eq!(
        validate_redirect_url("https://eu.acme.test/app/", &allowed(), None).as_deref(),
        Some("/app/")
    );
}

#[test]
fn test_placeholder_substitution_on_success() {
    assert_eq!(
        success_url(Some("/orgs/:organization/dashboard/"), &allowed(), "acme"),
        "/orgs/acme/dashboard/"
    );
    // Unknown placeholders are dropped
    assert_eq!(
        success_url(Some("/orgs/:organization/:plan/"), &allowed(), "acme"),
        "/orgs/acme/"
    );
}

#[test]
fn test_scheme_relative_and_script_targets_rejected() {
    for next in ["//evil.example/", "javascript:alert(1)", "ftp://billing.acme.io/"] {
        assert_eq!(validate_redirect_url(next, &allowed(), None), None, "{next}");
    }
}

#[test]
fn test_debug_mode_accepts_any_host() {
    assert_eq!(
        validate_redirect_url("http://localhost:8000/app/", &AllowedHosts::any(), None).as_deref(),
        Some("/app/")
    );
}
