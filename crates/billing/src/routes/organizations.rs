//! Organization creation handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::config::AllowedHosts;
use crate::db::OrganizationRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{FormErrors, OrganizationForm};
use crate::routes::redirects::is_broker_manager;
use crate::services::next_url::validate_redirect_url;
use crate::services::redirect::ORGANIZATION_PARAM;
use crate::state::AppState;

/// Query parameters of the creation form.
#[derive(Debug, Default, Deserialize)]
pub struct CreateQuery {
    pub next: Option<String>,
}

/// Organization creation page.
#[derive(Template, WebTemplate)]
#[template(path = "organizations/create.html")]
pub struct CreateOrganizationTemplate {
    pub form: OrganizationForm,
    pub errors: FormErrors,
    /// Validated redirect target, placeholders left in place.
    pub next: Option<String>,
}

impl CreateOrganizationTemplate {
    fn error(&self, field: &str) -> &str {
        self.errors.get(field).unwrap_or_default()
    }
}

/// `GET /organizations/create/`
#[instrument(skip(state, _user))]
pub async fn new(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(query): Query<CreateQuery>,
) -> CreateOrganizationTemplate {
    let next = query
        .next
        .as_deref()
        .and_then(|next| validate_redirect_url(next, &state.config().allowed_hosts, None));

    CreateOrganizationTemplate {
        form: OrganizationForm::default(),
        errors: FormErrors::default(),
        next,
    }
}

/// `POST /organizations/create/`
///
/// Creates the organization and makes the user its manager, unless they
/// already manage the broker (broker staff see every organization anyway).
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<OrganizationForm>,
) -> Result<Response> {
    let allowed = &state.config().allowed_hosts;

    let new = match form.validate() {
        Ok(new) => new,
        Err(errors) => {
            let next = form
                .next
                .as_deref()
                .and_then(|next| validate_redirect_url(next, allowed, None));
            return Ok(CreateOrganizationTemplate { form, errors, next }.into_response());
        }
    };

    let manager = if is_broker_manager(&state, &user).await? {
        None
    } else {
        Some(user.id)
    };

    let organization = OrganizationRepository::new(state.pool())
        .create(&new, manager)
        .await?;

    let location = success_url(form.next.as_deref(), allowed, organization.slug.as_str());
    Ok(Redirect::to(&location).into_response())
}

/// Where to go after creating organization `slug`.
///
/// A valid `next` wins, with its `:organization/` placeholder filled in;
/// otherwise the new organization's cart.
#[must_use]
pub fn success_url(next: Option<&str>, allowed: &AllowedHosts, slug: &str) -> String {
    next.and_then(|next| validate_redirect_url(next, allowed, Some(&[(ORGANIZATION_PARAM, slug)])))
        .unwrap_or_else(|| format!("/billing/{slug}/cart/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_keeps_next_and_errors() {
        let form = OrganizationForm {
            slug: "bad slug".to_owned(),
            ..OrganizationForm::default()
        };
        let errors = form.validate().err().unwrap_or_default();
        let html = CreateOrganizationTemplate {
            form,
            errors,
            next: Some("/app/:organization/".to_owned()),
        }
        .render()
        .unwrap_or_default();

        assert!(html.contains("name=\"next\" value=\"/app/:organization/\""));
        assert!(html.contains("bad slug"));
    }

    #[test]
    fn test_success_url() {
        let allowed = AllowedHosts::new(["billing.acme.io"]);
        assert_eq!(
            success_url(Some("/app/:organization/"), &allowed, "acme"),
            "/app/acme/"
        );
        assert_eq!(
            success_url(Some("https://evil.example/orgs/x/"), &allowed, "acme"),
            "/billing/acme/cart/"
        );
        assert_eq!(success_url(None, &allowed, "acme"), "/billing/acme/cart/");
    }
}
