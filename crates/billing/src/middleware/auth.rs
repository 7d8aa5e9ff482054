//! Authentication extractor.
//!
//! Login itself is handled by the accounts service, which stores a
//! [`CurrentUser`] in the shared session. Billing routes only read it.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::set_sentry_user;
use crate::models::{CurrentUser, session_keys};
use crate::services::next_url::REDIRECT_FIELD_NAME;

/// Path of the login page.
pub const LOGIN_PATH: &str = "/accounts/login/";

/// Extractor that requires an authenticated user.
///
/// Page requests without one are redirected to the login page with a `next`
/// parameter pointing back; API requests get a 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication is required but the user is not logged in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin(String),
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(url) => Redirect::to(&url).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Login URL returning to `path_and_query` afterwards.
#[must_use]
pub fn login_url(path_and_query: &str) -> String {
    format!(
        "{LOGIN_PATH}?{REDIRECT_FIELD_NAME}={}",
        urlencoding::encode(path_and_query)
    )
}

/// Rejection for an unauthenticated request to `uri`.
fn rejection_for(uri: &Uri) -> AuthRejection {
    if uri.path().starts_with("/api/") {
        return AuthRejection::Unauthorized;
    }
    let back = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    AuthRejection::RedirectToLogin(login_url(back))
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        let user: CurrentUser = session
            .get(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| {
                // Nested routers strip their prefix from `parts.uri`
                let uri = parts
                    .extensions
                    .get::<OriginalUri>()
                    .map_or(&parts.uri, |original| &original.0);
                rejection_for(uri)
            })?;

        set_sentry_user(&user.id, Some(&user.email));

        Ok(Self(user))
    }
}
