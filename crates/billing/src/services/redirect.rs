//! Context redirection.
//!
//! Most pages live under an organization slug (`/billing/acme/cart/`).
//! Entry points without one (`/billing/cart/`) pick the organization from
//! the signed-in user's accessible organizations:
//!
//! - none: offer to create one (when enabled) or show an empty chooser,
//! - exactly one: redirect straight to it,
//! - several: show a chooser listing each candidate URL.
//!
//! The resolvers here return a [`RedirectOutcome`]; turning it into a
//! response is left to the route layer.

use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use tracing::instrument;

use ledgerline_core::{OrganizationId, Slug, UserId};

use crate::db::RepositoryError;
use crate::models::{CurrentUser, Organization};
use crate::services::next_url::{REDIRECT_FIELD_NAME, substitute};

/// Path of the organization creation form.
pub const ORGANIZATION_CREATE_PATH: &str = "/organizations/create/";

/// Placeholder name for the organization slug.
pub const ORGANIZATION_PARAM: &str = "organization";

/// Placeholder name for the username.
pub const USER_PARAM: &str = "user";

// =============================================================================
// Store
// =============================================================================

/// Organization lookups the redirectors rely on.
pub trait OrganizationStore: Send + Sync {
    /// Organizations `user` holds any role on, ordered by slug.
    fn accessible_by(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<Organization>, RepositoryError>> + Send;

    /// Returns `true` if `user` holds a role directly on `organization`.
    fn has_direct_role(
        &self,
        user: UserId,
        organization: OrganizationId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Find an organization by slug.
    fn find_by_slug(
        &self,
        slug: &Slug,
    ) -> impl Future<Output = Result<Option<Organization>, RepositoryError>> + Send;
}

// =============================================================================
// Targets and outcomes
// =============================================================================

/// A path pattern with `:name/` placeholders, e.g. `/billing/:organization/cart/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget(String);

impl RedirectTarget {
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// The raw pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.0
    }

    /// Substitute `params` into the pattern and append the request query string.
    #[must_use]
    pub fn resolve(&self, params: &[(&str, &str)], query: Option<&str>) -> String {
        let mut url = substitute(&self.0, params);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// One entry of the organization chooser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectChoice {
    pub url: String,
    pub printable_name: String,
    pub slug: String,
}

/// A URL or a namespace of named URLs exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UrlEntry {
    Link(String),
    Namespace(BTreeMap<String, String>),
}

/// Named URLs exposed to templates, grouped by namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContextUrls(BTreeMap<String, UrlEntry>);

impl ContextUrls {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level link.
    #[must_use]
    pub fn with_link(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.0.insert(name.into(), UrlEntry::Link(url.into()));
        self
    }

    /// Add a URL to a namespace, creating the namespace if needed.
    #[must_use]
    pub fn with_namespaced(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        let mut urls = BTreeMap::new();
        urls.insert(name.into(), url.into());
        self.merge(Self(BTreeMap::from([(
            namespace.into(),
            UrlEntry::Namespace(urls),
        )])));
        self
    }

    /// Merge `other` into `self`.
    ///
    /// A namespace present on both sides is extended with `other`'s entries;
    /// any other key is inserted or replaced.
    pub fn merge(&mut self, other: Self) {
        for (key, value) in other.0 {
            let value = match (self.0.get_mut(&key), value) {
                (Some(UrlEntry::Namespace(current)), UrlEntry::Namespace(added)) => {
                    current.extend(added);
                    continue;
                }
                (_, value) => value,
            };
            self.0.insert(key, value);
        }
    }

    /// Look up a top-level link.
    #[must_use]
    pub fn link(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            UrlEntry::Link(url) => Some(url),
            UrlEntry::Namespace(_) => None,
        }
    }

    /// Look up a URL inside a namespace.
    #[must_use]
    pub fn namespaced(&self, namespace: &str, name: &str) -> Option<&str> {
        match self.0.get(namespace)? {
            UrlEntry::Namespace(urls) => urls.get(name).map(String::as_str),
            UrlEntry::Link(_) => None,
        }
    }
}

/// Data for the organization chooser page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disambiguation {
    pub redirects: Vec<RedirectChoice>,
    pub urls: ContextUrls,
}

/// Where a redirect view should send the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Redirect to a single resolved URL.
    Single(String),
    /// Redirect to the organization creation form.
    CreatePrompt(String),
    /// Let the user pick among candidates.
    Choose(Disambiguation),
}

impl RedirectOutcome {
    /// The redirect location, unless the user has to choose.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Single(url) | Self::CreatePrompt(url) => Some(url),
            Self::Choose(_) => None,
        }
    }
}

// =============================================================================
// Resolvers
// =============================================================================

/// Redirects into the context of one of the user's organizations.
#[derive(Debug, Clone)]
pub struct OrganizationRedirect {
    pub target: RedirectTarget,
    /// Send users without organizations to the creation form.
    pub create_on_none: bool,
    /// Always show the chooser, even for a single organization.
    pub create_more: bool,
}

impl OrganizationRedirect {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: RedirectTarget::new(target),
            create_on_none: false,
            create_more: false,
        }
    }

    #[must_use]
    pub const fn create_on_none(mut self, enabled: bool) -> Self {
        self.create_on_none = enabled;
        self
    }

    #[must_use]
    pub const fn create_more(mut self, enabled: bool) -> Self {
        self.create_more = enabled;
        self
    }

    /// URL of the creation form, returning to the target afterwards.
    #[must_use]
    pub fn create_url(&self) -> String {
        if self.target.pattern().is_empty() {
            ORGANIZATION_CREATE_PATH.to_owned()
        } else {
            format!(
                "{ORGANIZATION_CREATE_PATH}?{REDIRECT_FIELD_NAME}={}",
                urlencoding::encode(self.target.pattern())
            )
        }
    }

    /// URL of the target for `organization`.
    #[must_use]
    pub fn url_for(&self, organization: &Organization, query: Option<&str>) -> String {
        self.target
            .resolve(&[(ORGANIZATION_PARAM, organization.slug.as_str())], query)
    }

    /// Decide where to go given the accessible organizations.
    #[must_use]
    pub fn resolve(&self, accessible: &[Organization], query: Option<&str>) -> RedirectOutcome {
        match accessible {
            [] if self.create_on_none => RedirectOutcome::CreatePrompt(self.create_url()),
            [organization] if !self.create_more => {
                RedirectOutcome::Single(self.url_for(organization, query))
            }
            _ => RedirectOutcome::Choose(Disambiguation {
                redirects: accessible
                    .iter()
                    .map(|organization| RedirectChoice {
                        url: self.url_for(organization, query),
                        printable_name: organization.printable_name().to_owned(),
                        slug: organization.slug.to_string(),
                    })
                    .collect(),
                urls: ContextUrls::new().with_link("organization_create", self.create_url()),
            }),
        }
    }

    /// Look up the user's organizations and decide where to go.
    ///
    /// # Errors
    ///
    /// Returns an error if the organization lookup fails.
    #[instrument(skip(self, store), fields(target = %self.target.pattern()))]
    pub async fn resolve_for<S: OrganizationStore>(
        &self,
        store: &S,
        user: UserId,
        query: Option<&str>,
    ) -> Result<RedirectOutcome, RepositoryError> {
        let accessible = store.accessible_by(user).await?;
        tracing::debug!(count = accessible.len(), "Resolved accessible organizations");
        Ok(self.resolve(&accessible, query))
    }
}

/// Sends the broker's own staff straight to the broker's context.
///
/// Everyone else goes through the regular organization chooser.
#[derive(Debug, Clone)]
pub struct ProviderRedirect {
    pub organizations: OrganizationRedirect,
}

impl ProviderRedirect {
    #[must_use]
    pub const fn new(organizations: OrganizationRedirect) -> Self {
        Self { organizations }
    }

    /// The broker URL when `user` has a direct role on `broker`.
    ///
    /// `None` means the caller should fall back to
    /// [`OrganizationRedirect::resolve_for`].
    ///
    /// # Errors
    ///
    /// Returns an error if the role lookup fails.
    pub async fn bypass<S: OrganizationStore>(
        &self,
        store: &S,
        user: UserId,
        broker: &Organization,
        query: Option<&str>,
    ) -> Result<Option<String>, RepositoryError> {
        if store.has_direct_role(user, broker.id).await? {
            return Ok(Some(self.organizations.url_for(broker, query)));
        }
        Ok(None)
    }
}

/// Redirects into the signed-in user's own pages.
#[derive(Debug, Clone)]
pub struct UserRedirect {
    pub target: RedirectTarget,
}

impl UserRedirect {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: RedirectTarget::new(target),
        }
    }

    #[must_use]
    pub fn resolve(&self, user: &CurrentUser, query: Option<&str>) -> String {
        self.target
            .resolve(&[(USER_PARAM, user.username.as_str())], query)
    }
}
