//! Validation of `next` redirect targets.
//!
//! Forms and redirect views accept a `next` query parameter naming where to
//! go once they are done. Anything pointing at a host outside the allow-list
//! is dropped, and accepted values are reduced to a path so the response can
//! never send the browser to another site.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use crate::config::AllowedHosts;

/// Name of the query parameter carrying the redirect target.
pub const REDIRECT_FIELD_NAME: &str = "next";

/// Matches a `:name/` placeholder segment.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-zA-Z0-9_\-+.]+)/").expect("Invalid regex"));

// Base for resolving relative targets. Only its host is ever inspected.
const RESOLVE_BASE: &str = "http://next-url.invalid/";

/// Validate a candidate redirect target.
///
/// Returns `None` when the target is empty, unparseable, uses a scheme other
/// than http(s), or names a host `allowed` rejects. Otherwise returns the
/// target's path, query and fragment.
///
/// With `params`, `:name/` placeholders in the path are replaced by the
/// matching value; placeholders without a value are removed along with
/// their trailing slash.
#[must_use]
pub fn validate_redirect_url(
    next: &str,
    allowed: &AllowedHosts,
    params: Option<&[(&str, &str)]>,
) -> Option<String> {
    let next = next.trim();
    if next.is_empty() {
        return None;
    }

    let url = match Url::parse(next) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                tracing::debug!(next, "Rejected next URL with unsupported scheme");
                return None;
            }
            url
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(RESOLVE_BASE).ok()?;
            base.join(next).ok()?
        }
        Err(_) => return None,
    };

    // Protocol-relative targets (`//host/...`) resolve to a foreign host
    if let Some(host) = url.host_str()
        && !is_resolve_base(host)
        && !allowed.allows(host)
    {
        tracing::warn!(host, "Rejected next URL pointing at a disallowed host");
        return None;
    }

    let path = match params {
        Some(params) => substitute(url.path(), params),
        None => url.path().to_owned(),
    };

    let mut result = format!("/{}", path.trim_start_matches('/'));
    if let Some(query) = url.query() {
        result.push('?');
        result.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        result.push('#');
        result.push_str(fragment);
    }
    Some(result)
}

/// Replace `:name/` placeholders in `path` with values from `params`.
///
/// Unknown placeholders are dropped.
#[must_use]
pub fn substitute(path: &str, params: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(path, |caps: &Captures<'_>| {
            params
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(String::new, |(_, value)| format!("{value}/"))
        })
        .into_owned()
}

fn is_resolve_base(host: &str) -> bool {
    RESOLVE_BASE
        .strip_prefix("http://")
        .and_then(|rest| rest.strip_suffix('/'))
        .is_some_and(|base| base == host)
}
