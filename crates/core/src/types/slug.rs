//! URL-safe account identifiers.
//!
//! Organizations, plans and users are addressed in URLs by a slug. Slugs are
//! restricted to the account identifier alphabet: ASCII letters, digits and
//! `_`, `-`, `+`, `.`.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The input string is empty.
    #[error("slug cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside the account alphabet.
    #[error("slug contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A URL-safe identifier for an organization, plan or user.
///
/// ## Examples
///
/// ```
/// use ledgerline_core::Slug;
///
/// assert!(Slug::parse("acme").is_ok());
/// assert!(Slug::parse("acme-corp.eu").is_ok());
/// assert!(Slug::parse("acme corp").is_err());
/// assert!(Slug::parse("").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum length of a slug (matches the database column).
    pub const MAX_LENGTH: usize = 50;

    /// Returns `true` if `c` belongs to the account identifier alphabet.
    #[must_use]
    pub const fn is_slug_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '.')
    }

    /// Parse a `Slug` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than
    /// [`Slug::MAX_LENGTH`], or contains characters outside the alphabet.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = s.chars().find(|c| !Self::is_slug_char(*c)) {
            return Err(SlugError::InvalidCharacter(c));
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Slug {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive a slug from free text such as a plan title.
///
/// Lowercases ASCII letters, keeps digits, `_` and `-`, collapses every other
/// run of characters into a single `-` and trims dashes at both ends. The
/// result may be empty when the input has no usable characters.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(Slug::MAX_LENGTH);
    slug.trim_end_matches('-').to_owned()
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Slug {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Slug {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Slug {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_account_alphabet() {
        assert!(Slug::parse("acme").is_ok());
        assert!(Slug::parse("Acme_Corp-2+eu.west").is_ok());
    }

    #[test]
    fn test_parse_rejects_separators() {
        assert_eq!(
            Slug::parse("acme/corp"),
            Err(SlugError::InvalidCharacter('/'))
        );
        assert_eq!(Slug::parse("a b"), Err(SlugError::InvalidCharacter(' ')));
        assert_eq!(Slug::parse(":x"), Err(SlugError::InvalidCharacter(':')));
    }

    #[test]
    fn test_parse_empty_and_long() {
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert!(matches!(
            Slug::parse(&"a".repeat(51)),
            Err(SlugError::TooLong { max: 50 })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let slug: Slug = serde_json::from_str("\"acme\"").unwrap();
        assert_eq!(slug.as_str(), "acme");
        assert!(serde_json::from_str::<Slug>("\"no spaces\"").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Open Space"), "open-space");
        assert_eq!(slugify("  Premium -- Plan!  "), "premium-plan");
        assert_eq!(slugify("Desk #12"), "desk-12");
        assert_eq!(slugify("???"), "");
    }
}
