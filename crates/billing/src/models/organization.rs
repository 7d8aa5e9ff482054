//! Organization (tenant) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerline_core::{Email, OrganizationId, Slug, slugify};

/// A billable entity users administer or belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Organization {
    pub id: OrganizationId,
    pub slug: Slug,
    pub full_name: String,
    pub email: String,
    /// Whether the organization sells plans.
    pub is_provider: bool,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Name shown to users, falling back to the slug when no full name is set.
    #[must_use]
    pub fn printable_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            self.slug.as_str()
        } else {
            &self.full_name
        }
    }
}

/// Validated input for creating an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrganization {
    pub slug: Slug,
    pub full_name: String,
    pub email: Email,
    pub is_provider: bool,
}

/// Organization creation form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationForm {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    /// Validated by the handler before use.
    #[serde(default)]
    pub next: Option<String>,
}

/// Field errors from validating an [`OrganizationForm`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors(Vec<(&'static str, String)>);

impl FormErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push((field, message.into()));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Message for `field`, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
    }
}

impl OrganizationForm {
    /// Validate the form. An empty slug is derived from the full name.
    ///
    /// # Errors
    ///
    /// Returns every field that failed validation.
    pub fn validate(&self) -> Result<NewOrganization, FormErrors> {
        let mut errors = FormErrors::default();

        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            errors.push("full_name", "Name is required");
        }

        let slug_source = if self.slug.trim().is_empty() {
            slugify(full_name)
        } else {
            self.slug.trim().to_owned()
        };
        let slug = Slug::parse(&slug_source)
            .map_err(|e| errors.push("slug", e.to_string()))
            .ok();

        let email = Email::parse(&self.email)
            .map_err(|e| errors.push("email", e.to_string()))
            .ok();

        match (slug, email) {
            (Some(slug), Some(email)) if errors.is_empty() => Ok(NewOrganization {
                slug,
                full_name: full_name.to_owned(),
                email,
                is_provider: false,
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_name_falls_back_to_slug() {
        let org = Organization {
            id: OrganizationId::new(1),
            slug: Slug::parse("acme").unwrap(),
            full_name: "  ".to_owned(),
            email: "billing@acme.test".to_owned(),
            is_provider: false,
            created_at: Utc::now(),
        };
        assert_eq!(org.printable_name(), "acme");
    }

    #[test]
    fn test_form_derives_slug_from_name() {
        let form = OrganizationForm {
            full_name: "Acme Corp".to_owned(),
            email: "Billing@Acme.test".to_owned(),
            ..OrganizationForm::default()
        };
        let new = form.validate().unwrap();
        assert_eq!(new.slug.as_str(), "acme-corp");
        assert_eq!(new.email.as_str(), "Billing@acme.test");
    }

    #[test]
    fn test_form_reports_every_field() {
        let form = OrganizationForm {
            slug: "bad slug".to_owned(),
            email: "nope".to_owned(),
            ..OrganizationForm::default()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.get("full_name").is_some());
        assert!(errors.get("slug").is_some());
        assert!(errors.get("email").is_some());
    }
}
