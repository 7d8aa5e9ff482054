//! Plan management rules.

use std::collections::BTreeSet;

use thiserror::Error;

use ledgerline_core::{CurrencyCode, DEFAULT_UNIT, Slug, slugify};

use crate::models::Plan;
use crate::models::plan::UpdatePlan;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Title yields no usable slug.
    #[error("title must contain at least one letter or digit")]
    InvalidTitle,

    #[error("period_amount must not be negative")]
    NegativeAmount,

    #[error("Cannot delete a plan with subscribers")]
    HasSubscribers,
}

/// Derive a slug for `title` that is not in `taken`.
///
/// The plain slug is used when free, then `-0`, `-1`, ... suffixes in turn.
///
/// # Errors
///
/// Returns [`PlanError::InvalidTitle`] if the title slugifies to nothing.
pub fn unique_slug(title: &str, taken: &BTreeSet<String>) -> Result<Slug, PlanError> {
    let base = slugify(title);
    if base.is_empty() {
        return Err(PlanError::InvalidTitle);
    }

    let mut candidate = base.clone();
    let mut counter = 0_u32;
    while taken.contains(&candidate) {
        let suffix = format!("-{counter}");
        let keep = Slug::MAX_LENGTH.saturating_sub(suffix.len()).min(base.len());
        candidate = format!("{}{suffix}", base[..keep].trim_end_matches('-'));
        counter += 1;
    }
    Slug::parse(&candidate).map_err(|_| PlanError::InvalidTitle)
}

/// Unit for a new plan: the requested one, else the provider's first
/// plan's, else [`DEFAULT_UNIT`].
#[must_use]
pub fn default_unit(requested: Option<CurrencyCode>, existing: &[Plan]) -> CurrencyCode {
    requested
        .or_else(|| existing.first().map(|plan| plan.unit))
        .unwrap_or(DEFAULT_UNIT)
}

/// Check amounts in a create or update request.
///
/// # Errors
///
/// Returns [`PlanError::NegativeAmount`] for a negative period amount.
pub const fn validate_amount(period_amount: Option<i64>) -> Result<(), PlanError> {
    match period_amount {
        Some(amount) if amount < 0 => Err(PlanError::NegativeAmount),
        _ => Ok(()),
    }
}

/// Apply an update to `plan`.
///
/// `new_slug` replaces the slug when the title changed and the plan never
/// had subscriptions. Omitted fields, `is_active` included, keep their value.
pub fn apply_update(plan: &mut Plan, update: UpdatePlan, new_slug: Option<Slug>) {
    if let Some(title) = update.title {
        plan.title = title;
    }
    if let Some(slug) = new_slug {
        plan.slug = slug;
    }
    if let Some(description) = update.description {
        plan.description = description;
    }
    if let Some(is_active) = update.is_active {
        plan.is_active = is_active;
    }
    if let Some(period_amount) = update.period_amount {
        plan.period_amount = period_amount;
    }
    if let Some(unit) = update.unit {
        plan.unit = unit;
    }
    if let Some(interval) = update.interval {
        plan.interval = interval;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use ledgerline_core::{OrganizationId, PlanId, PlanInterval};

    use super::*;

    fn taken(slugs: &[&str]) -> BTreeSet<String> {
        slugs.iter().map(|s| (*s).to_owned()).collect()
    }

    fn plan() -> Plan {
        Plan {
            id: PlanId::new(1),
            slug: Slug::parse("open-space").unwrap(),
            title: "Open Space".to_owned(),
            description: "A desk".to_owned(),
            organization_id: OrganizationId::new(2),
            is_active: true,
            period_amount: 12000,
            unit: CurrencyCode::Eur,
            interval: PlanInterval::Monthly,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unique_slug_free() {
        assert_eq!(unique_slug("Open Space", &taken(&[])).unwrap().as_str(), "open-space");
    }

    #[test]
    fn test_unique_slug_suffixes() {
        let slugs = taken(&["open-space", "open-space-0"]);
        assert_eq!(unique_slug("Open Space", &slugs).unwrap().as_str(), "open-space-1");
    }

    #[test]
    fn test_unique_slug_stays_within_length() {
        let title = "x".repeat(80);
        let slugs = taken(&[&"x".repeat(Slug::MAX_LENGTH)]);
        let slug = unique_slug(&title, &slugs).unwrap();
        assert_eq!(slug.as_str().len(), Slug::MAX_LENGTH);
        assert!(slug.as_str().ends_with("-0"));
    }

    #[test]
    fn test_unique_slug_rejects_symbols() {
        assert_eq!(unique_slug("!!!", &taken(&[])), Err(PlanError::InvalidTitle));
    }

    #[test]
    fn test_default_unit_prefers_existing_plan() {
        assert_eq!(default_unit(None, &[]), CurrencyCode::Usd);
        assert_eq!(default_unit(None, &[plan()]), CurrencyCode::Eur);
        assert_eq!(default_unit(Some(CurrencyCode::Gbp), &[plan()]), CurrencyCode::Gbp);
    }

    #[test]
    fn test_apply_update_keeps_omitted_fields() {
        let mut plan = plan();
        apply_update(
            &mut plan,
            UpdatePlan {
                period_amount: Some(9000),
                ..UpdatePlan::default()
            },
            None,
        );
        assert!(plan.is_active);
        assert_eq!(plan.period_amount, 9000);
        assert_eq!(plan.slug.as_str(), "open-space");
    }

    #[test]
    fn test_negative_amount_rejected() {
        assert_eq!(validate_amount(Some(-1)), Err(PlanError::NegativeAmount));
        assert_eq!(validate_amount(None), Ok(()));
    }
}
