//! Status and classification enums for billing entities.

use serde::{Deserialize, Serialize};

/// Billing period of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "saas.plan_interval", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PlanInterval {
    Hourly,
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

/// Relationship a user holds on an organization.
///
/// Any role gives the user access to the organization; managers can also
/// administer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "saas.role_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Manager,
    Contributor,
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manager => write!(f, "manager"),
            Self::Contributor => write!(f, "contributor"),
        }
    }
}

impl std::str::FromStr for RoleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager" => Ok(Self::Manager),
            "contributor" => Ok(Self::Contributor),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Direction of money movement between a customer and a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "saas.transaction_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Customer paid the provider.
    Charge,
    /// Provider returned money to the customer.
    Refund,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_kind_round_trips_through_str() {
        for role in [RoleKind::Manager, RoleKind::Contributor] {
            assert_eq!(role.to_string().parse::<RoleKind>().unwrap(), role);
        }
        assert!("owner".parse::<RoleKind>().is_err());
    }

    #[test]
    fn test_plan_interval_default_is_monthly() {
        assert_eq!(PlanInterval::default(), PlanInterval::Monthly);
        assert_eq!(
            serde_json::to_string(&PlanInterval::Yearly).unwrap(),
            "\"yearly\""
        );
    }
}
