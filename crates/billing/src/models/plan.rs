//! Plan types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerline_core::{CurrencyCode, OrganizationId, PlanId, PlanInterval, Price, Slug};

/// A subscription plan offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    #[serde(skip)]
    pub id: PlanId,
    pub slug: Slug,
    pub title: String,
    pub description: String,
    #[serde(skip)]
    pub organization_id: OrganizationId,
    pub is_active: bool,
    /// Amount charged per period, in cents.
    pub period_amount: i64,
    pub unit: CurrencyCode,
    pub interval: PlanInterval,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Price charged for one period.
    #[must_use]
    pub const fn period_price(&self) -> Price {
        Price::from_cents(self.period_amount, self.unit)
    }
}

/// A plan as returned by the plans API, with its formatted price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanResponse {
    #[serde(flatten)]
    pub plan: Plan,
    /// Display price, e.g. `$120.00`.
    pub price: String,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        let price = plan.period_price().to_string();
        Self { plan, price }
    }
}

/// Body of a plan create request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub period_amount: i64,
    pub unit: Option<CurrencyCode>,
    #[serde(default)]
    pub interval: PlanInterval,
}

/// Body of a plan update request. Omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlan {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub period_amount: Option<i64>,
    pub unit: Option<CurrencyCode>,
    pub interval: Option<PlanInterval>,
}

/// Body of a plan activation request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ActivatePlan {
    pub is_active: bool,
}
