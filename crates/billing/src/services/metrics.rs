//! Provider reporting.
//!
//! Tables are computed over monthly periods: every first-of-month instant
//! strictly inside the reporting range closes a period, and the range end
//! closes the last one.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use ledgerline_core::{OrganizationId, TransactionKind};

use crate::models::Plan;
use crate::models::metrics::{MetricsSeries, MetricsTable, SubscriptionRecord, TransactionRecord};

/// Months covered when a report does not name its start.
pub const DEFAULT_TRAILING_MONTHS: u32 = 12;

/// Longest range a report may cover.
pub const MAX_REPORT_MONTHS: u32 = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("start_at must be before ends_at")]
    Inverted,
    #[error("date out of range")]
    OutOfRange,
    #[error("reports cover at most {MAX_REPORT_MONTHS} months")]
    TooLong,
}

/// Query parameters selecting a reporting range.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RangeQuery {
    pub start_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// A half-open reporting range `[start_at, ends_at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub start_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl ReportRange {
    /// Build a range from query parameters, defaulting to the trailing
    /// [`DEFAULT_TRAILING_MONTHS`] months ending `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the start is not before the end, or if the range
    /// spans more than [`MAX_REPORT_MONTHS`] months.
    pub fn from_query(query: RangeQuery, now: DateTime<Utc>) -> Result<Self, RangeError> {
        let ends_at = query.ends_at.unwrap_or(now);
        let start_at = match query.start_at {
            Some(start_at) => start_at,
            None => ends_at
                .checked_sub_months(Months::new(DEFAULT_TRAILING_MONTHS))
                .ok_or(RangeError::OutOfRange)?,
        };
        if start_at >= ends_at {
            return Err(RangeError::Inverted);
        }
        if let Some(limit) = start_at.checked_add_months(Months::new(MAX_REPORT_MONTHS))
            && ends_at > limit
        {
            return Err(RangeError::TooLong);
        }
        Ok(Self { start_at, ends_at })
    }

    /// Closing instant of each period, ascending.
    #[must_use]
    pub fn period_ends(&self) -> Vec<DateTime<Utc>> {
        let mut ends = Vec::new();
        let mut boundary = next_month_start(self.start_at);
        while let Some(instant) = boundary
            && instant < self.ends_at
        {
            ends.push(instant);
            boundary = next_month_start(instant);
        }
        ends.push(self.ends_at);
        ends
    }

    /// `(start, end)` of each period, ascending.
    #[must_use]
    pub fn periods(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let ends = self.period_ends();
        let starts = std::iter::once(self.start_at).chain(ends.iter().copied());
        starts.zip(ends.iter().copied()).collect()
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_at <= at && at < self.ends_at
    }
}

/// First instant of the month following `at`.
fn next_month_start(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let first = NaiveDate::from_ymd_opt(at.year(), at.month(), 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some(Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?))
}

/// Active subscriptions per plan at each period end.
#[must_use]
pub fn plan_table(range: &ReportRange, plans: &[Plan], subscriptions: &[SubscriptionRecord]) -> MetricsTable {
    let ends = range.period_ends();
    let table = plans
        .iter()
        .map(|plan| MetricsSeries {
            key: plan.slug.to_string(),
            values: ends
                .iter()
                .map(|&end| {
                    let active = subscriptions
                        .iter()
                        .filter(|s| s.plan_slug == plan.slug && s.is_active_at(end))
                        .count();
                    (end, count(active))
                })
                .collect(),
        })
        .collect();

    MetricsTable {
        title: "Active Subscribers".to_owned(),
        scale: 1,
        unit: "number".to_owned(),
        table,
    }
}

/// Total, new and churned customers per period.
///
/// A customer is an organization with at least one active subscription.
#[must_use]
pub fn customer_table(range: &ReportRange, subscriptions: &[SubscriptionRecord]) -> MetricsTable {
    let active_at = |at: DateTime<Utc>| -> BTreeSet<OrganizationId> {
        subscriptions
            .iter()
            .filter(|s| s.is_active_at(at))
            .map(|s| s.organization_id)
            .collect()
    };

    let mut total = Vec::new();
    let mut new = Vec::new();
    let mut churned = Vec::new();
    for (start, end) in range.periods() {
        let before = active_at(start);
        let after = active_at(end);
        let joined: BTreeSet<OrganizationId> = subscriptions
            .iter()
            .filter(|s| start <= s.created_at && s.created_at < end)
            .map(|s| s.organization_id)
            .filter(|org| !before.contains(org))
            .collect();

        total.push((end, count(after.len())));
        new.push((end, count(joined.len())));
        churned.push((end, count(before.difference(&after).count())));
    }

    MetricsTable {
        title: "Customers".to_owned(),
        scale: 1,
        unit: "number".to_owned(),
        table: vec![
            MetricsSeries {
                key: "Total # of Customers".to_owned(),
                values: total,
            },
            MetricsSeries {
                key: "# of new Customers".to_owned(),
                values: new,
            },
            MetricsSeries {
                key: "# of churned Customers".to_owned(),
                values: churned,
            },
        ],
    }
}

/// Sales, refunds and net revenue per period, in cents.
#[must_use]
pub fn revenue_table(range: &ReportRange, unit: &str, transactions: &[TransactionRecord]) -> MetricsTable {
    let mut sales = Vec::new();
    let mut refunds = Vec::new();
    let mut net = Vec::new();
    for (start, end) in range.periods() {
        let (charged, refunded) = transactions
            .iter()
            .filter(|t| start <= t.created_at && t.created_at < end)
            .fold((0_i64, 0_i64), |(charged, refunded), t| match t.kind {
                TransactionKind::Charge => (charged + t.amount, refunded),
                TransactionKind::Refund => (charged, refunded + t.amount),
            });
        sales.push((end, charged));
        refunds.push((end, refunded));
        net.push((end, charged - refunded));
    }

    MetricsTable {
        title: "Amount".to_owned(),
        scale: 100,
        unit: unit.to_owned(),
        table: vec![
            MetricsSeries {
                key: "Total Sales".to_owned(),
                values: sales,
            },
            MetricsSeries {
                key: "Refunds".to_owned(),
                values: refunds,
            },
            MetricsSeries {
                key: "Net".to_owned(),
                values: net,
            },
        ],
    }
}

/// Running net balance at each period end, in cents.
///
/// `transactions` should include everything before the range start.
#[must_use]
pub fn balance_table(range: &ReportRange, unit: &str, transactions: &[TransactionRecord]) -> MetricsTable {
    let mut by_end: BTreeMap<DateTime<Utc>, i64> = BTreeMap::new();
    for end in range.period_ends() {
        let balance = transactions
            .iter()
            .filter(|t| t.created_at < end)
            .map(|t| match t.kind {
                TransactionKind::Charge => t.amount,
                TransactionKind::Refund => -t.amount,
            })
            .sum();
        by_end.insert(end, balance);
    }

    MetricsTable {
        title: "Balances".to_owned(),
        scale: 100,
        unit: unit.to_owned(),
        table: vec![MetricsSeries {
            key: "Balance".to_owned(),
            values: by_end.into_iter().collect(),
        }],
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
