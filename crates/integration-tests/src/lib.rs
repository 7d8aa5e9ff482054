//! Integration tests for Ledgerline.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ledgerline-integration-tests
//! ```
//!
//! The reconciliation and redirect suites run against [`MemoryBilling`], an
//! in-memory implementation of the billing stores, so they need no database.
//! The HTTP suite drives the real router over a lazily connected pool and
//! only touches routes that never reach `PostgreSQL`.
//!
//! # Test Categories
//!
//! - `cart_reconciliation` - Session cart transfer on login
//! - `context_redirects` - Organization, provider and user redirectors
//! - `next_url` - Redirect target validation
//! - `http` - Router wiring and authentication

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use secrecy::SecretString;

use ledgerline_billing::config::{AllowedHosts, BillingConfig};
use ledgerline_billing::db::RepositoryError;
use ledgerline_billing::models::{CartItem, MergeSummary, Organization, SessionCartItem};
use ledgerline_billing::services::{CartError, CartStore, OrganizationStore};
use ledgerline_core::{CartItemId, OrganizationId, PlanId, Slug, UserId};

/// Billing stores kept in memory.
///
/// Mirrors the transactional behavior of the `PostgreSQL` repositories:
/// each method either applies all of its changes or none.
#[derive(Debug, Default)]
pub struct MemoryBilling {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    organizations: Vec<Organization>,
    /// (user, organization)
    roles: Vec<(UserId, OrganizationId)>,
    /// slug -> (plan, provider)
    plans: BTreeMap<String, (PlanId, OrganizationId)>,
    /// code -> provider
    coupons: BTreeMap<String, OrganizationId>,
    cart_items: Vec<CartItem>,
    next_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemoryBilling {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    /// Add an organization; `is_provider` marks it as selling plans.
    pub fn add_organization(&self, slug: &str, full_name: &str, is_provider: bool) -> Organization {
        self.with_state(|state| {
            let organization = Organization {
                id: OrganizationId::new(state.next_id()),
                slug: Slug::parse(slug).unwrap_or_else(|e| panic!("bad slug {slug}: {e}")),
                full_name: full_name.to_owned(),
                email: format!("billing@{slug}.test"),
                is_provider,
                created_at: Utc::now(),
            };
            state.organizations.push(organization.clone());
            organization
        })
    }

    /// Give `user` a role on `organization`.
    pub fn grant(&self, user: UserId, organization: &Organization) {
        self.with_state(|state| state.roles.push((user, organization.id)));
    }

    /// Add a plan sold by `provider`.
    pub fn add_plan(&self, slug: &str, provider: &Organization) -> PlanId {
        self.with_state(|state| {
            let id = PlanId::new(state.next_id());
            state.plans.insert(slug.to_owned(), (id, provider.id));
            id
        })
    }

    /// Add a coupon redeemable on `provider`'s plans.
    pub fn add_coupon(&self, code: &str, provider: &Organization) {
        self.with_state(|state| state.coupons.insert(code.to_owned(), provider.id));
    }

    /// Add an unowned cart item waiting to be claimed with `code`.
    pub fn add_claimable(&self, plan: &str, code: &str) {
        self.with_state(|state| {
            let item = new_item(state, None, plan, &SessionCartItem::for_plan(plan));
            if let Some(mut item) = item {
                item.claim_code = Some(code.to_owned());
                state.cart_items.push(item);
            }
        });
    }

    /// Snapshot of every stored cart item.
    #[must_use]
    pub fn cart_items(&self) -> Vec<CartItem> {
        self.with_state(|state| state.cart_items.clone())
    }

    /// Open cart items owned by `user`.
    #[must_use]
    pub fn open_items(&self, user: UserId) -> Vec<CartItem> {
        self.with_state(|state| {
            state
                .cart_items
                .iter()
                .filter(|item| item.user_id == Some(user) && !item.recorded)
                .cloned()
                .collect()
        })
    }
}

fn new_item(
    state: &mut State,
    user: Option<UserId>,
    plan: &str,
    entry: &SessionCartItem,
) -> Option<CartItem> {
    let (plan_id, _) = *state.plans.get(plan)?;
    let plan_slug = Slug::parse(plan).ok()?;
    Some(CartItem {
        id: CartItemId::new(state.next_id()),
        user_id: user,
        plan_id,
        plan_slug,
        coupon: entry.coupon().map(str::to_owned),
        quantity: entry.quantity(),
        first_name: entry.first_name().to_owned(),
        last_name: entry.last_name().to_owned(),
        sync_on: entry.sync_on().to_owned(),
        claim_code: None,
        recorded: false,
        created_at: Utc::now(),
    })
}

impl CartStore for MemoryBilling {
    async fn claim(&self, user: UserId, code: &str) -> Result<u64, CartError> {
        Ok(self.with_state(|state| {
            let mut claimed = 0;
            for item in &mut state.cart_items {
                if !item.recorded && item.claim_code.as_deref() == Some(code) {
                    item.user_id = Some(user);
                    item.claim_code = None;
                    claimed += 1;
                }
            }
            claimed
        }))
    }

    async fn merge_items(
        &self,
        user: UserId,
        items: &[SessionCartItem],
    ) -> Result<MergeSummary, CartError> {
        self.with_state(|state| {
            if let Some(unknown) = items.iter().find(|i| !state.plans.contains_key(&i.plan)) {
                return Err(CartError::PlanNotFound(unknown.plan.clone()));
            }

            let mut summary = MergeSummary::default();
            for entry in items {
                if let Some(existing) = state
                    .cart_items
                    .iter_mut()
                    .find(|item| item.is_open_match(user, entry))
                {
                    if existing.absorb(entry) {
                        summary.updated += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                } else if let Some(item) = new_item(state, Some(user), &entry.plan, entry) {
                    state.cart_items.push(item);
                    summary.created += 1;
                }
            }
            Ok(summary)
        })
    }

    async fn redeem(&self, user: UserId, codes: &[String]) -> Result<u64, CartError> {
        Ok(self.with_state(|state| {
            let mut redeemed = 0;
            for code in codes {
                let Some(provider) = state.coupons.get(code).copied() else {
                    continue;
                };
                let plans: Vec<PlanId> = state
                    .plans
                    .values()
                    .filter(|(_, owner)| *owner == provider)
                    .map(|(id, _)| *id)
                    .collect();
                for item in &mut state.cart_items {
                    if item.user_id == Some(user)
                        && !item.recorded
                        && item.coupon.as_deref().is_none_or(str::is_empty)
                        && plans.contains(&item.plan_id)
                    {
                        item.coupon = Some(code.clone());
                        redeemed += 1;
                    }
                }
            }
            redeemed
        }))
    }
}

impl OrganizationStore for MemoryBilling {
    async fn accessible_by(&self, user: UserId) -> Result<Vec<Organization>, RepositoryError> {
        Ok(self.with_state(|state| {
            let mut accessible: Vec<Organization> = state
                .organizations
                .iter()
                .filter(|org| state.roles.contains(&(user, org.id)))
                .cloned()
                .collect();
            accessible.sort_by(|a, b| a.slug.as_str().cmp(b.slug.as_str()));
            accessible.dedup_by_key(|org| org.id);
            accessible
        }))
    }

    async fn has_direct_role(
        &self,
        user: UserId,
        organization: OrganizationId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.with_state(|state| state.roles.contains(&(user, organization))))
    }

    async fn find_by_slug(&self, slug: &Slug) -> Result<Option<Organization>, RepositoryError> {
        Ok(self.with_state(|state| {
            state
                .organizations
                .iter()
                .find(|org| org.slug == *slug)
                .cloned()
        }))
    }
}

/// Configuration for tests; no environment variables are read.
#[must_use]
pub fn test_config() -> BillingConfig {
    BillingConfig {
        database_url: SecretString::from("postgres://ledgerline@localhost/ledgerline_test"),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 3000,
        base_url: "http://localhost:3000".to_owned(),
        session_secret: SecretString::from("k8J#2mQ!x9Lp$4vR@7nT&1zW^5cY*3bH"),
        debug: false,
        allowed_hosts: AllowedHosts::new(["billing.acme.io", "localhost"]),
        broker_slug: Slug::parse("broker").unwrap_or_else(|e| panic!("bad broker slug: {e}")),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}
