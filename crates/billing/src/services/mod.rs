//! Business logic for the billing service.
//!
//! # Services
//!
//! - `cart` - Reconciles session carts into persisted cart items
//! - `redirect` - Picks the organization context a user is sent into
//! - `next_url` - Validates `next` redirect targets
//! - `metrics` - Builds provider reporting tables
//! - `plans` - Plan slug and update rules
//!
//! Storage is reached through the [`cart::CartStore`] and
//! [`redirect::OrganizationStore`] traits so flows can run against any
//! backend.

pub mod cart;
pub mod metrics;
pub mod next_url;
pub mod plans;
pub mod redirect;

pub use cart::{CartError, CartStore, PendingCart, ReconcileSummary, reconcile};
pub use redirect::{
    OrganizationRedirect, OrganizationStore, ProviderRedirect, RedirectOutcome, UserRedirect,
};
