//! Domain models for the billing service.
//!
//! These types represent validated domain objects separate from database
//! row types.

pub mod cart;
pub mod metrics;
pub mod organization;
pub mod plan;
pub mod session;
pub mod user;

pub use cart::{CartItem, MergeSummary, SessionCartItem};
pub use organization::{FormErrors, NewOrganization, Organization, OrganizationForm};
pub use plan::Plan;
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
