//! Session-related types.
//!
//! Types stored in the session by the login subsystem and by anonymous
//! shopping flows.

use serde::{Deserialize, Serialize};

use ledgerline_core::{Slug, UserId};

/// Session-stored user identity.
///
/// Written by the authentication subsystem after login; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Login name, also used as the default slug of the user's own organization.
    pub username: Slug,
    /// User's email address.
    pub email: String,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for cart items selected before the user was authenticated.
    pub const CART_ITEMS: &str = "cart_items";

    /// Key for coupon codes redeemed before the user was authenticated.
    pub const REDEEMED: &str = "redeemed";
}
