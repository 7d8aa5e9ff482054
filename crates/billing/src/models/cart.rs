//! Cart item types.
//!
//! A cart item is a pending selection of a plan, possibly on behalf of
//! someone else (`first_name`, `last_name`, `sync_on`). Items picked while
//! anonymous live in the session as [`SessionCartItem`] until they are
//! merged into [`CartItem`] records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerline_core::{CartItemId, PlanId, Slug, UserId};

/// A cart entry as stored in the session.
///
/// Every field but `plan` is optional; missing fields and empty strings
/// both mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCartItem {
    /// Slug of the selected plan.
    pub plan: String,
    /// Coupon code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    /// Number of seats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Email of the subscriber the item is bought for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_on: Option<String>,
}

impl SessionCartItem {
    /// Create an entry for a plan with nothing else set.
    #[must_use]
    pub fn for_plan(plan: impl Into<String>) -> Self {
        Self {
            plan: plan.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn coupon(&self) -> Option<&str> {
        self.coupon.as_deref().filter(|c| !c.is_empty())
    }

    /// Quantity, with zero treated as unset.
    #[must_use]
    pub fn quantity(&self) -> Option<u32> {
        self.quantity.filter(|q| *q > 0)
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn last_name(&self) -> &str {
        self.last_name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn sync_on(&self) -> &str {
        self.sync_on.as_deref().unwrap_or_default()
    }
}

/// A persisted cart item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub id: CartItemId,
    /// Owner; `None` until the item is claimed.
    pub user_id: Option<UserId>,
    pub plan_id: PlanId,
    pub plan_slug: Slug,
    pub coupon: Option<String>,
    pub quantity: Option<u32>,
    pub first_name: String,
    pub last_name: String,
    pub sync_on: String,
    /// Token letting another user take ownership of the item.
    pub claim_code: Option<String>,
    /// Set once the item has been checked out.
    pub recorded: bool,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    /// Returns `true` if this is the open item `entry` refers to for `user`.
    ///
    /// Items are identified by owner, plan and the on-behalf-of triple
    /// (`first_name`, `last_name`, `sync_on`).
    #[must_use]
    pub fn is_open_match(&self, user: UserId, entry: &SessionCartItem) -> bool {
        !self.recorded
            && self.user_id == Some(user)
            && self.plan_slug.as_str() == entry.plan
            && self.first_name == entry.first_name()
            && self.last_name == entry.last_name()
            && self.sync_on == entry.sync_on()
    }

    /// Fill fields that are unset on this item from `entry`.
    ///
    /// Fields that already hold a value are never overwritten, so absorbing
    /// the same entry twice is a no-op the second time. Returns `true` if
    /// anything changed.
    pub fn absorb(&mut self, entry: &SessionCartItem) -> bool {
        let mut updated = false;
        if let Some(coupon) = entry.coupon()
            && self.coupon.as_deref().is_none_or(str::is_empty)
        {
            self.coupon = Some(coupon.to_owned());
            updated = true;
        }
        if let Some(quantity) = entry.quantity()
            && self.quantity.is_none_or(|q| q == 0)
        {
            self.quantity = Some(quantity);
            updated = true;
        }
        updated |= fill_if_empty(&mut self.first_name, entry.first_name());
        updated |= fill_if_empty(&mut self.last_name, entry.last_name());
        updated |= fill_if_empty(&mut self.sync_on, entry.sync_on());
        updated
    }
}

fn fill_if_empty(field: &mut String, value: &str) -> bool {
    if field.is_empty() && !value.is_empty() {
        value.clone_into(field);
        return true;
    }
    false
}

/// Counts of what a merge of session items did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// New cart items created.
    pub created: usize,
    /// Existing cart items that gained at least one field.
    pub updated: usize,
    /// Existing cart items left as they were.
    pub unchanged: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stored(quantity: Option<u32>) -> CartItem {
        CartItem {
            id: CartItemId::new(1),
            user_id: Some(UserId::new(10)),
            plan_id: PlanId::new(5),
            plan_slug: Slug::parse("open-space").unwrap(),
            coupon: None,
            quantity,
            first_name: String::new(),
            last_name: String::new(),
            sync_on: String::new(),
            claim_code: None,
            recorded: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_absorb_keeps_set_quantity() {
        let mut item = stored(Some(3));
        let entry = SessionCartItem {
            quantity: Some(5),
            ..SessionCartItem::for_plan("open-space")
        };
        assert!(!item.absorb(&entry));
        assert_eq!(item.quantity, Some(3));
    }

    #[test]
    fn test_absorb_fills_unset_fields() {
        let mut item = stored(Some(0));
        let entry = SessionCartItem {
            coupon: Some("WELCOME".to_owned()),
            quantity: Some(2),
            ..SessionCartItem::for_plan("open-space")
        };
        assert!(item.absorb(&entry));
        assert_eq!(item.coupon.as_deref(), Some("WELCOME"));
        assert_eq!(item.quantity, Some(2));

        // Second pass has nothing left to fill
        assert!(!item.absorb(&entry));
    }

    #[test]
    fn test_absorb_ignores_empty_values() {
        let mut item = stored(None);
        let entry = SessionCartItem {
            coupon: Some(String::new()),
            quantity: Some(0),
            sync_on: Some(String::new()),
            ..SessionCartItem::for_plan("open-space")
        };
        assert!(!item.absorb(&entry));
        assert_eq!(item.coupon, None);
        assert_eq!(item.quantity, None);
    }

    #[test]
    fn test_is_open_match_uses_on_behalf_of_triple() {
        let mut item = stored(None);
        item.sync_on = "jane@acme.io".to_owned();
        let user = UserId::new(10);

        let mut entry = SessionCartItem::for_plan("open-space");
        assert!(!item.is_open_match(user, &entry));

        entry.sync_on = Some("jane@acme.io".to_owned());
        assert!(item.is_open_match(user, &entry));
        assert!(!item.is_open_match(UserId::new(11), &entry));

        item.recorded = true;
        assert!(!item.is_open_match(user, &entry));
    }

    #[test]
    fn test_session_item_deserializes_sparse_dict() {
        let item: SessionCartItem =
            serde_json::from_str(r#"{"plan": "open-space", "quantity": 4}"#).unwrap();
        assert_eq!(item.plan, "open-space");
        assert_eq!(item.quantity(), Some(4));
        assert_eq!(item.first_name(), "");
        assert_eq!(item.coupon(), None);
    }
}
