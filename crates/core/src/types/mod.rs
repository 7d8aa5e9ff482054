//! Core types for Ledgerline.
//!
//! This module provides type-safe wrappers for common billing concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, DEFAULT_UNIT, Price};
pub use slug::{Slug, SlugError, slugify};
pub use status::*;
