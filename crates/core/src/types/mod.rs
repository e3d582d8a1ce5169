//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod sku;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{line_total, percent_of, round_money};
pub use sku::{Sku, SkuError};
pub use slug::{Slug, SlugError};
pub use status::*;
