//! Business logic services.
//!
//! Services hold the rules that span more than one repository call. Simple
//! CRUD goes straight from route handlers to the repositories in [`crate::db`].

pub mod analytics;
pub mod api_keys;
pub mod auth;
pub mod checkout;
pub mod email;
pub mod inventory;
pub mod notifications;
pub mod numbering;
pub mod orders;
