//! Bazaar Core - Shared types library.
//!
//! This crate provides common types used across all Bazaar components:
//! - `server` - Storefront and admin JSON API
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, slugs, SKUs, money and
//!   statuses (with their transition rules)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
