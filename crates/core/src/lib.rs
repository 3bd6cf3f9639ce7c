//! Gerinmah Core - Shared types library.
//!
//! This crate provides common types used across all Gerinmah components:
//! - `storefront` - JSON API for the shop and the admin CMS
//! - `cli` - Command-line tools for migrations, backups and upload sync
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, usernames, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
