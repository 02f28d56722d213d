//! Elizabeth Core - Shared types library.
//!
//! This crate provides common types used across all Elizabeth components:
//! - `server` - Armtek integration layer and JSON API
//! - `cli` - Command-line tools for migrations and one-off lookups
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
