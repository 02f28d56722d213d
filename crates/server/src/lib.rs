//! Elizabeth server library.
//!
//! Integrates the Armtek auto-parts web service into a parts search API:
//! the Armtek client and response parsing, credential resolution, search
//! history with product storage, and the characteristics callback store.
//!
//! The binary in `main.rs` wires these into an `axum` server; the library
//! form lets the CLI and integration tests reuse them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod armtek;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ServerConfig;
pub use error::AppError;
pub use state::AppState;
