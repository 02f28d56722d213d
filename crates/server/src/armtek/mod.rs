//! Armtek web-service integration.
//!
//! Talks to the Armtek distributor API (`ws.armtek.ru`) to look up parts
//! by article number and to discover the customer structure behind a login.
//!
//! # Architecture
//!
//! - [`client`] - HTTP transport: basic auth, `format=json`, timeout, error mapping
//! - [`connector`] - transports bound to per-user credentials
//! - [`envelope`] - `STATUS` / `MESSAGES` / `RESP` unwrapping
//! - [`parsing`] - lenient scalar parsers (decimals, flags, dates, units)
//! - [`search`] - part search and main-offer selection
//! - [`profile`] - sales organizations and client structure, cached per `VKORG`
//! - [`tokens`] - deterministic correlation tokens
//! - [`session`] - recognition of login and challenge pages
//!
//! Services are generic over [`ArmtekTransport`] so they can run against the
//! real API, the offline stub, or a test double.

pub mod client;
pub mod connector;
pub mod envelope;
pub mod parsing;
pub mod profile;
pub mod search;
pub mod session;
pub mod tokens;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ArmtekClient, ArmtekTransport, StubTransport};
pub use connector::{ArmtekConnector, HttpConnector};
pub use profile::ProfileService;
pub use search::{RowParsing, SearchService, alternates_for, choose_first_non_analog};
pub use session::SessionStatus;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when interacting with the Armtek API.
#[derive(Debug, Error)]
pub enum ArmtekError {
    /// Credentials or the search context are missing or incomplete.
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Network failure, timeout, or non-2xx HTTP status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The envelope reported a non-200 `STATUS`.
    #[error("Armtek status {status}: {}", .messages.join("; "))]
    Status {
        /// Value of the `STATUS` field.
        status: i64,
        /// Entries of the `MESSAGES` field.
        messages: Vec<String>,
    },

    /// The body was not valid JSON or did not have the expected shape.
    #[error("Response format error: {0}")]
    ResponseFormat(String),

    /// Upstream served a login form or anti-bot challenge instead of data.
    #[error("Interactive login required: {0}")]
    InteractiveLoginRequired(SessionStatus),
}

impl From<reqwest::Error> for ArmtekError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Http("request to Armtek timed out".to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armtek_error_display() {
        let err = ArmtekError::Credentials("VKORG is required".to_string());
        assert_eq!(err.to_string(), "Credentials error: VKORG is required");

        let err = ArmtekError::Status {
            status: 401,
            messages: vec!["bad login".to_string(), "try again".to_string()],
        };
        assert_eq!(err.to_string(), "Armtek status 401: bad login; try again");
    }

    #[test]
    fn test_interactive_login_error_display() {
        let err = ArmtekError::InteractiveLoginRequired(SessionStatus::CaptchaRequired);
        assert_eq!(err.to_string(), "Interactive login required: captcha required");
    }
}
