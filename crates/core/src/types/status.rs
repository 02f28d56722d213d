//! Status and provider enums shared between the server and the CLI.

use serde::{Deserialize, Serialize};

/// Lifecycle of a persisted search request.
///
/// Requests are created as `Pending`, move to `InProgress` once the upstream
/// call starts, and finish as either `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "search_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Failed,
}

impl SearchStatus {
    /// Whether the request has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SearchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid search status: {s}")),
        }
    }
}

/// Upstream catalog provider.
///
/// Only Armtek performs real lookups; the enum exists so that stored rows and
/// request payloads carry an explicit source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Armtek,
}

impl Provider {
    /// Identifier used in storage and URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Armtek => "armtek",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "armtek" => Ok(Self::Armtek),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}
