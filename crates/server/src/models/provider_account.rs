//! Stored provider credentials.

use chrono::{DateTime, Utc};
use serde::Serialize;

use elizabeth_core::{ProviderAccountId, UserId};

use crate::armtek::PartialContext;

/// A user's login at a provider, with the password encrypted at rest.
///
/// `encrypted_password` is skipped on serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAccount {
    /// Unique account ID.
    pub id: ProviderAccountId,
    /// Owner.
    pub user_id: UserId,
    /// Provider identifier, e.g. `armtek`.
    pub provider: String,
    /// Provider login.
    pub login: String,
    /// Cipher output for the password.
    #[serde(skip)]
    pub encrypted_password: String,
    /// Cached or user-supplied search context.
    pub context: PartialContext,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}
