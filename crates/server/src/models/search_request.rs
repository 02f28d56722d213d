//! Search request history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use elizabeth_core::{SearchRequestId, SearchStatus, UserId};

/// One search submitted by a user, with its lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Unique request ID.
    pub id: SearchRequestId,
    /// User who submitted the search (`None` for CLI lookups).
    pub user_id: Option<UserId>,
    /// Provider queried, e.g. `armtek`.
    pub source: String,
    /// The query as submitted.
    pub query_string: String,
    /// Lifecycle status.
    pub status: SearchStatus,
    /// Number of products the search produced.
    pub total_items: i32,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request was last updated.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_serialization() {
        let request = SearchRequest {
            id: SearchRequestId::new(5),
            user_id: Some(UserId::new(1)),
            source: "armtek".to_string(),
            query_string: "OC90_MAHLE".to_string(),
            status: SearchStatus::InProgress,
            total_items: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&request).expect("serialize");
        assert!(json.contains("\"id\":5"));
        assert!(json.contains("\"status\":\"in_progress\""));
        assert!(json.contains("\"query_string\":\"OC90_MAHLE\""));
    }
}
