//! Catalog products produced by searches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use elizabeth_core::{ProductId, SearchRequestId, UserId};

use crate::armtek::{AltArticle, SearchItem};

/// A product as stored after a search.
///
/// Unique by `(artid, source)`. The offer data lives in `item`; tokens are
/// derived at search time from the item and the customer context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// User whose search created or last refreshed the product.
    pub user_id: Option<UserId>,
    /// Search that created or last refreshed the product.
    pub search_request_id: Option<SearchRequestId>,
    /// Provider the offer came from.
    pub source: String,
    /// The offer itself.
    #[serde(flatten)]
    pub item: SearchItem,
    /// Analogs returned next to the main offer.
    pub alt_articles: Vec<AltArticle>,
    /// Correlation token for the offer under the searching context.
    pub api_token: String,
    /// Token under which characteristics are reported.
    pub characteristics_token: String,
    /// When the offer data was last fetched from the provider.
    pub fetched_at: DateTime<Utc>,
    /// When the product was first stored.
    pub created_at: DateTime<Utc>,
    /// When the product was last written.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the offer data is younger than `ttl` at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        chrono::Duration::from_std(ttl).is_ok_and(|ttl| now - self.fetched_at < ttl)
    }
}

/// A product ready to be written, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub item: SearchItem,
    pub alt_articles: Vec<AltArticle>,
    pub api_token: String,
    pub characteristics_token: String,
}

impl ProductDraft {
    /// Article id the draft is keyed by.
    #[must_use]
    pub fn artid(&self) -> &str {
        &self.item.artid
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn product(fetched_at: DateTime<Utc>) -> Product {
        let draft = fixtures::draft("111", "Oil filter");
        Product {
            id: ProductId::new(1),
            user_id: None,
            search_request_id: Some(SearchRequestId::new(3)),
            source: "armtek".to_string(),
            item: draft.item,
            alt_articles: vec![AltArticle {
                pin: "W712".to_string(),
                brand: "MANN".to_string(),
            }],
            api_token: draft.api_token,
            characteristics_token: draft.characteristics_token,
            fetched_at,
            created_at: fetched_at,
            updated_at: fetched_at,
        }
    }

    #[test]
    fn test_is_fresh_window() {
        let now = Utc::now();
        let ttl = Duration::from_secs(3600);
        assert!(product(now - chrono::Duration::minutes(59)).is_fresh(now, ttl));
        assert!(!product(now - chrono::Duration::minutes(61)).is_fresh(now, ttl));
        assert!(!product(now).is_fresh(now, Duration::ZERO));
    }

    #[test]
    fn test_product_serializes_flat() {
        let json = serde_json::to_value(product(Utc::now())).expect("serialize");
        assert_eq!(json["artid"], "111");
        assert_eq!(json["name"], "Oil filter");
        assert_eq!(json["alt_articles"][0]["brand"], "MANN");
        assert_eq!(json["characteristics_token"], "char-111");
    }
}
