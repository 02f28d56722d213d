//! Correlation store for out-of-band characteristics.
//!
//! Search registers a characteristics token per product; a browser extension
//! or scraper later posts the scraped fields under that token, and clients
//! poll until the record turns ready.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::armtek::parsing::{parse_length_mm, parse_weight_grams};
use crate::config::CharacteristicsConfig;

/// Scraped fields for one token. Values are kept as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CharacteristicsUpdate {
    pub artid: Option<String>,
    pub image_url: Option<String>,
    pub weight: Option<String>,
    pub length: Option<String>,
    pub height: Option<String>,
    pub width: Option<String>,
    pub analog_code: Option<String>,
}

/// State of one token. `ready` never goes back to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacteristicsRecord {
    pub token: String,
    pub artid: Option<String>,
    pub ready: bool,
    pub image_url: Option<String>,
    pub weight: Option<String>,
    pub length: Option<String>,
    pub height: Option<String>,
    pub width: Option<String>,
    pub analog_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Weight and dimensions converted to grams and millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedDimensions {
    pub weight_grams: Option<i64>,
    pub length_mm: Option<i64>,
    pub height_mm: Option<i64>,
    pub width_mm: Option<i64>,
}

impl CharacteristicsRecord {
    fn pending(token: &str, artid: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            token: token.to_string(),
            artid,
            ready: false,
            image_url: None,
            weight: None,
            length: None,
            height: None,
            width: None,
            analog_code: None,
            created_at: now,
            received_at: None,
        }
    }

    fn mark_ready(&mut self, update: CharacteristicsUpdate, now: DateTime<Utc>) {
        self.artid = update.artid;
        self.image_url = update.image_url;
        self.weight = update.weight;
        self.length = update.length;
        self.height = update.height;
        self.width = update.width;
        self.analog_code = update.analog_code;
        self.received_at = Some(now);
        self.ready = true;
    }

    /// Numeric view of the free-text measurements.
    #[must_use]
    pub fn normalized(&self) -> NormalizedDimensions {
        NormalizedDimensions {
            weight_grams: self.weight.as_deref().and_then(parse_weight_grams),
            length_mm: self.length.as_deref().and_then(parse_length_mm),
            height_mm: self.height.as_deref().and_then(parse_length_mm),
            width_mm: self.width.as_deref().and_then(parse_length_mm),
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    records: HashMap<String, CharacteristicsRecord>,
    // Insertion order, oldest first.
    order: VecDeque<String>,
}

impl Entries {
    fn evict(&mut self, limits: CharacteristicsConfig, now: DateTime<Utc>) {
        if let Some(max_age) = limits.max_age.and_then(|a| chrono::Duration::from_std(a).ok()) {
            while let Some(token) = self.order.front() {
                let expired = self
                    .records
                    .get(token)
                    .is_none_or(|r| now - r.created_at >= max_age);
                if !expired {
                    break;
                }
                if let Some(token) = self.order.pop_front() {
                    self.records.remove(&token);
                }
            }
        }

        if let Some(max_entries) = limits.max_entries {
            while self.records.len() >= max_entries.max(1) {
                let Some(token) = self.order.pop_front() else {
                    break;
                };
                self.records.remove(&token);
            }
        }
    }

    fn insert(&mut self, record: CharacteristicsRecord) {
        self.order.push_back(record.token.clone());
        self.records.insert(record.token.clone(), record);
    }
}

/// Token-keyed characteristics records behind an async mutex.
///
/// With no limits configured the store grows without bound. Limits are
/// enforced when a new token is inserted, dropping the oldest records first.
#[derive(Debug, Default)]
pub struct CharacteristicsStore {
    entries: Mutex<Entries>,
    limits: CharacteristicsConfig,
}

impl CharacteristicsStore {
    #[must_use]
    pub fn new(limits: CharacteristicsConfig) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            limits,
        }
    }

    /// Create a pending record unless the token is empty or already known.
    pub async fn register(&self, token: &str, artid: &str) {
        if token.is_empty() {
            return;
        }
        let mut entries = self.entries.lock().await;
        if entries.records.contains_key(token) {
            return;
        }
        let now = Utc::now();
        entries.evict(self.limits, now);
        entries.insert(CharacteristicsRecord::pending(
            token,
            Some(artid.to_string()),
            now,
        ));
    }

    /// Store scraped fields under `token`, creating the record if needed.
    pub async fn save(&self, token: &str, update: CharacteristicsUpdate) -> CharacteristicsRecord {
        let mut entries = self.entries.lock().await;
        let now = Utc::now();

        if !entries.records.contains_key(token) {
            entries.evict(self.limits, now);
            entries.insert(CharacteristicsRecord::pending(token, update.artid.clone(), now));
        }

        match entries.records.get_mut(token) {
            Some(record) => {
                record.mark_ready(update, now);
                record.clone()
            }
            None => {
                // Unreachable: inserted above under the same lock.
                let mut record = CharacteristicsRecord::pending(token, None, now);
                record.mark_ready(update, now);
                record
            }
        }
    }

    pub async fn get_by_token(&self, token: &str) -> Option<CharacteristicsRecord> {
        self.entries.lock().await.records.get(token).cloned()
    }
}
