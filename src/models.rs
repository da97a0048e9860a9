//! Core data types for index synchronization and search.
//!
//! These types represent the canonical service rows, the flattened documents
//! mirrored into the search engine, and the public response envelopes. The
//! engine's native response shape never crosses this boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical service row as returned by the relational store.
///
/// Timestamps arrive as ISO-8601 strings because the fetcher coerces every
/// date/time column to a transport-safe scalar before handing the record on.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub location: Option<String>,
    pub price_per_day: Option<f64>,
    pub capacity: Option<String>,
    pub technical_specs: Option<String>,
    pub supplier_id: Uuid,
    pub supplier_name: Option<String>,
    pub created_at: Option<String>,
}

/// Flattened projection of one [`ServiceRecord`] in the engine's document
/// schema. Every field has a defined value — optional source fields collapse
/// to `""` / `0` so faceting and sorting stay consistent across documents.
///
/// `id` is the record id in string form; it is the join key for upserts and
/// deletes. `created_at` is Unix epoch seconds because the collection's
/// default sort field must be a sortable numeric type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDocument {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub capacity: String,
    pub technical_specs: String,
    pub supplier_id: String,
    pub supplier_name: String,
    pub price_per_day: f64,
    pub created_at: i64,
}

/// One `(word, synonym)` row from the synonym table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymPair {
    pub word: String,
    pub synonym: String,
}

/// Structured search filters. Absent filters emit no clause at all.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// A single search hit: the matched document plus the engine's per-hit
/// relevance metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: ServiceDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_match: Option<u64>,
}

/// Stable search response envelope exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: i64,
    pub page: i64,
    pub results: Vec<SearchHit>,
}

impl SearchResponse {
    /// The degraded envelope: no hits, zero matches, first page.
    pub fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            total: 0,
            page: 1,
            results: Vec::new(),
        }
    }
}

/// Typeahead response: distinct titles matching a prefix, best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub query: String,
    pub suggestions: Vec<String>,
}

/// Acknowledgement returned by the index and delete operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReceipt {
    pub success: bool,
    pub id: String,
    pub message: String,
}
