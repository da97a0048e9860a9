//! Search engine gateway.
//!
//! Owns the HTTP connection to the search engine and translates its REST
//! semantics into outcome types the rest of the crate can branch on:
//! a 404 on delete becomes [`DeleteOutcome::NotFound`], not an error; a
//! missing collection becomes `collection_exists() == false`. Everything
//! upstream of this module is driver-agnostic.
//!
//! # Failure policy
//!
//! | Operation | On engine failure |
//! |-----------|-------------------|
//! | `bootstrap` | retried with fixed backoff, fatal after exhaustion |
//! | `upsert_document`, `delete_document`, `upsert_synonym_set` | propagate — silent failure here means silent index drift |
//! | `raw_search` | propagate; the query layer absorbs and degrades |

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::models::{SearchFilters, ServiceDocument};
use crate::retry::RetryPolicy;

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

#[derive(Debug, Error)]
pub enum EngineError {
    /// Document rejected before any I/O.
    #[error("invalid document: {0}")]
    Validation(String),

    /// Engine unreachable or timed out.
    #[error("search engine unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// Engine answered with a non-success status.
    #[error("search engine returned {status}: {body}")]
    Api { status: u16, body: String },
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Outcome of a delete: deleting an id that is not indexed is a distinct
/// outcome, not a failure — delete is vacuously idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Client handle for the search engine. Cheap to clone and safe for
/// concurrent use by multiple in-flight requests.
#[derive(Clone)]
pub struct EngineClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    collection: String,
}

impl EngineClient {
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ============ Collection lifecycle ============

    pub async fn collection_exists(&self) -> EngineResult<bool> {
        let resp = self
            .http
            .get(self.url(&format!("/collections/{}", self.collection)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(api_error(resp).await),
        }
    }

    pub async fn create_collection(&self) -> EngineResult<()> {
        let resp = self
            .http
            .post(self.url("/collections"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&collection_schema(&self.collection))
            .send()
            .await?;

        // A concurrent startup can win the create race; the collection is
        // there either way.
        if resp.status() == StatusCode::CONFLICT {
            return Ok(());
        }

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        Ok(())
    }

    /// Idempotent create-if-absent, retried with fixed spacing while the
    /// engine comes up. After the attempt budget is spent the last error
    /// propagates — the owning process must not serve traffic against a
    /// missing collection.
    pub async fn bootstrap(&self, policy: &RetryPolicy) -> EngineResult<()> {
        policy.run(|| self.ensure_collection()).await
    }

    async fn ensure_collection(&self) -> EngineResult<()> {
        if self.collection_exists().await? {
            tracing::debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }

        tracing::info!(collection = %self.collection, "creating collection");
        self.create_collection().await
    }

    // ============ Documents ============

    /// Replace-or-insert by document id. The minimal required fields are
    /// checked before anything is sent.
    pub async fn upsert_document(&self, document: &ServiceDocument) -> EngineResult<()> {
        if document.id.trim().is_empty() {
            return Err(EngineError::Validation(
                "document id must not be empty".to_string(),
            ));
        }
        if document.title.trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "document {} has an empty title",
                document.id
            )));
        }

        let resp = self
            .http
            .post(self.url(&format!("/collections/{}/documents", self.collection)))
            .query(&[("action", "upsert")])
            .header(API_KEY_HEADER, &self.api_key)
            .json(document)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        Ok(())
    }

    pub async fn delete_document(&self, id: &str) -> EngineResult<DeleteOutcome> {
        let resp = self
            .http
            .delete(self.url(&format!(
                "/collections/{}/documents/{}",
                self.collection, id
            )))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::NotFound),
            status if status.is_success() => Ok(DeleteOutcome::Deleted),
            _ => Err(api_error(resp).await),
        }
    }

    // ============ Search ============

    pub async fn raw_search(&self, params: &RawSearchParams) -> EngineResult<RawSearchResponse> {
        let mut query: Vec<(&str, String)> = vec![
            ("q", params.q.clone()),
            ("query_by", params.query_by.clone()),
            ("query_by_weights", params.query_by_weights.clone()),
            ("page", params.page.to_string()),
            ("per_page", params.per_page.to_string()),
            ("sort_by", params.sort_by.clone()),
            ("prefix", params.prefix.to_string()),
            ("num_typos", params.num_typos.to_string()),
        ];
        if let Some(ref filter) = params.filter_by {
            query.push(("filter_by", filter.clone()));
        }

        let resp = self
            .http
            .get(self.url(&format!(
                "/collections/{}/documents/search",
                self.collection
            )))
            .query(&query)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        Ok(resp.json().await?)
    }

    // ============ Synonyms ============

    /// Full overwrite of the named synonym set.
    pub async fn upsert_synonym_set(&self, key: &str, members: &[String]) -> EngineResult<()> {
        let resp = self
            .http
            .put(self.url(&format!(
                "/collections/{}/synonyms/{}",
                self.collection, key
            )))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&serde_json::json!({ "synonyms": members }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        Ok(())
    }
}

async fn api_error(resp: reqwest::Response) -> EngineError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    EngineError::Api { status, body }
}

// ============ Engine-native query types ============

#[derive(Debug, Clone)]
pub struct RawSearchParams {
    pub q: String,
    pub query_by: String,
    pub query_by_weights: String,
    pub page: i64,
    pub per_page: i64,
    pub sort_by: String,
    pub prefix: bool,
    pub num_typos: u32,
    pub filter_by: Option<String>,
}

/// The engine's native search envelope. Internal to the gateway and the
/// query layer; callers only ever see the reshaped response.
#[derive(Debug, Deserialize)]
pub struct RawSearchResponse {
    #[serde(default)]
    pub found: i64,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
pub struct RawHit {
    pub document: ServiceDocument,
    #[serde(default)]
    pub text_match: Option<u64>,
}

// ============ Collection schema ============

/// Fixed field list for the services collection. Part of the persisted-state
/// contract: changing it requires a collection migration, not an in-place
/// mutation.
pub fn collection_schema(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "fields": [
            { "name": "title", "type": "string" },
            { "name": "description", "type": "string", "optional": true },
            { "name": "category", "type": "string", "facet": true },
            { "name": "location", "type": "string", "optional": true, "facet": true },
            { "name": "capacity", "type": "string", "optional": true },
            { "name": "technical_specs", "type": "string", "optional": true },
            { "name": "supplier_id", "type": "string", "facet": true },
            { "name": "supplier_name", "type": "string", "optional": true },
            { "name": "price_per_day", "type": "float", "optional": true },
            { "name": "created_at", "type": "int64" }
        ],
        "default_sorting_field": "created_at"
    })
}

// ============ Filter expressions ============

/// Translate structured filters into the engine's boolean filter syntax.
///
/// Exact matches use the `:=` form with backtick-quoted string values;
/// price bounds use `:>=` / `:<=`. Clauses are conjoined with `&&`; absent
/// filters emit nothing, and all-absent emits `None` rather than a
/// match-everything expression. Category values are uppercased to match the
/// store's case convention for that column.
pub fn build_filter_expr(filters: &SearchFilters) -> Option<String> {
    let mut clauses = Vec::new();

    if let Some(ref category) = filters.category {
        clauses.push(format!("category:=`{}`", category.to_uppercase()));
    }
    if let Some(ref location) = filters.location {
        clauses.push(format!("location:=`{}`", location));
    }
    if let Some(min) = filters.min_price {
        clauses.push(format!("price_per_day:>={}", min));
    }
    if let Some(max) = filters.max_price {
        clauses.push(format!("price_per_day:<={}", max));
    }

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" && "))
    }
}
