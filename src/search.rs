//! Query translation and response shaping.
//!
//! Builds the engine-native search request from an application-level query
//! (free text + structured filters + pagination) and reshapes the engine's
//! envelope into the stable public one. Search is availability-critical:
//! any engine-side failure degrades to an empty result set with an error
//! log, never a failed request.

use std::collections::HashSet;

use crate::config::Config;
use crate::engine::{build_filter_expr, EngineClient, RawSearchParams, RawSearchResponse};
use crate::models::{SearchFilters, SearchHit, SearchResponse, SuggestResponse};

/// Relevance priority across fields: title matches outrank supplier name,
/// then description, then technical specs.
const QUERY_BY: &str = "title,supplier_name,description,technical_specs";
const QUERY_BY_WEIGHTS: &str = "8,4,2,1";

/// Score first; among equals, newer records first.
const SORT_BY: &str = "_text_match:desc,created_at:desc";

pub async fn search_services(
    engine: &EngineClient,
    config: &Config,
    query: &str,
    page: Option<i64>,
    page_size: Option<i64>,
    filters: &SearchFilters,
) -> SearchResponse {
    let page = page.unwrap_or(1).max(1);
    let per_page = page_size
        .unwrap_or(config.search.default_page_size)
        .clamp(1, config.search.max_page_size);

    let params = RawSearchParams {
        q: query.to_string(),
        query_by: QUERY_BY.to_string(),
        query_by_weights: QUERY_BY_WEIGHTS.to_string(),
        page,
        per_page,
        sort_by: SORT_BY.to_string(),
        prefix: true,
        num_typos: config.search.num_typos,
        filter_by: build_filter_expr(filters),
    };

    match engine.raw_search(&params).await {
        Ok(raw) => reshape(query, raw),
        Err(err) => {
            tracing::error!(query, error = %err, "search degraded: engine request failed");
            SearchResponse::empty(query)
        }
    }
}

fn reshape(query: &str, raw: RawSearchResponse) -> SearchResponse {
    SearchResponse {
        query: query.to_string(),
        total: raw.found,
        page: if raw.page > 0 { raw.page } else { 1 },
        results: raw
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                document: hit.document,
                text_match: hit.text_match,
            })
            .collect(),
    }
}

/// Typeahead over titles: prefix search, then distinct titles in rank order.
/// Best-effort — engine failures yield empty suggestions, never an error.
pub async fn suggest_titles(
    engine: &EngineClient,
    config: &Config,
    prefix: &str,
    limit: Option<i64>,
) -> SuggestResponse {
    let limit = limit
        .unwrap_or(config.search.suggest_limit)
        .clamp(1, config.search.max_page_size);

    let params = RawSearchParams {
        q: prefix.to_string(),
        query_by: "title".to_string(),
        query_by_weights: "1".to_string(),
        page: 1,
        // Over-fetch so deduplication can still fill the limit
        per_page: (limit * 2).min(config.search.max_page_size),
        sort_by: SORT_BY.to_string(),
        prefix: true,
        num_typos: config.search.num_typos,
        filter_by: None,
    };

    let suggestions = match engine.raw_search(&params).await {
        Ok(raw) => distinct_titles(raw, limit as usize),
        Err(err) => {
            tracing::error!(prefix, error = %err, "suggest degraded: engine request failed");
            Vec::new()
        }
    };

    SuggestResponse {
        query: prefix.to_string(),
        suggestions,
    }
}

/// Deduplicate by case-folded title, keeping the first raw spelling in rank
/// order.
fn distinct_titles(raw: RawSearchResponse, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut titles = Vec::new();

    for hit in raw.hits {
        let title = hit.document.title.trim();
        if title.is_empty() {
            continue;
        }
        if seen.insert(title.to_lowercase()) {
            titles.push(title.to_string());
            if titles.len() == limit {
                break;
            }
        }
    }

    titles
}
