//! Gateway and flow tests against a fake search engine.
//!
//! The engine is faked with wiremock; the relational store with an
//! in-memory [`RecordStore`] implementation. Together they exercise the
//! full indexing and query flows without external services.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use marketsearch::config::{parse_config, Config};
use marketsearch::engine::{DeleteOutcome, EngineClient, EngineError};
use marketsearch::indexer::{self, IndexOutcome};
use marketsearch::models::{SearchFilters, ServiceRecord, SynonymPair};
use marketsearch::retry::RetryPolicy;
use marketsearch::search;
use marketsearch::store::RecordStore;
use marketsearch::synonyms;

fn test_config(engine_url: &str) -> Config {
    parse_config(&format!(
        r#"
[database]
url = "postgres://localhost/market_test"

[engine]
url = "{engine_url}"
api_key = "test-key"
"#
    ))
    .unwrap()
}

fn engine_for(server: &MockServer) -> EngineClient {
    EngineClient::new(&test_config(&server.uri()).engine).unwrap()
}

fn no_retry() -> RetryPolicy {
    RetryPolicy::new(1, Duration::ZERO)
}

fn record(id: Uuid, title: &str) -> ServiceRecord {
    ServiceRecord {
        id,
        title: title.to_string(),
        description: Some("Universal machine".to_string()),
        category: "CONSTRUCTION".to_string(),
        location: Some("Yekaterinburg".to_string()),
        price_per_day: Some(150.0),
        capacity: None,
        technical_specs: None,
        supplier_id: Uuid::nil(),
        supplier_name: Some("Acme Rentals".to_string()),
        created_at: Some("2024-01-01T00:00:00Z".to_string()),
    }
}

struct FakeStore {
    services: Vec<ServiceRecord>,
    pairs: Vec<SynonymPair>,
}

impl FakeStore {
    fn empty() -> Self {
        Self {
            services: Vec::new(),
            pairs: Vec::new(),
        }
    }

    fn with_services(services: Vec<ServiceRecord>) -> Self {
        Self {
            services,
            pairs: Vec::new(),
        }
    }

    fn with_pairs(pairs: Vec<SynonymPair>) -> Self {
        Self {
            services: Vec::new(),
            pairs,
        }
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn fetch_service(&self, id: Uuid) -> Result<Option<ServiceRecord>> {
        Ok(self.services.iter().find(|r| r.id == id).cloned())
    }

    async fn fetch_active_services(&self, limit: i64, offset: i64) -> Result<Vec<ServiceRecord>> {
        Ok(self
            .services
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_synonym_pairs(&self) -> Result<Vec<SynonymPair>> {
        Ok(self.pairs.clone())
    }
}

fn pair(word: &str, synonym: &str) -> SynonymPair {
    SynonymPair {
        word: word.to_string(),
        synonym: synonym.to_string(),
    }
}

// ============ Bootstrap ============

#[tokio::test]
async fn test_bootstrap_creates_missing_collection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/services"))
        .and(header("X-TYPESENSE-API-KEY", "test-key"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "name": "services"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    engine.bootstrap(&no_retry()).await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_skips_existing_collection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "services",
            "num_documents": 12
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    engine.bootstrap(&no_retry()).await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_retries_transient_failures() {
    let server = MockServer::start().await;

    // Two failing probes while the engine "comes up", then success
    Mock::given(method("GET"))
        .and(path("/collections/services"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/collections/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "services"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let policy = RetryPolicy::new(3, Duration::ZERO);
    engine.bootstrap(&policy).await.unwrap();
}

#[tokio::test]
async fn test_bootstrap_exhaustion_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/services"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let policy = RetryPolicy::new(2, Duration::ZERO);
    let err = engine.bootstrap(&policy).await.unwrap_err();
    assert!(matches!(err, EngineError::Api { status: 503, .. }));
}

// ============ Upsert / delete ============

#[tokio::test]
async fn test_upsert_sends_document_with_api_key() {
    let server = MockServer::start().await;

    let id = Uuid::nil();
    let doc = marketsearch::document::to_document(&record(id, "Crane rental"));

    Mock::given(method("POST"))
        .and(path("/collections/services/documents"))
        .and(query_param("action", "upsert"))
        .and(header("X-TYPESENSE-API-KEY", "test-key"))
        .and(body_json(serde_json::json!({
            "id": id.to_string(),
            "title": "Crane rental",
            "description": "Universal machine",
            "category": "CONSTRUCTION",
            "location": "Yekaterinburg",
            "capacity": "",
            "technical_specs": "",
            "supplier_id": Uuid::nil().to_string(),
            "supplier_name": "Acme Rentals",
            "price_per_day": 150.0,
            "created_at": 1704067200i64
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    engine.upsert_document(&doc).await.unwrap();
}

#[tokio::test]
async fn test_upsert_validation_never_reaches_engine() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let mut doc = marketsearch::document::to_document(&record(Uuid::nil(), "Crane rental"));
    doc.title = String::new();

    assert!(matches!(
        engine.upsert_document(&doc).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn test_delete_absent_document_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/collections/services/documents/42"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "message": "Could not find a document with id: 42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let outcome = engine.delete_document("42").await.unwrap();
    assert_eq!(outcome, DeleteOutcome::NotFound);
}

#[tokio::test]
async fn test_delete_existing_document() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/collections/services/documents/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let outcome = engine.delete_document("42").await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
}

// ============ Search ============

fn search_hit(id: &str, title: &str, text_match: u64) -> serde_json::Value {
    serde_json::json!({
        "document": {
            "id": id,
            "title": title,
            "description": "",
            "category": "CONSTRUCTION",
            "location": "",
            "capacity": "",
            "technical_specs": "",
            "supplier_id": "0",
            "supplier_name": "",
            "price_per_day": 150.0,
            "created_at": 1704067200i64
        },
        "text_match": text_match
    })
}

#[tokio::test]
async fn test_search_translates_query_and_reshapes() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());

    Mock::given(method("GET"))
        .and(path("/collections/services/documents/search"))
        .and(query_param("q", "crane"))
        .and(query_param(
            "query_by",
            "title,supplier_name,description,technical_specs",
        ))
        .and(query_param("query_by_weights", "8,4,2,1"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "20"))
        .and(query_param("sort_by", "_text_match:desc,created_at:desc"))
        .and(query_param("prefix", "true"))
        .and(query_param("num_typos", "2"))
        .and(query_param(
            "filter_by",
            "category:=`SOLAR` && price_per_day:>=10 && price_per_day:<=50",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "found": 3,
            "page": 1,
            "hits": [
                search_hit("1", "Crane rental", 300),
                search_hit("2", "Crane operator", 200),
                search_hit("3", "Mobile crane", 100)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let filters = SearchFilters {
        category: Some("solar".to_string()),
        location: None,
        min_price: Some(10.0),
        max_price: Some(50.0),
    };

    let response =
        search::search_services(&engine, &config, "crane", Some(1), None, &filters).await;

    assert_eq!(response.query, "crane");
    assert_eq!(response.total, 3);
    assert_eq!(response.page, 1);
    assert_eq!(response.results.len(), 3);
    assert_eq!(response.results[0].document.title, "Crane rental");
    assert_eq!(response.results[0].text_match, Some(300));
}

#[tokio::test]
async fn test_search_omits_filter_param_when_no_filters() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());

    // Requests carrying filter_by do not match this mock; an unfiltered
    // query must still hit it
    Mock::given(method("GET"))
        .and(path("/collections/services/documents/search"))
        .and(query_param("q", "crane"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "found": 0,
            "page": 1,
            "hits": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let response = search::search_services(
        &engine,
        &config,
        "crane",
        None,
        None,
        &SearchFilters::default(),
    )
    .await;

    assert_eq!(response.total, 0);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].url.query().unwrap_or("").contains("filter_by"));
}

#[tokio::test]
async fn test_search_degrades_to_empty_on_engine_error() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());

    Mock::given(method("GET"))
        .and(path("/collections/services/documents/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let response = search::search_services(
        &engine,
        &config,
        "crane",
        Some(3),
        None,
        &SearchFilters::default(),
    )
    .await;

    assert_eq!(response.query, "crane");
    assert_eq!(response.total, 0);
    assert_eq!(response.page, 1);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_suggest_returns_distinct_titles() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());

    Mock::given(method("GET"))
        .and(path("/collections/services/documents/search"))
        .and(query_param("query_by", "title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "found": 3,
            "page": 1,
            "hits": [
                search_hit("1", "Crane rental", 300),
                search_hit("2", "CRANE RENTAL", 200),
                search_hit("3", "Crane operator", 100)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let response = search::suggest_titles(&engine, &config, "cra", None).await;

    assert_eq!(response.query, "cra");
    assert_eq!(response.suggestions, vec!["Crane rental", "Crane operator"]);
}

#[tokio::test]
async fn test_suggest_degrades_to_empty_on_engine_error() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());

    Mock::given(method("GET"))
        .and(path("/collections/services/documents/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let response = search::suggest_titles(&engine, &config, "cra", None).await;
    assert!(response.suggestions.is_empty());
}

// ============ Indexing flow ============

#[tokio::test]
async fn test_index_service_maps_and_upserts() {
    let server = MockServer::start().await;

    let id = Uuid::new_v4();
    let store = FakeStore::with_services(vec![record(id, "Crane rental")]);

    Mock::given(method("POST"))
        .and(path("/collections/services/documents"))
        .and(query_param("action", "upsert"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let outcome = indexer::index_service(&store, &engine, id).await.unwrap();
    assert_eq!(outcome, IndexOutcome::Indexed(id.to_string()));
}

#[tokio::test]
async fn test_index_missing_service_skips_engine() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let store = FakeStore::empty();
    let outcome = indexer::index_service(&store, &engine, Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(outcome, IndexOutcome::NotFound);
}

#[tokio::test]
async fn test_reindex_sweeps_all_active_services() {
    let server = MockServer::start().await;

    let store = FakeStore::with_services(vec![
        record(Uuid::new_v4(), "Crane rental"),
        record(Uuid::new_v4(), "Lathe rental"),
        record(Uuid::new_v4(), "Excavator rental"),
    ]);

    Mock::given(method("POST"))
        .and(path("/collections/services/documents"))
        .and(query_param("action", "upsert"))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let summary = indexer::reindex_all(&store, &engine).await.unwrap();
    assert_eq!(summary.indexed, 3);
    assert_eq!(summary.failed, 0);
}

// ============ Synonym sync ============

#[tokio::test]
async fn test_sync_synonyms_overwrites_named_sets() {
    let server = MockServer::start().await;

    let store = FakeStore::with_pairs(vec![
        pair("tractor", "mtz"),
        pair("tractor", "belarus"),
        pair("lathe", "cnc"),
    ]);

    Mock::given(method("PUT"))
        .and(path("/collections/services/synonyms/synonym-tractor"))
        .and(header("X-TYPESENSE-API-KEY", "test-key"))
        .and(body_json(serde_json::json!({
            "synonyms": ["belarus", "mtz", "tractor"]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/services/synonyms/synonym-lathe"))
        .and(body_json(serde_json::json!({
            "synonyms": ["cnc", "lathe"]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let summary = synonyms::sync_synonyms(&store, &engine).await.unwrap();
    assert_eq!(summary.groups, 2);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_sync_synonyms_counts_failed_groups() {
    let server = MockServer::start().await;

    let store = FakeStore::with_pairs(vec![pair("tractor", "mtz"), pair("lathe", "cnc")]);

    Mock::given(method("PUT"))
        .and(path("/collections/services/synonyms/synonym-lathe"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/services/synonyms/synonym-tractor"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let summary = synonyms::sync_synonyms(&store, &engine).await.unwrap();
    assert_eq!(summary.groups, 2);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_sync_synonyms_with_empty_table_is_noop() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let summary = synonyms::sync_synonyms(&FakeStore::empty(), &engine)
        .await
        .unwrap();
    assert_eq!(summary.groups, 0);
    assert_eq!(summary.failed, 0);
}
