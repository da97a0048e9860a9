//! Relational store access.
//!
//! The store is the source of truth; this module exposes the two read paths
//! the synchronization layer needs — fetch one active service row, and fetch
//! the full synonym table. The [`RecordStore`] trait is the seam for
//! substituting fakes in tests.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{ServiceRecord, SynonymPair};

pub async fn connect(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(&config.database.url)
        .await?;

    Ok(pool)
}

/// Read operations required from the relational store.
///
/// A missing or inactive row is `Ok(None)` — never an error and never a
/// partial record. An unreachable store is an `Err`, so callers can tell a
/// 404-equivalent apart from an infrastructure failure.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one service row by id, filtered to `active = TRUE` server-side
    /// so a record mid-deactivation is never indexed.
    async fn fetch_service(&self, id: Uuid) -> Result<Option<ServiceRecord>>;

    /// Fetch a page of active service rows for bulk reindexing, ordered by id.
    async fn fetch_active_services(&self, limit: i64, offset: i64) -> Result<Vec<ServiceRecord>>;

    /// Fetch every `(word, synonym)` pair, ordered by word.
    async fn fetch_synonym_pairs(&self) -> Result<Vec<SynonymPair>>;
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SERVICE_COLUMNS: &str = "id, title, description, category, location, \
     price_per_day::float8 AS price_per_day, capacity, technical_specs, \
     supplier_id, supplier_name, created_at";

fn record_from_row(row: &sqlx::postgres::PgRow) -> ServiceRecord {
    let created_at: Option<chrono::DateTime<chrono::Utc>> = row.get("created_at");

    ServiceRecord {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        category: row.get("category"),
        location: row.get("location"),
        price_per_day: row.get("price_per_day"),
        capacity: row.get("capacity"),
        technical_specs: row.get("technical_specs"),
        supplier_id: row.get("supplier_id"),
        supplier_name: row.get("supplier_name"),
        created_at: created_at.map(|dt| dt.to_rfc3339()),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch_service(&self, id: Uuid) -> Result<Option<ServiceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1 AND active = TRUE"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn fetch_active_services(&self, limit: i64, offset: i64) -> Result<Vec<ServiceRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE active = TRUE \
             ORDER BY id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn fetch_synonym_pairs(&self) -> Result<Vec<SynonymPair>> {
        let rows = sqlx::query("SELECT word, synonym FROM synonyms ORDER BY word, synonym")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| SynonymPair {
                word: row.get("word"),
                synonym: row.get("synonym"),
            })
            .collect())
    }
}
