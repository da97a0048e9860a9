//! Indexing flow composition: store → mapper → engine.
//!
//! Indexing and deletion are consistency-critical, so store and engine
//! failures propagate to the caller here — unlike the query path, which
//! degrades. A missing or inactive record is an outcome, not an error.

use anyhow::Result;
use uuid::Uuid;

use crate::document::to_document;
use crate::engine::{DeleteOutcome, EngineClient};
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Document upserted under this engine key.
    Indexed(String),
    /// Record missing or inactive; nothing was sent to the engine.
    NotFound,
}

/// Fetch the authoritative row, project it, and upsert the document.
pub async fn index_service(
    store: &dyn RecordStore,
    engine: &EngineClient,
    id: Uuid,
) -> Result<IndexOutcome> {
    let record = match store.fetch_service(id).await? {
        Some(record) => record,
        None => return Ok(IndexOutcome::NotFound),
    };

    let document = to_document(&record);
    engine.upsert_document(&document).await?;
    tracing::info!(id = %document.id, "service indexed");

    Ok(IndexOutcome::Indexed(document.id))
}

/// Remove one document from the index. Deleting an id that was never
/// indexed reports [`DeleteOutcome::NotFound`].
pub async fn remove_service(engine: &EngineClient, id: Uuid) -> Result<DeleteOutcome> {
    let outcome = engine.delete_document(&id.to_string()).await?;
    if outcome == DeleteOutcome::Deleted {
        tracing::info!(%id, "service removed from index");
    }
    Ok(outcome)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReindexSummary {
    pub indexed: u64,
    pub failed: u64,
}

/// Sweep every active record into the index in batches. Per-record upsert
/// failures are logged and counted rather than aborting the sweep; a store
/// failure mid-sweep still propagates.
pub async fn reindex_all(
    store: &dyn RecordStore,
    engine: &EngineClient,
) -> Result<ReindexSummary> {
    const BATCH: i64 = 500;

    let mut summary = ReindexSummary::default();
    let mut offset = 0i64;

    loop {
        let records = store.fetch_active_services(BATCH, offset).await?;
        if records.is_empty() {
            break;
        }
        offset += records.len() as i64;

        for record in &records {
            let document = to_document(record);
            match engine.upsert_document(&document).await {
                Ok(()) => summary.indexed += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(id = %document.id, error = %err, "reindex upsert failed");
                }
            }
        }
    }

    tracing::info!(
        indexed = summary.indexed,
        failed = summary.failed,
        "reindex sweep complete"
    );

    Ok(summary)
}
