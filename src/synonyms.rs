//! Synonym synchronization.
//!
//! Mirrors the store's synonym table into the engine: pairs are grouped by
//! root word, each group includes the root itself (so querying the root
//! benefits from the expansion symmetrically), and each group is pushed as
//! a full overwrite under the deterministic key `synonym-<root>`. Replaying
//! the sync yields the same engine state.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

use crate::engine::EngineClient;
use crate::models::SynonymPair;
use crate::store::RecordStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub groups: usize,
    pub failed: usize,
}

pub fn synonym_key(root: &str) -> String {
    format!("synonym-{root}")
}

/// Group pairs by root word into sets that include the root. Ordered maps
/// and sets keep the sweep deterministic and collapse duplicate pairs.
pub fn group_synonyms(pairs: &[SynonymPair]) -> BTreeMap<String, BTreeSet<String>> {
    let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for pair in pairs {
        let members = groups.entry(pair.word.clone()).or_default();
        members.insert(pair.word.clone());
        members.insert(pair.synonym.clone());
    }

    groups
}

/// Read all synonym pairs and upsert one named set per root word.
///
/// Per-group failures are logged at error severity and counted; they never
/// abort the sweep. Callers running this at startup treat any error from
/// this function as non-fatal — search stays usable without synonym
/// expansion, just degraded.
pub async fn sync_synonyms(
    store: &dyn RecordStore,
    engine: &EngineClient,
) -> Result<SyncSummary> {
    let pairs = store.fetch_synonym_pairs().await?;
    if pairs.is_empty() {
        tracing::info!("no synonym pairs in the store; skipping sync");
        return Ok(SyncSummary::default());
    }

    let groups = group_synonyms(&pairs);
    tracing::info!(
        pairs = pairs.len(),
        groups = groups.len(),
        "synchronizing synonym sets"
    );

    let mut summary = SyncSummary {
        groups: groups.len(),
        failed: 0,
    };

    for (root, members) in &groups {
        let members: Vec<String> = members.iter().cloned().collect();
        if let Err(err) = engine.upsert_synonym_set(&synonym_key(root), &members).await {
            summary.failed += 1;
            tracing::error!(root = %root, error = %err, "synonym set upsert failed");
        }
    }

    Ok(summary)
}
