//! # marketsearch CLI (`mks`)
//!
//! Operational interface for the search synchronization service. Every
//! subcommand maps to one of the service's core operations, so the whole
//! flow can be driven and inspected without the HTTP surface.
//!
//! ## Usage
//!
//! ```bash
//! mks --config ./config/marketsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mks init` | Create the search collection if it is absent |
//! | `mks sync-synonyms` | Mirror the synonym table into the engine |
//! | `mks index <id>` | Fetch one service row and upsert its document |
//! | `mks delete <id>` | Remove one document from the index |
//! | `mks reindex` | Reindex every active service row |
//! | `mks search "<query>"` | Query the index |
//! | `mks suggest <prefix>` | Title typeahead |
//! | `mks serve` | Start the HTTP service |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use marketsearch::config::{self, Config};
use marketsearch::engine::{DeleteOutcome, EngineClient};
use marketsearch::indexer::{self, IndexOutcome};
use marketsearch::models::SearchFilters;
use marketsearch::retry::RetryPolicy;
use marketsearch::search;
use marketsearch::server;
use marketsearch::store::{self, PgRecordStore};
use marketsearch::synonyms;

#[derive(Parser)]
#[command(
    name = "mks",
    about = "marketsearch — search-index synchronization and query service",
    version,
    long_about = "Keeps the search engine's document set consistent with the relational \
    source of truth and translates application-level queries into the engine's query \
    language. Indexing and deletion propagate failures; search degrades gracefully."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/marketsearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the search collection if it is absent.
    ///
    /// Idempotent — running it against an existing collection is a no-op.
    /// Retries with fixed spacing while the engine comes up.
    Init,

    /// Mirror the synonym table into the engine's synonym store.
    ///
    /// Groups pairs by root word and overwrites one named set per root.
    /// Re-running with unchanged source data leaves the engine unchanged.
    SyncSynonyms,

    /// Fetch one service row and upsert its document into the index.
    ///
    /// Only active rows are indexable; a missing or inactive row reports
    /// not-found without touching the engine.
    Index { id: Uuid },

    /// Remove one document from the index.
    Delete { id: Uuid },

    /// Reindex every active service row in batches.
    Reindex,

    /// Query the index.
    Search {
        query: String,

        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long)]
        page_size: Option<i64>,

        /// Exact category match (case-insensitive).
        #[arg(long)]
        category: Option<String>,

        /// Exact location match.
        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,
    },

    /// Title suggestions for a prefix.
    Suggest {
        prefix: String,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// Start the HTTP service (bootstrap and synonym sync run first).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::SyncSynonyms => run_sync_synonyms(&config).await,
        Commands::Index { id } => run_index(&config, id).await,
        Commands::Delete { id } => run_delete(&config, id).await,
        Commands::Reindex => run_reindex(&config).await,
        Commands::Search {
            query,
            page,
            page_size,
            category,
            location,
            min_price,
            max_price,
        } => {
            let filters = SearchFilters {
                category,
                location,
                min_price,
                max_price,
            };
            run_search(&config, &query, page, page_size, filters).await
        }
        Commands::Suggest { prefix, limit } => run_suggest(&config, &prefix, limit).await,
        Commands::Serve => server::run_server(&config).await,
    }
}

fn bootstrap_policy(config: &Config) -> RetryPolicy {
    RetryPolicy::new(
        config.engine.bootstrap_max_attempts,
        Duration::from_secs(config.engine.bootstrap_retry_secs),
    )
}

async fn run_init(config: &Config) -> Result<()> {
    let engine = EngineClient::new(&config.engine)?;
    engine.bootstrap(&bootstrap_policy(config)).await?;
    println!("collection '{}' ready", engine.collection());
    Ok(())
}

async fn run_sync_synonyms(config: &Config) -> Result<()> {
    let pool = store::connect(config).await?;
    let record_store = PgRecordStore::new(pool.clone());
    let engine = EngineClient::new(&config.engine)?;

    let summary = synonyms::sync_synonyms(&record_store, &engine).await?;
    println!("synonym sync");
    println!("  groups: {}", summary.groups);
    println!("  failed: {}", summary.failed);

    pool.close().await;
    Ok(())
}

async fn run_index(config: &Config, id: Uuid) -> Result<()> {
    let pool = store::connect(config).await?;
    let record_store = PgRecordStore::new(pool.clone());
    let engine = EngineClient::new(&config.engine)?;

    let outcome = indexer::index_service(&record_store, &engine, id).await;
    pool.close().await;

    match outcome? {
        IndexOutcome::Indexed(id) => {
            println!("indexed service {}", id);
            Ok(())
        }
        IndexOutcome::NotFound => {
            eprintln!("no active service with id {}", id);
            std::process::exit(1);
        }
    }
}

async fn run_delete(config: &Config, id: Uuid) -> Result<()> {
    let engine = EngineClient::new(&config.engine)?;

    match indexer::remove_service(&engine, id).await? {
        DeleteOutcome::Deleted => {
            println!("removed service {} from index", id);
            Ok(())
        }
        DeleteOutcome::NotFound => {
            println!("service {} was not indexed; nothing to remove", id);
            Ok(())
        }
    }
}

async fn run_reindex(config: &Config) -> Result<()> {
    let pool = store::connect(config).await?;
    let record_store = PgRecordStore::new(pool.clone());
    let engine = EngineClient::new(&config.engine)?;

    engine.bootstrap(&bootstrap_policy(config)).await?;
    let summary = indexer::reindex_all(&record_store, &engine).await;
    pool.close().await;

    let summary = summary?;
    println!("reindex");
    println!("  indexed: {}", summary.indexed);
    println!("  failed:  {}", summary.failed);
    Ok(())
}

async fn run_search(
    config: &Config,
    query: &str,
    page: i64,
    page_size: Option<i64>,
    filters: SearchFilters,
) -> Result<()> {
    let engine = EngineClient::new(&config.engine)?;

    let response =
        search::search_services(&engine, config, query, Some(page), page_size, &filters).await;

    println!(
        "query: \"{}\" — {} found, page {}",
        response.query, response.total, response.page
    );
    for (i, hit) in response.results.iter().enumerate() {
        let doc = &hit.document;
        println!("{}. {} [{}]", i + 1, doc.title, doc.category);
        if !doc.location.is_empty() {
            println!("    location: {}", doc.location);
        }
        if doc.price_per_day > 0.0 {
            println!("    price/day: {}", doc.price_per_day);
        }
        println!("    id: {}", doc.id);
    }

    Ok(())
}

async fn run_suggest(config: &Config, prefix: &str, limit: Option<i64>) -> Result<()> {
    let engine = EngineClient::new(&config.engine)?;

    let response = search::suggest_titles(&engine, config, prefix, limit).await;
    for suggestion in &response.suggestions {
        println!("{}", suggestion);
    }

    Ok(())
}
