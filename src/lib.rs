//! # marketsearch
//!
//! Search-index synchronization and query service for an industrial-capacity
//! rental marketplace.
//!
//! The relational store owns the canonical service rows; the search engine
//! owns ranking. This crate is the thin layer between them: it mirrors rows
//! into engine documents, mirrors the synonym table into the engine's
//! synonym store, and translates application-level queries into the engine's
//! query language — eventually consistent by design.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────────┐
//! │ Postgres │──▶│  Mapper   │──▶│ Search Engine │
//! │ services │   │ row→doc  │   │  (Typesense)  │
//! └────┬─────┘   └──────────┘   └──────┬────────┘
//!      │ synonyms                      │ hits
//!      ▼                               ▼
//! ┌──────────┐                  ┌──────────────┐
//! │ Synonym  │                  │  Query layer │
//! │   sync   │                  │ build+reshape│
//! └──────────┘                  └──────┬───────┘
//!                    ┌─────────────────┤
//!                    ▼                 ▼
//!               ┌─────────┐      ┌──────────┐
//!               │   CLI   │      │   HTTP   │
//!               │  (mks)  │      │  (axum)  │
//!               └─────────┘      └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and response envelopes |
//! | [`store`] | Relational store reads (record fetcher, synonym pairs) |
//! | [`document`] | Record-to-document projection |
//! | [`engine`] | Search engine gateway (bootstrap, upsert, delete, search, synonyms) |
//! | [`retry`] | Bounded-attempt retry policy |
//! | [`search`] | Query translation and response shaping |
//! | [`indexer`] | Index/delete/reindex flow composition |
//! | [`synonyms`] | Synonym table synchronization |
//! | [`server`] | HTTP API |

pub mod config;
pub mod document;
pub mod engine;
pub mod indexer;
pub mod models;
pub mod retry;
pub mod search;
pub mod server;
pub mod store;
pub mod synonyms;
