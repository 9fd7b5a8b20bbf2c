//! # book-search
//!
//! Federated ebook search: one free-text title is fanned out to a curated set
//! of remote repositories, file names are matched fuzzily, and the hits are
//! merged into a single deduplicated, ranked list with live progress and an
//! early stop once enough matches are in.
//!
//! ## Architecture
//!
//! ```text
//!                         ┌──────────────┐
//!                         │  User Query  │
//!                         └──────┬───────┘
//!                                │ validate (non-blank)
//!                                ▼
//!                  ┌───────────────────────────┐
//!                  │        Aggregator         │
//!                  │ one task per source, gated│
//!                  │ by a semaphore            │
//!                  └─────────────┬─────────────┘
//!           ┌────────────────────┼────────────────────┐
//!           ▼                    ▼                    ▼
//!    ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!    │ GitTree     │      │ GitTree     │      │ FlatListing │
//!    │ client      │      │ client      │      │ client      │
//!    │ (timeout,   │      │ (timeout,   │      │ (per-page   │
//!    │  cancel)    │      │  cancel)    │      │  cancel)    │
//!    └──────┬──────┘      └──────┬──────┘      └──────┬──────┘
//!           │ raw candidates → Matcher (score ≥ threshold)
//!           └────────────────────┼────────────────────┘
//!                                ▼
//!                  ┌───────────────────────────┐
//!                  │ Single-writer merge       │
//!                  │  dedup by (name, ext)     │
//!                  │  rank: score ↓, scan order│
//!                  │  progress tracker update  │
//!                  │  early stop → cancel rest │
//!                  └─────────────┬─────────────┘
//!                                ▼
//!                  ┌───────────────────────────┐
//!                  │        Result Set         │
//!                  └───────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration: sources, timeouts, limits
//! - [`models`] - Shared data types: `SourceDescriptor`, `Match`, `ScanOutcome`, snapshots
//! - [`error`] - `SearchError` (caller-visible) and `SourceError` (per source)
//! - [`sources`] - `SourceClient` trait, registry, git tree and flat listing adapters
//! - [`search::matcher`] - Normalization and fuzzy title scoring
//! - [`search::result_set`] - Deduplicated, ranked match collection
//! - [`search::progress`] - Thread-safe progress counters and snapshots
//! - [`search::aggregator`] - Concurrent fan-out, merge, failure isolation, early stop
//! - [`api`] - Axum HTTP handlers for synchronous and background searches
//! - [`state`] - Shared application state holding the aggregator and running searches

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod sources;
pub mod state;
