//! # Catalog Sync Module
//!
//! Mirrors a paginated remote media catalog into the local catalog store.
//!
//! ## Overview
//!
//! This module manages the lifecycle of sync runs, including:
//! - Fetching every paginated listing page by page, resuming from durable cursors
//! - Running page chains concurrently under one bounded scheduler per run
//! - Persisting records and relation sets through idempotent upserts
//! - Isolating failures so one broken listing does not stop its siblings
//! - Reporting progress through callbacks and the event bus
//!
//! ## Components
//!
//! - **Task Scheduler** (`scheduler`): bounded-concurrency queue with recursive submission and drain
//! - **Fetch Tasks** (`fetch`): one page of one listing as a value, returning its continuation
//! - **Catalog Store** (`store`): persistence seam over the `core-library` repositories
//! - **Progress** (`progress`): run-wide counters and snapshots
//! - **Sync Run State Machine** (`run`): run lifecycle with validated phase transitions
//! - **Repository** (`repository`): database persistence for run history
//! - **Sync Engine** (`engine`): orchestrates the basic, dependent and enrichment phases

pub mod engine;
pub mod error;
pub mod fetch;
pub mod progress;
pub mod records;
pub mod repository;
pub mod run;
pub mod scheduler;
pub mod store;

pub use engine::{SyncConfig, SyncEngine};
pub use error::{Result, SyncError};
pub use fetch::{EnrichmentFetch, PageFetch, PageOutcome};
pub use progress::{KindProgress, ProgressCallback, ProgressSnapshot, ProgressTracker};
pub use records::RecordBatch;
pub use repository::{SqliteSyncRunRepository, SyncRunRepository};
pub use run::{SyncPhase, SyncRun, SyncRunId};
pub use scheduler::{CompletionHook, SchedulerStats, TaskFailure, TaskScheduler};
pub use store::{CatalogStore, Relation, SqliteCatalogStore};
