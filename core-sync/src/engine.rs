//! # Sync Engine
//!
//! Mirrors a remote catalog into the local store, one tier at a time.
//!
//! ## Workflow
//!
//! 1. **Basic**: read the cursor of each top-level listing (artists, albums,
//!    playlists) and start one page chain per listing that is not complete.
//! 2. **Dependent**: enumerate stored albums and playlists and start one
//!    track-listing chain per parent whose cursor is not complete.
//! 3. **Enrichment**: request similar albums and lyrics for the first
//!    `enrichment_limit` albums and tracks. Failures are logged and skipped.
//! 4. **Done**: return the final [`ProgressSnapshot`].
//!
//! Every phase submits its chains to one [`TaskScheduler`] per run and waits
//! for it to drain. A failing chain never stops its siblings; the first fatal
//! error fails the run once the phase has drained. This includes errors while
//! a phase is being started: chains already submitted still run to the end
//! before the run is reported failed. Re-running resumes from the stored
//! cursors.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SqliteCatalogStore, SyncConfig, SyncEngine};
//!
//! let store = Arc::new(SqliteCatalogStore::new(pool.clone()).with_event_bus(bus.clone()));
//! let engine = SyncEngine::new(store, bus);
//!
//! let snapshot = engine
//!     .run_sync("home-server", driver, SyncConfig::default())
//!     .await?;
//! println!("fetched {} records", snapshot.total_fetched());
//! ```

use crate::fetch::{EnrichmentFetch, PageFetch};
use crate::progress::{ProgressCallback, ProgressSnapshot, ProgressTracker};
use crate::repository::SyncRunRepository;
use crate::run::{SyncPhase, SyncRun, SyncRunId};
use crate::scheduler::{CompletionHook, SchedulerStats, TaskScheduler};
use crate::store::CatalogStore;
use crate::{Result, SyncError};
use bridge_traits::catalog::CatalogSource;
use core_library::{EntityKind, EntityTier, SyncCursor};
use core_runtime::config::{SyncSettings, MAX_CONCURRENCY, MAX_PAGE_SIZE};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Per-run engine configuration
#[derive(Clone)]
pub struct SyncConfig {
    /// Maximum number of fetch tasks running at once
    pub concurrency: usize,
    /// Records requested per page, fixed for the whole run
    pub page_size: u32,
    pub include_dependents: bool,
    pub include_enrichment: bool,
    /// Albums and tracks considered for enrichment
    pub enrichment_limit: u32,
    /// Invoked with a fresh snapshot after every progress update
    pub on_progress: Option<ProgressCallback>,
}

impl SyncConfig {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            page_size: settings.page_size,
            include_dependents: settings.include_dependents,
            include_enrichment: settings.include_enrichment,
            enrichment_limit: settings.enrichment_limit,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Check the same bounds `SyncSettings` enforces
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(SyncError::InvalidInput {
                field: "concurrency".to_string(),
                message: format!("must be between 1 and {}", MAX_CONCURRENCY),
            });
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::InvalidInput {
                field: "page_size".to_string(),
                message: format!("must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("concurrency", &self.concurrency)
            .field("page_size", &self.page_size)
            .field("include_dependents", &self.include_dependents)
            .field("include_enrichment", &self.include_enrichment)
            .field("enrichment_limit", &self.enrichment_limit)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

// ============================================================================
// Run state
// ============================================================================

#[derive(Clone)]
struct ActiveSync {
    run_id: SyncRunId,
    scheduler: TaskScheduler,
    cancellation_token: CancellationToken,
}

/// Everything a fetch task needs, shared by all tasks of one run.
struct RunContext {
    source_id: String,
    driver: Arc<dyn CatalogSource>,
    store: Arc<dyn CatalogStore>,
    scheduler: TaskScheduler,
    tracker: Arc<ProgressTracker>,
    cancellation_token: CancellationToken,
    page_size: u32,
    enrichment_limit: u32,
}

impl RunContext {
    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}

/// Submit one page of a chain. Its continuation is submitted by the task
/// itself once the page is persisted.
fn submit_page(ctx: Arc<RunContext>, task: PageFetch) {
    let scheduler = ctx.scheduler.clone();

    scheduler.submit(task.label(), async move {
        ctx.check_cancelled()?;
        let kind = task.kind;

        match task.execute(ctx.driver.as_ref(), ctx.store.as_ref()).await {
            Ok(outcome) => {
                if outcome.fetched > 0 {
                    ctx.tracker.record_page(kind, outcome.fetched, outcome.written);
                }
                match outcome.next {
                    Some(next) => submit_page(Arc::clone(&ctx), next),
                    None if kind.tier() == EntityTier::Basic => ctx.tracker.mark_complete(kind),
                    None => {}
                }
                Ok(())
            }
            Err(SyncError::NotFound(what)) if kind.tier() == EntityTier::Dependent => {
                warn!(
                    source_id = %task.source_id,
                    kind = %kind,
                    parent_id = ?task.parent_id,
                    "Parent vanished, skipping: {}",
                    what
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    source_id = %task.source_id,
                    kind = %kind,
                    parent_id = ?task.parent_id,
                    offset = task.offset,
                    error = %e,
                    "Page fetch failed"
                );
                ctx.tracker.record_error(kind, e.to_string());
                Err(e)
            }
        }
    });
}

/// Submit one enrichment request. Errors are recorded and swallowed.
fn submit_enrichment(ctx: Arc<RunContext>, task: EnrichmentFetch) {
    let scheduler = ctx.scheduler.clone();

    scheduler.submit(task.label(), async move {
        ctx.check_cancelled()?;
        let kind = task.kind;

        match task.execute(ctx.driver.as_ref(), ctx.store.as_ref()).await {
            Ok(outcome) => {
                ctx.tracker.record_page(kind, outcome.fetched, outcome.written);
            }
            Err(e) => {
                warn!(
                    source_id = %task.source_id,
                    kind = %kind,
                    parent_id = %task.parent_id,
                    error = %e,
                    "Enrichment failed, skipping"
                );
                ctx.tracker.record_error(kind, e.to_string());
            }
        }
        Ok(())
    });
}

/// Record a kind that could not be started and keep the first such error.
fn setup_failed(
    ctx: &RunContext,
    kind: EntityKind,
    error: SyncError,
    first_error: &mut Option<SyncError>,
) {
    error!(
        source_id = %ctx.source_id,
        kind = %kind,
        error = %error,
        "Could not start listing"
    );
    ctx.tracker.record_error(kind, error.to_string());
    first_error.get_or_insert(error);
}

fn advance(run: &mut SyncRun, phase: SyncPhase) -> Result<()> {
    *run = run.clone().enter(phase)?;
    Ok(())
}

// ============================================================================
// Engine
// ============================================================================

/// Orchestrates sync runs. One run per source at a time.
pub struct SyncEngine {
    store: Arc<dyn CatalogStore>,
    event_bus: EventBus,
    run_repository: Option<Arc<dyn SyncRunRepository>>,
    active_syncs: Arc<Mutex<HashMap<String, ActiveSync>>>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn CatalogStore>, event_bus: EventBus) -> Self {
        Self {
            store,
            event_bus,
            run_repository: None,
            active_syncs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Persist run history through `repository`
    pub fn with_run_repository(mut self, repository: Arc<dyn SyncRunRepository>) -> Self {
        self.run_repository = Some(repository);
        self
    }

    pub fn store(&self) -> Arc<dyn CatalogStore> {
        Arc::clone(&self.store)
    }

    /// Run a sync for `source_id` to completion.
    ///
    /// # Returns
    ///
    /// The final progress snapshot once the run reaches `Done`. Enrichment
    /// errors show up in the snapshot but do not fail the run.
    ///
    /// # Errors
    ///
    /// - `SyncInProgress` if a run for this source is already active
    /// - `Cancelled` if [`cancel`](Self::cancel) was called during the run
    /// - the first fatal basic or dependent error otherwise
    #[instrument(skip(self, driver, config), fields(source_id = %source_id))]
    pub async fn run_sync(
        &self,
        source_id: &str,
        driver: Arc<dyn CatalogSource>,
        config: SyncConfig,
    ) -> Result<ProgressSnapshot> {
        if source_id.trim().is_empty() {
            return Err(SyncError::InvalidInput {
                field: "source_id".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        config.validate()?;

        let run = SyncRun::new(source_id);
        let tracker = Arc::new(ProgressTracker::new(config.on_progress.clone()));
        let report: CompletionHook = {
            let tracker = Arc::clone(&tracker);
            Arc::new(move |stats: SchedulerStats| tracker.set_scheduler(stats))
        };
        let scheduler = TaskScheduler::with_completion_hook(config.concurrency, report);
        let cancellation_token = CancellationToken::new();

        {
            let mut active_syncs = self.active_syncs.lock().await;
            if active_syncs.contains_key(source_id) {
                return Err(SyncError::SyncInProgress {
                    source_id: source_id.to_string(),
                });
            }
            active_syncs.insert(
                source_id.to_string(),
                ActiveSync {
                    run_id: run.id,
                    scheduler: scheduler.clone(),
                    cancellation_token: cancellation_token.clone(),
                },
            );
        }

        let ctx = Arc::new(RunContext {
            source_id: source_id.to_string(),
            driver,
            store: Arc::clone(&self.store),
            scheduler,
            tracker,
            cancellation_token,
            page_size: config.page_size,
            enrichment_limit: config.enrichment_limit,
        });

        let result = self.execute_run(&ctx, run, &config).await;

        {
            let mut active_syncs = self.active_syncs.lock().await;
            active_syncs.remove(source_id);
        }

        result
    }

    async fn execute_run(
        &self,
        ctx: &Arc<RunContext>,
        mut run: SyncRun,
        config: &SyncConfig,
    ) -> Result<ProgressSnapshot> {
        if let Some(repository) = &self.run_repository {
            repository.insert(&run).await?;
        }

        self.emit(SyncEvent::Started {
            run_id: run.id.to_string(),
            source_id: ctx.source_id.clone(),
        });
        info!(
            source_id = %ctx.source_id,
            run_id = %run.id,
            concurrency = config.concurrency,
            page_size = config.page_size,
            "Sync started"
        );

        let outcome = self.execute_phases(ctx, &mut run, config).await;

        let snapshot = ctx.tracker.snapshot();
        run.record_totals(snapshot.total_fetched(), snapshot.total_inserted());

        match outcome {
            Ok(()) => {
                let run = run.complete()?;
                ctx.tracker.set_phase(SyncPhase::Done);
                self.save_run(&run).await;

                self.emit(SyncEvent::Completed {
                    run_id: run.id.to_string(),
                    source_id: ctx.source_id.clone(),
                    items_fetched: run.items_fetched,
                    items_written: run.items_written,
                    duration_secs: run.duration_secs().unwrap_or(0),
                });
                info!(
                    source_id = %ctx.source_id,
                    run_id = %run.id,
                    items_fetched = run.items_fetched,
                    items_written = run.items_written,
                    "Sync completed"
                );

                Ok(ctx.tracker.snapshot())
            }
            Err(SyncError::Cancelled) => {
                if let Ok(cancelled) = run.clone().cancel() {
                    run = cancelled;
                }
                ctx.tracker.set_phase(SyncPhase::Cancelled);
                self.save_run(&run).await;

                self.emit(SyncEvent::Cancelled {
                    run_id: run.id.to_string(),
                    source_id: ctx.source_id.clone(),
                });
                info!(source_id = %ctx.source_id, run_id = %run.id, "Sync cancelled");

                Err(SyncError::Cancelled)
            }
            Err(e) => {
                match run.clone().fail(e.to_string()) {
                    Ok(failed) => run = failed,
                    Err(transition) => {
                        warn!(run_id = %run.id, error = %transition, "Could not mark run failed")
                    }
                }
                ctx.tracker.set_phase(SyncPhase::Failed);
                self.save_run(&run).await;

                self.emit(SyncEvent::Failed {
                    run_id: run.id.to_string(),
                    source_id: ctx.source_id.clone(),
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                error!(
                    source_id = %ctx.source_id,
                    run_id = %run.id,
                    error = %e,
                    "Sync failed"
                );

                Err(e)
            }
        }
    }

    async fn execute_phases(
        &self,
        ctx: &Arc<RunContext>,
        run: &mut SyncRun,
        config: &SyncConfig,
    ) -> Result<()> {
        self.enter_phase(ctx, run, SyncPhase::FetchingBasic).await?;
        let setup = self.fetch_basic(ctx).await;
        let finished = self.finish_phase(ctx, run, EntityTier::Basic).await;
        setup.and(finished)?;

        if config.include_dependents {
            ctx.check_cancelled()?;
            self.enter_phase(ctx, run, SyncPhase::FetchingDependent).await?;
            let setup = self.fetch_dependent(ctx).await;
            let finished = self.finish_phase(ctx, run, EntityTier::Dependent).await;
            setup.and(finished)?;
        }

        if config.include_enrichment {
            ctx.check_cancelled()?;
            self.enter_phase(ctx, run, SyncPhase::FetchingEnrichment).await?;
            self.fetch_enrichment(ctx).await;
            self.finish_phase(ctx, run, EntityTier::Enrichment).await?;
        }

        Ok(())
    }

    async fn enter_phase(
        &self,
        ctx: &RunContext,
        run: &mut SyncRun,
        phase: SyncPhase,
    ) -> Result<()> {
        advance(run, phase)?;
        ctx.tracker.set_phase(phase);
        self.save_run(run).await;

        self.emit(SyncEvent::PhaseChanged {
            run_id: run.id.to_string(),
            source_id: ctx.source_id.clone(),
            phase: phase.as_str().to_string(),
        });
        debug!(source_id = %ctx.source_id, phase = %phase, "Entered phase");
        Ok(())
    }

    /// Drain the scheduler and apply the tier's failure policy.
    async fn finish_phase(
        &self,
        ctx: &RunContext,
        run: &mut SyncRun,
        tier: EntityTier,
    ) -> Result<()> {
        ctx.scheduler.drain().await;
        ctx.tracker.set_scheduler(ctx.scheduler.stats());

        let snapshot = ctx.tracker.snapshot();
        run.record_totals(snapshot.total_fetched(), snapshot.total_inserted());
        self.emit(SyncEvent::Progress {
            run_id: run.id.to_string(),
            source_id: ctx.source_id.clone(),
            phase: snapshot.phase.as_str().to_string(),
            items_fetched: snapshot.total_fetched(),
            items_written: snapshot.total_inserted(),
            pending_tasks: snapshot.pending_tasks as u64,
        });

        ctx.check_cancelled()?;

        let failures = ctx.scheduler.take_failures();
        for kind in tier.kinds() {
            if snapshot.kind(*kind).error.is_none() {
                ctx.tracker.mark_complete(*kind);
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        if !tier.is_critical() {
            for failure in &failures {
                warn!(task = %failure.label, error = %failure.error, "Enrichment task aborted");
            }
            return Ok(());
        }

        warn!(
            source_id = %ctx.source_id,
            failed = failures.len(),
            "Phase finished with failed chains"
        );
        match failures.into_iter().next() {
            Some(first) => Err(first.error),
            None => Ok(()),
        }
    }

    /// Start one chain per incomplete basic listing.
    ///
    /// A kind whose cursor cannot be read is recorded as failed and the other
    /// kinds still start. The first such error is returned once every kind has
    /// been tried; chains already submitted keep running until the phase drains.
    async fn fetch_basic(&self, ctx: &Arc<RunContext>) -> Result<()> {
        let mut first_error = None;

        for kind in EntityTier::Basic.kinds() {
            let cursor = match ctx.store.read_cursor(&ctx.source_id, *kind, None).await {
                Ok(cursor) => cursor,
                Err(e) => {
                    setup_failed(ctx, *kind, e, &mut first_error);
                    continue;
                }
            };

            match cursor {
                Some(cursor) if cursor.completed => {
                    debug!(source_id = %ctx.source_id, kind = %kind, "Listing already complete");
                    ctx.tracker.mark_complete(*kind);
                }
                Some(cursor) => {
                    submit_page(Arc::clone(ctx), PageFetch::from_cursor(&cursor, ctx.page_size))
                }
                None => submit_page(
                    Arc::clone(ctx),
                    PageFetch::new(ctx.source_id.clone(), *kind, None, 0, ctx.page_size),
                ),
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Start one track-listing chain per stored parent with an incomplete cursor.
    ///
    /// Setup failures follow the same rule as [`fetch_basic`](Self::fetch_basic).
    async fn fetch_dependent(&self, ctx: &Arc<RunContext>) -> Result<()> {
        let mut first_error = None;

        for kind in EntityTier::Dependent.kinds() {
            let Some(parent_kind) = kind.parent_kind() else {
                continue;
            };

            let parents = match ctx.store.query_parents(&ctx.source_id, parent_kind, None).await {
                Ok(parents) => parents,
                Err(e) => {
                    setup_failed(ctx, *kind, e, &mut first_error);
                    continue;
                }
            };
            let cursors = match self.cursors_by_parent(ctx, *kind).await {
                Ok(cursors) => cursors,
                Err(e) => {
                    setup_failed(ctx, *kind, e, &mut first_error);
                    continue;
                }
            };
            let mut submitted = 0usize;

            for parent_id in parents {
                let task = match cursors.get(&parent_id) {
                    Some(cursor) if cursor.completed => continue,
                    Some(cursor) => PageFetch::from_cursor(cursor, ctx.page_size),
                    None => PageFetch::new(
                        ctx.source_id.clone(),
                        *kind,
                        Some(parent_id),
                        0,
                        ctx.page_size,
                    ),
                };
                submit_page(Arc::clone(ctx), task);
                submitted += 1;
            }

            debug!(
                source_id = %ctx.source_id,
                kind = %kind,
                chains = submitted,
                "Dependent chains submitted"
            );
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Best effort: nothing here can fail the run.
    async fn fetch_enrichment(&self, ctx: &Arc<RunContext>) {
        for kind in EntityTier::Enrichment.kinds() {
            let Some(parent_kind) = kind.parent_kind() else {
                continue;
            };

            let parents = match ctx
                .store
                .query_parents(&ctx.source_id, parent_kind, Some(ctx.enrichment_limit))
                .await
            {
                Ok(parents) => parents,
                Err(e) => {
                    warn!(
                        source_id = %ctx.source_id,
                        kind = %kind,
                        error = %e,
                        "Could not enumerate enrichment parents"
                    );
                    ctx.tracker.record_error(*kind, e.to_string());
                    continue;
                }
            };
            let cursors = match self.cursors_by_parent(ctx, *kind).await {
                Ok(cursors) => cursors,
                Err(e) => {
                    warn!(
                        source_id = %ctx.source_id,
                        kind = %kind,
                        error = %e,
                        "Could not read enrichment cursors"
                    );
                    HashMap::new()
                }
            };

            for parent_id in parents {
                if cursors.get(&parent_id).is_some_and(|c| c.completed) {
                    continue;
                }
                submit_enrichment(
                    Arc::clone(ctx),
                    EnrichmentFetch::new(ctx.source_id.clone(), *kind, parent_id, ctx.page_size),
                );
            }
        }
    }

    async fn cursors_by_parent(
        &self,
        ctx: &RunContext,
        kind: EntityKind,
    ) -> Result<HashMap<String, SyncCursor>> {
        Ok(ctx
            .store
            .list_cursors(&ctx.source_id, kind)
            .await?
            .into_iter()
            .filter_map(|cursor| cursor.parent_id.clone().map(|parent| (parent, cursor)))
            .collect())
    }

    /// Stop the active run for `source_id`.
    ///
    /// Running tasks finish their current page; queued tasks are dropped and
    /// no further phase starts. The run itself ends with `Cancelled`.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` if no run is active for the source
    #[instrument(skip(self), fields(source_id = %source_id))]
    pub async fn cancel(&self, source_id: &str) -> Result<SyncRunId> {
        let active = {
            let active_syncs = self.active_syncs.lock().await;
            active_syncs.get(source_id).cloned()
        };

        let Some(active) = active else {
            return Err(SyncError::RunNotFound {
                run_id: format!("active run for source {}", source_id),
            });
        };

        active.cancellation_token.cancel();
        let dropped = active.scheduler.close();
        info!(run_id = %active.run_id, dropped, "Cancellation requested");

        Ok(active.run_id)
    }

    /// Rewind cursors so the next run fetches everything again.
    ///
    /// With `kind == None` every cursor of the source is reset; otherwise all
    /// cursors of that kind, across parents. Returns the number of cursors
    /// reset.
    ///
    /// # Errors
    ///
    /// Returns `SyncInProgress` while a run for the source is active
    #[instrument(skip(self), fields(source_id = %source_id))]
    pub async fn request_resync(&self, source_id: &str, kind: Option<EntityKind>) -> Result<u64> {
        if self.is_sync_active(source_id).await {
            return Err(SyncError::SyncInProgress {
                source_id: source_id.to_string(),
            });
        }

        let count = self.store.reset_cursors(source_id, kind).await?;
        info!(kind = ?kind, count, "Cursors reset");
        Ok(count)
    }

    /// Recent runs for a source, newest first. Empty without a run repository.
    pub async fn history(&self, source_id: &str, limit: u32) -> Result<Vec<SyncRun>> {
        match &self.run_repository {
            Some(repository) => repository.history(source_id, limit).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn is_sync_active(&self, source_id: &str) -> bool {
        let active_syncs = self.active_syncs.lock().await;
        active_syncs.contains_key(source_id)
    }

    async fn save_run(&self, run: &SyncRun) {
        if let Some(repository) = &self.run_repository {
            if let Err(e) = repository.update(run).await {
                warn!(run_id = %run.id, error = %e, "Failed to persist sync run");
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteCatalogStore;
    use async_trait::async_trait;
    use bridge_traits::catalog::{
        PageWindow, RemoteAlbum, RemoteArtist, RemoteLyrics, RemotePlaylist, RemoteTrack,
    };
    use bridge_traits::error::Result as BridgeResult;
    use core_library::create_test_pool;

    /// Source with one artist and nothing else.
    struct SingleArtist;

    #[async_trait]
    impl CatalogSource for SingleArtist {
        async fn list_artists(
            &self,
            _: &str,
            window: PageWindow,
        ) -> BridgeResult<Vec<RemoteArtist>> {
            Ok(if window.offset == 0 {
                vec![RemoteArtist {
                    id: "ar-1".to_string(),
                    name: "Nina Simone".to_string(),
                    sort_name: None,
                    image_url: None,
                }]
            } else {
                Vec::new()
            })
        }

        async fn list_albums(&self, _: &str, _: PageWindow) -> BridgeResult<Vec<RemoteAlbum>> {
            Ok(Vec::new())
        }

        async fn list_playlists(
            &self,
            _: &str,
            _: PageWindow,
        ) -> BridgeResult<Vec<RemotePlaylist>> {
            Ok(Vec::new())
        }

        async fn list_album_tracks(
            &self,
            _: &str,
            _: &str,
            _: PageWindow,
        ) -> BridgeResult<Vec<RemoteTrack>> {
            Ok(Vec::new())
        }

        async fn list_playlist_tracks(
            &self,
            _: &str,
            _: &str,
            _: PageWindow,
        ) -> BridgeResult<Vec<RemoteTrack>> {
            Ok(Vec::new())
        }

        async fn list_similar_albums(
            &self,
            _: &str,
            _: &str,
            _: u32,
        ) -> BridgeResult<Vec<RemoteAlbum>> {
            Ok(Vec::new())
        }

        async fn get_lyrics(&self, _: &str, _: &str) -> BridgeResult<Option<RemoteLyrics>> {
            Ok(None)
        }
    }

    async fn setup_engine() -> (SyncEngine, EventBus) {
        let pool = create_test_pool().await.unwrap();
        let bus = EventBus::new(256);
        let store = Arc::new(SqliteCatalogStore::new(pool).with_event_bus(bus.clone()));
        (SyncEngine::new(store, bus.clone()), bus)
    }

    #[test]
    fn test_config_defaults_follow_settings() {
        let config = SyncConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.page_size, 100);
        assert!(config.include_dependents);
        assert!(config.include_enrichment);
        assert_eq!(config.enrichment_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = SyncConfig {
            concurrency: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            page_size: MAX_PAGE_SIZE + 1,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_run_emits_lifecycle_events() {
        let (engine, bus) = setup_engine().await;
        let mut rx = bus.subscribe();

        let snapshot = engine
            .run_sync("src", Arc::new(SingleArtist), SyncConfig::default())
            .await
            .unwrap();

        assert_eq!(snapshot.phase, SyncPhase::Done);
        assert_eq!(snapshot.kind(EntityKind::Artist).total_inserted, 1);

        let mut sync_events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CoreEvent::Sync(event) = event {
                sync_events.push(event);
            }
        }

        assert!(matches!(sync_events.first(), Some(SyncEvent::Started { .. })));
        assert!(matches!(sync_events.last(), Some(SyncEvent::Completed { items_written: 1, .. })));
        let phases: Vec<_> = sync_events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::PhaseChanged { phase, .. } => Some(phase.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec!["fetching_basic", "fetching_dependent", "fetching_enrichment"]
        );
    }

    #[tokio::test]
    async fn test_empty_source_id_rejected() {
        let (engine, _bus) = setup_engine().await;
        let err = engine
            .run_sync("  ", Arc::new(SingleArtist), SyncConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_cancel_without_active_run() {
        let (engine, _bus) = setup_engine().await;
        let err = engine.cancel("src").await.unwrap_err();
        assert!(matches!(err, SyncError::RunNotFound { .. }));
        assert!(!engine.is_sync_active("src").await);
    }

    #[tokio::test]
    async fn test_history_without_repository_is_empty() {
        let (engine, _bus) = setup_engine().await;
        engine
            .run_sync("src", Arc::new(SingleArtist), SyncConfig::default())
            .await
            .unwrap();
        assert!(engine.history("src", 10).await.unwrap().is_empty());
    }
}
