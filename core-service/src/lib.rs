//! Core service façade and bootstrap.
//!
//! [`CoreService::bootstrap`] turns a validated [`CoreConfig`] into a ready
//! sync core: logging, the catalog database with its migrations, the event
//! bus, the catalog store, run history and the sync engine. Hosts then hand
//! a [`CatalogSource`] implementation to [`CoreService::sync_source`] for
//! each remote library they want mirrored.
//!
//! ```rust,ignore
//! use core_service::CoreService;
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("catalog.db")
//!     .build()?;
//! let core = CoreService::bootstrap(config).await?;
//!
//! let mut events = core.subscribe_events().for_source("home-server");
//! let snapshot = core.sync_source("home-server", driver).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use bridge_traits;
pub use core_library;
pub use core_runtime;
pub use core_sync;

use std::sync::Arc;

use bridge_traits::catalog::CatalogSource;
use core_library::{
    create_pool, AlbumRepository, ArtistRepository, CursorRepository, DatabaseConfig, EntityKind,
    LyricsRepository, PlaylistRepository, TrackRepository,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use core_runtime::logging::init_logging;
use core_sync::{
    ProgressSnapshot, SqliteCatalogStore, SqliteSyncRunRepository, SyncConfig, SyncEngine,
    SyncRun, SyncRunId,
};
use sqlx::SqlitePool;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: CoreConfig,
    pool: SqlitePool,
    event_bus: EventBus,
    store: Arc<SqliteCatalogStore>,
    engine: Arc<SyncEngine>,
}

impl CoreService {
    /// Assemble the sync core described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, logging was already installed
    /// by someone else, or the database cannot be opened and migrated.
    #[instrument(skip(config), fields(in_memory = config.is_in_memory()))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        if let Some(logging) = &config.logging {
            init_logging(logging.clone())?;
        }

        let db_config = match &config.database_path {
            Some(path) => DatabaseConfig::new(path),
            None => DatabaseConfig::in_memory(),
        };
        let pool = create_pool(db_config).await?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let store =
            Arc::new(SqliteCatalogStore::new(pool.clone()).with_event_bus(event_bus.clone()));

        let runs = SqliteSyncRunRepository::new(pool.clone());
        runs.initialize().await?;

        let engine = Arc::new(
            SyncEngine::new(store.clone(), event_bus.clone()).with_run_repository(Arc::new(runs)),
        );

        info!(
            database = ?config.database_path,
            concurrency = config.sync.concurrency,
            page_size = config.sync.page_size,
            "Core service ready"
        );

        Ok(Self {
            config,
            pool,
            event_bus,
            store,
            engine,
        })
    }

    /// Sync one source with the configured sync settings.
    pub async fn sync_source(
        &self,
        source_id: &str,
        driver: Arc<dyn CatalogSource>,
    ) -> Result<ProgressSnapshot> {
        let config = SyncConfig::from_settings(&self.config.sync);
        self.sync_source_with(source_id, driver, config).await
    }

    /// Sync one source with an explicit per-run configuration.
    pub async fn sync_source_with(
        &self,
        source_id: &str,
        driver: Arc<dyn CatalogSource>,
        config: SyncConfig,
    ) -> Result<ProgressSnapshot> {
        Ok(self.engine.run_sync(source_id, driver, config).await?)
    }

    /// Reset cursors so the next sync of `source_id` refetches `kind` (or everything).
    pub async fn request_resync(&self, source_id: &str, kind: Option<EntityKind>) -> Result<u64> {
        Ok(self.engine.request_resync(source_id, kind).await?)
    }

    pub async fn cancel_sync(&self, source_id: &str) -> Result<SyncRunId> {
        Ok(self.engine.cancel(source_id).await?)
    }

    pub async fn sync_history(&self, source_id: &str, limit: u32) -> Result<Vec<SyncRun>> {
        Ok(self.engine.history(source_id, limit).await?)
    }

    pub async fn is_syncing(&self, source_id: &str) -> bool {
        self.engine.is_sync_active(source_id).await
    }

    /// Stream of sync lifecycle and catalog invalidation events.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn engine(&self) -> Arc<SyncEngine> {
        Arc::clone(&self.engine)
    }

    // ------------------------------------------------------------------
    // Read access to the catalog
    // ------------------------------------------------------------------

    pub fn artists(&self) -> Arc<dyn ArtistRepository> {
        self.store.artists()
    }

    pub fn albums(&self) -> Arc<dyn AlbumRepository> {
        self.store.albums()
    }

    pub fn playlists(&self) -> Arc<dyn PlaylistRepository> {
        self.store.playlists()
    }

    pub fn tracks(&self) -> Arc<dyn TrackRepository> {
        self.store.tracks()
    }

    pub fn lyrics(&self) -> Arc<dyn LyricsRepository> {
        self.store.lyrics()
    }

    pub fn cursors(&self) -> Arc<dyn CursorRepository> {
        self.store.cursors()
    }

    /// Close the database pool. Clones of this service stop working too.
    pub async fn shutdown(&self) {
        self.pool.close().await;
        info!("Core service shut down");
    }
}
