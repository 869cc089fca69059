//! # Core Configuration
//!
//! [`CoreConfig`] gathers everything needed to assemble the sync core:
//! where the catalog database lives, how large the event buffer is, the
//! default sync tuning and the logging setup.
//!
//! Configuration is built with [`CoreConfig::builder`] and validated when
//! `build()` is called, so misconfiguration fails at startup rather than in
//! the middle of a sync.
//!
//! ```
//! use core_runtime::config::{CoreConfig, SyncSettings};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/catalog/catalog.db")
//!     .sync_settings(SyncSettings::default().with_concurrency(8))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.sync.concurrency, 8);
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_ENRICHMENT_LIMIT: u32 = 100;

pub const MAX_CONCURRENCY: usize = 64;
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Default tuning for sync runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Maximum number of fetch tasks running at once
    pub concurrency: usize,
    /// Records requested per page
    pub page_size: u32,
    /// Fetch album and playlist track listings after the basic listings
    pub include_dependents: bool,
    /// Fetch similar albums and lyrics after the dependent listings
    pub include_enrichment: bool,
    /// Number of albums (and tracks) considered for enrichment
    pub enrichment_limit: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            include_dependents: true,
            include_enrichment: true,
            enrichment_limit: DEFAULT_ENRICHMENT_LIMIT,
        }
    }
}

impl SyncSettings {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_dependents(mut self, include: bool) -> Self {
        self.include_dependents = include;
        self
    }

    pub fn with_enrichment(mut self, include: bool) -> Self {
        self.include_enrichment = include;
        self
    }

    pub fn with_enrichment_limit(mut self, limit: u32) -> Self {
        self.enrichment_limit = limit;
        self
    }

    /// Checks the bounds every sync run relies on.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(Error::Config(format!(
                "Sync concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY, self.concurrency
            )));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Sync page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        Ok(())
    }
}

/// Validated configuration for the sync core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// SQLite file for the catalog. `None` keeps the catalog in memory.
    pub database_path: Option<PathBuf>,
    pub event_buffer_size: usize,
    pub sync: SyncSettings,
    /// Installed by the service on bootstrap when present
    pub logging: Option<LoggingConfig>,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Checks that the database path (if any) is not empty, the event buffer
    /// is non-zero and the sync settings are within bounds.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.sync.validate()
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.is_none()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    event_buffer_size: Option<usize>,
    sync: Option<SyncSettings>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the SQLite database file. Without it the catalog lives in memory.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid setting.
    pub fn build(self) -> Result<CoreConfig> {
        let config = CoreConfig {
            database_path: self.database_path,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            sync: self.sync.unwrap_or_default(),
            logging: self.logging,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::builder().build().unwrap();

        assert!(config.is_in_memory());
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.sync.concurrency, 5);
        assert_eq!(config.sync.page_size, 100);
        assert!(config.sync.include_dependents);
        assert!(config.sync.include_enrichment);
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = CoreConfig::builder()
            .database_path("/tmp/catalog.db")
            .event_buffer_size(512)
            .sync_settings(
                SyncSettings::default()
                    .with_page_size(250)
                    .with_dependents(false)
                    .with_enrichment_limit(20),
            )
            .build()
            .unwrap();

        assert!(!config.is_in_memory());
        assert_eq!(config.event_buffer_size, 512);
        assert_eq!(config.sync.page_size, 250);
        assert!(!config.sync.include_dependents);
        assert_eq!(config.sync.enrichment_limit, 20);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = CoreConfig::builder()
            .sync_settings(SyncSettings::default().with_concurrency(0))
            .build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("concurrency")));
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(SyncSettings::default().with_page_size(0).validate().is_err());
        assert!(SyncSettings::default()
            .with_page_size(MAX_PAGE_SIZE + 1)
            .validate()
            .is_err());
        assert!(SyncSettings::default()
            .with_page_size(MAX_PAGE_SIZE)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let result = CoreConfig::builder().database_path("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_event_buffer_rejected() {
        assert!(CoreConfig::builder().event_buffer_size(0).build().is_err());
    }
}
