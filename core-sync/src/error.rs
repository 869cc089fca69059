use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote failure reported by the catalog source (network, auth, server).
    #[error("Driver error: {0}")]
    Driver(String),

    /// The catalog store rejected a read or write.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A parent record vanished between enumeration and fetch.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sync already in progress for source: {source_id}")]
    SyncInProgress { source_id: String },

    #[error("Sync run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Task panicked: {0}")]
    TaskPanicked(String),
}

impl SyncError {
    /// Whether re-running the sync can be expected to make progress.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::Driver(_)
                | SyncError::Persistence(_)
                | SyncError::NotFound(_)
                | SyncError::Cancelled
        )
    }
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NotFound(what) => SyncError::NotFound(what),
            other => SyncError::Driver(other.to_string()),
        }
    }
}

impl From<LibraryError> for SyncError {
    fn from(err: LibraryError) -> Self {
        SyncError::Persistence(err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
