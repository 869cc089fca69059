//! # Sync Run State Machine
//!
//! Lifecycle of a single sync run with validated phase transitions.
//!
//! ## State Machine
//!
//! ```text
//! Idle → FetchingBasic → FetchingDependent → FetchingEnrichment → Done
//!             │   │              │                   ↑
//!             │   └──────────────┼───────────────────┤ (tiers disabled)
//!             ↓                  ↓
//!           Failed             Failed
//!
//! any non-terminal phase → Cancelled
//! ```
//!
//! Enrichment never fails a run, so `FetchingEnrichment` only leads to
//! `Done` or `Cancelled`.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a run id from its string form
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| SyncError::InvalidInput {
                field: "run_id".to_string(),
                message: e.to_string(),
            })
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    FetchingBasic,
    FetchingDependent,
    FetchingEnrichment,
    Done,
    Failed,
    Cancelled,
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed | SyncPhase::Cancelled)
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::FetchingBasic => "fetching_basic",
            SyncPhase::FetchingDependent => "fetching_dependent",
            SyncPhase::FetchingEnrichment => "fetching_enrichment",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
            SyncPhase::Cancelled => "cancelled",
        }
    }

    /// Whether `self → to` is a legal transition
    pub fn can_transition_to(&self, to: SyncPhase) -> bool {
        use SyncPhase::*;

        match (*self, to) {
            (Idle, FetchingBasic) => true,

            (FetchingBasic, FetchingDependent | FetchingEnrichment | Done | Failed) => true,
            (FetchingDependent, FetchingEnrichment | Done | Failed) => true,
            (FetchingEnrichment, Done) => true,

            (from, Cancelled) => !from.is_terminal(),

            _ => false,
        }
    }
}

impl FromStr for SyncPhase {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(SyncPhase::Idle),
            "fetching_basic" => Ok(SyncPhase::FetchingBasic),
            "fetching_dependent" => Ok(SyncPhase::FetchingDependent),
            "fetching_enrichment" => Ok(SyncPhase::FetchingEnrichment),
            "done" => Ok(SyncPhase::Done),
            "failed" => Ok(SyncPhase::Failed),
            "cancelled" => Ok(SyncPhase::Cancelled),
            _ => Err(SyncError::InvalidInput {
                field: "phase".to_string(),
                message: format!("unknown sync phase '{}'", s),
            }),
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Sync Run Entity
// ============================================================================

/// One invocation of the sync engine for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub source_id: String,
    pub phase: SyncPhase,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    /// Records received from the driver across all kinds
    pub items_fetched: u64,
    /// Records persisted across all kinds
    pub items_written: u64,
    pub error_message: Option<String>,
}

impl SyncRun {
    /// Create a run in the `Idle` phase
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            id: SyncRunId::new(),
            source_id: source_id.into(),
            phase: SyncPhase::Idle,
            started_at: current_timestamp(),
            finished_at: None,
            items_fetched: 0,
            items_written: 0,
            error_message: None,
        }
    }

    /// Move to a non-terminal fetching phase
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not allowed from the current phase
    pub fn enter(mut self, phase: SyncPhase) -> Result<Self> {
        if phase.is_terminal() {
            return Err(SyncError::InvalidStateTransition {
                from: self.phase.as_str().to_string(),
                to: phase.as_str().to_string(),
                reason: "Terminal phases are reached through complete, fail or cancel"
                    .to_string(),
            });
        }
        self.validate_transition(phase)?;
        self.phase = phase;
        Ok(self)
    }

    pub fn record_totals(&mut self, items_fetched: u64, items_written: u64) {
        self.items_fetched = self.items_fetched.max(items_fetched);
        self.items_written = self.items_written.max(items_written);
    }

    pub fn complete(mut self) -> Result<Self> {
        self.validate_transition(SyncPhase::Done)?;
        self.phase = SyncPhase::Done;
        self.finished_at = Some(current_timestamp());
        Ok(self)
    }

    pub fn fail(mut self, error_message: impl Into<String>) -> Result<Self> {
        self.validate_transition(SyncPhase::Failed)?;
        self.phase = SyncPhase::Failed;
        self.finished_at = Some(current_timestamp());
        self.error_message = Some(error_message.into());
        Ok(self)
    }

    pub fn cancel(mut self) -> Result<Self> {
        self.validate_transition(SyncPhase::Cancelled)?;
        self.phase = SyncPhase::Cancelled;
        self.finished_at = Some(current_timestamp());
        Ok(self)
    }

    /// Wall-clock duration, once the run has finished
    pub fn duration_secs(&self) -> Option<u64> {
        self.finished_at
            .map(|end| end.saturating_sub(self.started_at).max(0) as u64)
    }

    fn validate_transition(&self, to: SyncPhase) -> Result<()> {
        if !self.phase.can_transition_to(to) {
            return Err(SyncError::InvalidStateTransition {
                from: self.phase.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.phase.as_str(),
                    to.as_str()
                ),
            });
        }
        Ok(())
    }
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============================================================================
// Tests
// ============================================================================
