//! # Progress Aggregation
//!
//! Run-wide counters shared by every fetch task. Counters only grow within a
//! run; `is_complete` and `error` are overwritten, never cleared. Readers get
//! cloned [`ProgressSnapshot`]s.

use crate::run::SyncPhase;
use crate::scheduler::SchedulerStats;
use core_library::EntityKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Called with a fresh snapshot after every progress update.
pub type ProgressCallback = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Counters for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindProgress {
    /// Records received from the driver
    pub total_fetched: u64,
    /// Records persisted
    pub total_inserted: u64,
    /// Pages persisted so far (across all parents for dependent kinds)
    pub current_page: u64,
    pub is_complete: bool,
    /// Last error recorded for this kind
    pub error: Option<String>,
}

/// Point-in-time view of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub phase: SyncPhase,
    pub kinds: BTreeMap<EntityKind, KindProgress>,
    /// Tasks submitted but not yet started
    pub queue_size: usize,
    /// Tasks queued or running
    pub pending_tasks: usize,
}

impl ProgressSnapshot {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            kinds: EntityKind::ALL
                .iter()
                .map(|kind| (*kind, KindProgress::default()))
                .collect(),
            queue_size: 0,
            pending_tasks: 0,
        }
    }

    pub fn kind(&self, kind: EntityKind) -> KindProgress {
        self.kinds.get(&kind).cloned().unwrap_or_default()
    }

    pub fn total_fetched(&self) -> u64 {
        self.kinds.values().map(|k| k.total_fetched).sum()
    }

    pub fn total_inserted(&self) -> u64 {
        self.kinds.values().map(|k| k.total_inserted).sum()
    }

    /// Kinds with a recorded error, in kind order
    pub fn failed_kinds(&self) -> Vec<EntityKind> {
        self.kinds
            .iter()
            .filter(|(_, progress)| progress.error.is_some())
            .map(|(kind, _)| *kind)
            .collect()
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutex-guarded accumulator behind a run's [`ProgressSnapshot`].
pub struct ProgressTracker {
    state: Mutex<ProgressSnapshot>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            state: Mutex::new(ProgressSnapshot::new()),
            callback,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state().clone()
    }

    pub fn set_phase(&self, phase: SyncPhase) {
        self.update(|snapshot| snapshot.phase = phase);
    }

    /// Account for one persisted page
    pub fn record_page(&self, kind: EntityKind, fetched: u64, inserted: u64) {
        self.update(|snapshot| {
            let progress = snapshot.kinds.entry(kind).or_default();
            progress.total_fetched += fetched;
            progress.total_inserted += inserted;
            progress.current_page += 1;
        });
    }

    pub fn mark_complete(&self, kind: EntityKind) {
        self.update(|snapshot| snapshot.kinds.entry(kind).or_default().is_complete = true);
    }

    pub fn record_error(&self, kind: EntityKind, message: impl Into<String>) {
        let message = message.into();
        self.update(|snapshot| snapshot.kinds.entry(kind).or_default().error = Some(message));
    }

    pub fn set_scheduler(&self, stats: SchedulerStats) {
        self.update(|snapshot| {
            snapshot.queue_size = stats.queued;
            snapshot.pending_tasks = stats.pending();
        });
    }

    fn state(&self) -> MutexGuard<'_, ProgressSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut ProgressSnapshot)) {
        let snapshot = {
            let mut state = self.state();
            apply(&mut state);
            self.callback.as_ref().map(|_| state.clone())
        };

        // Callback runs outside the lock so it may read the tracker again.
        if let (Some(callback), Some(snapshot)) = (&self.callback, snapshot) {
            callback(&snapshot);
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("snapshot", &self.snapshot())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_new_snapshot_lists_every_kind() {
        let snapshot = ProgressTracker::new(None).snapshot();
        assert_eq!(snapshot.kinds.len(), EntityKind::ALL.len());
        assert_eq!(snapshot.phase, SyncPhase::Idle);
        assert_eq!(snapshot.total_fetched(), 0);
    }

    #[test]
    fn test_counters_accumulate() {
        let tracker = ProgressTracker::new(None);
        tracker.record_page(EntityKind::Album, 100, 100);
        tracker.record_page(EntityKind::Album, 40, 40);
        tracker.record_page(EntityKind::Artist, 7, 7);
        tracker.mark_complete(EntityKind::Album);

        let snapshot = tracker.snapshot();
        let albums = snapshot.kind(EntityKind::Album);
        assert_eq!(albums.total_fetched, 140);
        assert_eq!(albums.current_page, 2);
        assert!(albums.is_complete);
        assert_eq!(snapshot.total_inserted(), 147);
    }

    #[test]
    fn test_error_is_overwritten_and_reported() {
        let tracker = ProgressTracker::new(None);
        tracker.record_error(EntityKind::Playlist, "first");
        tracker.record_error(EntityKind::Playlist, "second");

        let snapshot = tracker.snapshot();
        assert_eq!(
            snapshot.kind(EntityKind::Playlist).error.as_deref(),
            Some("second")
        );
        assert_eq!(snapshot.failed_kinds(), vec![EntityKind::Playlist]);
    }

    #[test]
    fn test_callback_sees_every_update() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let tracker = ProgressTracker::new(Some(Arc::new(move |snapshot: &ProgressSnapshot| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert!(snapshot.kinds.len() >= 7);
        })));

        tracker.set_phase(SyncPhase::FetchingBasic);
        tracker.record_page(EntityKind::Artist, 1, 1);
        tracker.set_scheduler(SchedulerStats {
            queued: 3,
            running: 2,
            ..Default::default()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.queue_size, 3);
        assert_eq!(snapshot.pending_tasks, 5);
    }

    #[test]
    fn test_snapshot_serializes_kind_keys_as_strings() {
        let tracker = ProgressTracker::new(None);
        tracker.record_page(EntityKind::AlbumTrack, 2, 2);

        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(json["kinds"]["album_track"]["total_fetched"], 2);
        assert_eq!(json["phase"], "idle");
    }
}
