//! # Task Scheduler
//!
//! A bounded-concurrency work queue for sync tasks.
//!
//! ## Overview
//!
//! - `submit` queues a task and returns immediately; at most `concurrency`
//!   tasks run at once on the Tokio runtime.
//! - A running task may `submit` further tasks (a page fetch enqueueing the
//!   next page). They share the same concurrency budget.
//! - `drain` waits until the queue is empty **and** nothing is running. The
//!   condition is re-checked after every completion, so continuations
//!   submitted during execution are waited for too.
//! - A failing task never cancels its siblings. Its error is recorded on the
//!   failure list and collected with `take_failures`; the caller decides what
//!   a failure means for its phase.
//! - `close` stops launching queued tasks and lets running ones finish.
//! - An optional completion hook receives the counters after every task has
//!   been accounted for, so observers never see the finishing task as pending.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let scheduler = TaskScheduler::new(5);
//! scheduler.submit("artists@0", async move { fetch_page().await });
//! scheduler.drain().await;
//! for failure in scheduler.take_failures() {
//!     warn!(task = %failure.label, error = %failure.error, "Task failed");
//! }
//! ```

use crate::error::{Result, SyncError};
use futures::FutureExt;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, trace};

type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Called with fresh counters each time a task finishes. Runs outside the
/// scheduler lock.
pub type CompletionHook = Arc<dyn Fn(SchedulerStats) + Send + Sync>;

struct QueuedTask {
    label: String,
    future: TaskFuture,
}

/// A task that finished with an error.
#[derive(Debug)]
pub struct TaskFailure {
    pub label: String,
    pub error: SyncError,
}

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchedulerStats {
    pub concurrency: usize,
    /// Submitted but not started
    pub queued: usize,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
    /// Highest number of simultaneously running tasks observed
    pub peak_running: usize,
}

impl SchedulerStats {
    /// Tasks not yet finished (queued or running)
    pub fn pending(&self) -> usize {
        self.queued + self.running
    }
}

#[derive(Default)]
struct SchedulerState {
    queue: VecDeque<QueuedTask>,
    running: usize,
    completed: u64,
    failed: u64,
    peak_running: usize,
    closed: bool,
    failures: Vec<TaskFailure>,
}

struct Shared {
    concurrency: usize,
    state: Mutex<SchedulerState>,
    idle: Notify,
    on_complete: Option<CompletionHook>,
}

/// Bounded-concurrency scheduler. Clones share the same queue.
#[derive(Clone)]
pub struct TaskScheduler {
    shared: Arc<Shared>,
}

impl TaskScheduler {
    /// Create a scheduler running at most `concurrency` tasks at once (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self::build(concurrency, None)
    }

    /// Like [`new`](Self::new), reporting counters to `hook` after every task.
    pub fn with_completion_hook(concurrency: usize, hook: CompletionHook) -> Self {
        Self::build(concurrency, Some(hook))
    }

    fn build(concurrency: usize, on_complete: Option<CompletionHook>) -> Self {
        Self {
            shared: Arc::new(Shared {
                concurrency: concurrency.max(1),
                state: Mutex::new(SchedulerState::default()),
                idle: Notify::new(),
                on_complete,
            }),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.shared.concurrency
    }

    /// Queue a task. Returns immediately.
    ///
    /// Must be called from within a Tokio runtime. Tasks submitted after
    /// [`close`](Self::close) are dropped without running.
    pub fn submit<F>(&self, label: impl Into<String>, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        let mut state = self.state();

        if state.closed {
            debug!(task = %label, "Scheduler closed, dropping task");
            return;
        }

        trace!(task = %label, queued = state.queue.len(), "Task submitted");
        state.queue.push_back(QueuedTask {
            label,
            future: Box::pin(task),
        });
        self.launch(&mut state);
    }

    /// Wait until no task is queued or running.
    pub async fn drain(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a completion in between is not missed.
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }

            notified.await;
        }
    }

    /// Stop launching queued tasks. Running tasks finish normally.
    ///
    /// Returns the number of queued tasks that were dropped.
    pub fn close(&self) -> usize {
        let (dropped, idle) = {
            let mut state = self.state();
            state.closed = true;
            let dropped = state.queue.len();
            state.queue.clear();
            (dropped, state.running == 0)
        };

        debug!(dropped, "Scheduler closed");
        if idle {
            self.shared.idle.notify_waiters();
        }
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn is_idle(&self) -> bool {
        let state = self.state();
        state.queue.is_empty() && state.running == 0
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.state();
        self.stats_of(&state)
    }

    /// Remove and return the failures recorded so far, in completion order.
    pub fn take_failures(&self) -> Vec<TaskFailure> {
        std::mem::take(&mut self.state().failures)
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats_of(&self, state: &SchedulerState) -> SchedulerStats {
        SchedulerStats {
            concurrency: self.shared.concurrency,
            queued: state.queue.len(),
            running: state.running,
            completed: state.completed,
            failed: state.failed,
            peak_running: state.peak_running,
        }
    }

    fn launch(&self, state: &mut SchedulerState) {
        while state.running < self.shared.concurrency {
            let Some(task) = state.queue.pop_front() else {
                break;
            };

            state.running += 1;
            state.peak_running = state.peak_running.max(state.running);

            let scheduler = self.clone();
            tokio::spawn(async move {
                let QueuedTask { label, future } = task;
                let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::TaskPanicked(label.clone())),
                };
                scheduler.finish(label, outcome);
            });
        }
    }

    fn finish(&self, label: String, outcome: Result<()>) {
        let stats = {
            let mut state = self.state();
            state.running -= 1;
            state.completed += 1;

            if let Err(error) = outcome {
                debug!(task = %label, error = %error, "Task failed");
                state.failed += 1;
                state.failures.push(TaskFailure { label, error });
            }

            if !state.closed {
                self.launch(&mut state);
            }

            self.stats_of(&state)
        };

        if let Some(hook) = &self.shared.on_complete {
            hook(stats);
        }
        if stats.pending() == 0 {
            self.shared.idle.notify_waiters();
        }
    }
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bound_is_respected() {
        let scheduler = TaskScheduler::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            scheduler.submit(format!("task-{}", i), async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        scheduler.drain().await;

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
        let stats = scheduler.stats();
        assert_eq!(stats.completed, 10);
        assert_eq!(stats.peak_running, 2);
        assert_eq!(stats.pending(), 0);
    }

    fn spawn_chain(scheduler: TaskScheduler, counter: Arc<AtomicUsize>, remaining: usize) {
        let inner = scheduler.clone();
        scheduler.submit(format!("chain-{}", remaining), async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            if remaining > 1 {
                spawn_chain(inner, counter, remaining - 1);
            }
            Ok(())
        });
    }

    #[tokio::test]
    async fn test_drain_waits_for_recursively_submitted_tasks() {
        let scheduler = TaskScheduler::new(3);
        let counter = Arc::new(AtomicUsize::new(0));

        spawn_chain(scheduler.clone(), counter.clone(), 5);
        spawn_chain(scheduler.clone(), counter.clone(), 3);

        scheduler.drain().await;

        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert!(scheduler.is_idle());
    }

    #[tokio::test]
    async fn test_drain_on_idle_scheduler_returns() {
        let scheduler = TaskScheduler::new(1);
        scheduler.drain().await;
        assert_eq!(scheduler.stats().completed, 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let scheduler = TaskScheduler::new(2);
        let finished = Arc::new(AtomicUsize::new(0));

        scheduler.submit("bad", async { Err(SyncError::Driver("boom".to_string())) });
        for i in 0..4 {
            let finished = finished.clone();
            scheduler.submit(format!("good-{}", i), async move {
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        scheduler.drain().await;

        assert_eq!(finished.load(Ordering::SeqCst), 4);
        let failures = scheduler.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].label, "bad");
        assert!(matches!(failures[0].error, SyncError::Driver(_)));
        assert!(scheduler.take_failures().is_empty());
        assert_eq!(scheduler.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_panicking_task_is_recorded() {
        let scheduler = TaskScheduler::new(1);

        scheduler.submit("explodes", async { panic!("task blew up") });
        scheduler.submit("after", async { Ok(()) });

        scheduler.drain().await;

        let failures = scheduler.take_failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].error, SyncError::TaskPanicked(ref l) if l == "explodes"));
        assert_eq!(scheduler.stats().completed, 2);
    }

    #[tokio::test]
    async fn test_completion_hook_excludes_finished_task() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook: CompletionHook = Arc::new(move |stats: SchedulerStats| {
            sink.lock().unwrap().push(stats.pending());
        });
        let scheduler = TaskScheduler::with_completion_hook(1, hook);

        for i in 0..3 {
            scheduler.submit(format!("task-{}", i), async { Ok(()) });
        }
        scheduler.drain().await;

        assert_eq!(*seen.lock().unwrap(), vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn test_close_lets_running_finish_and_drops_queued() {
        let scheduler = TaskScheduler::new(1);
        let ran = Arc::new(AtomicUsize::new(0));

        for i in 0..4 {
            let ran = ran.clone();
            scheduler.submit(format!("task-{}", i), async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        assert_eq!(scheduler.close(), 3);
        scheduler.submit("late", async { Ok(()) });
        scheduler.drain().await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_closed());
        assert_eq!(scheduler.stats().completed, 1);
    }
}
