//! # Events emitted by the scheduler driver.
//!
//! [`EventKind`] classifies events into scheduler lifecycle (start/stop),
//! task lifecycle (queued, starting, yielded, waiting, delegated, restarted,
//! completed, failed, removed) and cleanup anomalies.
//!
//! Each event carries a globally unique, monotonically increasing sequence
//! number (`seq`); use it to restore exact order when events are observed
//! from multiple subscribers.
//!
//! ## Example
//! ```
//! use taskloom::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::TaskFailed)
//!     .with_task("interview")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("interview"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of scheduler events.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The scheduler began driving tasks (`start`).
    SchedulerStarted,
    /// The scheduler halted after the in-flight step (`stop`).
    SchedulerStopped,

    /// A task was registered in the queue. Sets `task`.
    TaskQueued,
    /// A task body was (re-)invoked for its first step. Sets `task`.
    TaskStarting,
    /// A task yielded at an interrupt checkpoint. Sets `task`.
    TaskYielded,
    /// A task suspended on an external awaitable or on a delegated child.
    /// Sets `task`.
    TaskWaiting,
    /// A task delegated to a nested child task. Sets `task` (the child).
    TaskDelegated,
    /// A preempted `Restart` task had its continuation discarded. Sets `task`.
    TaskRestarted,
    /// A task completed with a value. Sets `task`.
    TaskCompleted,
    /// A task failed with an error. Sets `task`, `reason`.
    TaskFailed,
    /// A task was cancelled via `remove_tasks`. Sets `task`, `reason`.
    TaskRemoved,

    /// A cleanup hook failed or panicked during removal. Sets `task`, `reason`.
    CleanupFailed,
}

/// A single scheduler event with metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event classification.
    pub kind: EventKind,
    /// Task name, where applicable ("<anonymous>" for unnamed tasks).
    pub task: Option<String>,
    /// Failure/removal reason, where applicable.
    pub reason: Option<String>,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
}

impl Event {
    /// Creates an event stamped with the current time and the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            task: None,
            reason: None,
            at: SystemTime::now(),
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    /// Attaches a task name.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a reason string.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
