//! Error types used by the taskloom engine and by task bodies.
//!
//! This module defines two error enums:
//!
//! - [`TaskError`] — errors that settle an individual task (body failures,
//!   removal, illegal delegation, engine shutdown).
//! - [`SchedulerError`] — errors raised by the scheduler itself (currently
//!   only cleanup failures reported by `remove_tasks`).
//!
//! Both types provide `as_label` for stable log/metric labels. The engine
//! never retries a failed task; retry policy, if any, belongs to the body.

use thiserror::Error;

/// # Errors that settle an individual task.
///
/// Task bodies return `Result<T, TaskError>`; the same type is what a
/// [`TaskHandle`](crate::TaskHandle) rejects with and what a parent receives
/// at a failed delegation point.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// The task body failed. Arbitrary domain errors are carried as a message.
    #[error("task failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The task body (or a future it suspended on) panicked, or an internal
    /// engine invariant was violated.
    #[error("fatal task error: {error}")]
    Fatal {
        /// The underlying panic/invariant message.
        error: String,
    },

    /// The task was cancelled via `remove_tasks` without a caller-supplied error.
    #[error("task was removed")]
    Removed,

    /// A task attempted to delegate to a child with a strictly lower priority.
    #[error("delegated task '{child}' has lower priority than its parent")]
    LowerPriority {
        /// Name of the offending child task (or "<anonymous>").
        child: String,
    },

    /// The scheduler was dropped before the task settled.
    #[error("scheduler was shut down before the task settled")]
    Shutdown,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskloom::TaskError;
    ///
    /// assert_eq!(TaskError::Removed.as_label(), "task_removed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Removed => "task_removed",
            TaskError::LowerPriority { .. } => "task_lower_priority",
            TaskError::Shutdown => "scheduler_shutdown",
        }
    }

    /// Convenience constructor for a body failure with an arbitrary message.
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail { error: error.into() }
    }
}

/// # Errors produced by the scheduler itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// One or more cleanup hooks failed (or panicked) while removing tasks.
    ///
    /// The removed tasks still settled with the removal error; this is the
    /// secondary surface for cleanup anomalies.
    #[error("cleanup failed for tasks: {tasks:?}")]
    CleanupFailed {
        /// Names of the tasks whose cleanup hooks failed.
        tasks: Vec<String>,
    },
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::CleanupFailed { .. } => "scheduler_cleanup_failed",
        }
    }
}
