//! # Task abstractions: descriptors, yield vocabulary, completion handles.
//!
//! This module provides the caller-facing task types:
//! - [`TaskSpec`] — descriptor bundling a resumable body with priority,
//!   interrupt behavior, concurrency group, and an optional cleanup hook
//! - [`TaskContext`] — the per-task yield handle
//!   (checkpoint / wait_for / delegate)
//! - [`TaskHandle`] — awaitable completion handle returned by `queue_task`
//! - [`TaskPriority`], [`TaskInterruptBehavior`], [`TaskGroup`], [`TaskInfo`]
//!
//! The internal signal protocol lives in `signal` and is shared with the
//! scheduler core.

mod context;
mod handle;
mod signal;
mod spec;

pub use context::TaskContext;
pub use handle::TaskHandle;
pub use spec::{TaskGroup, TaskInfo, TaskInterruptBehavior, TaskPriority, TaskSpec};

pub(crate) use signal::{panic_reason, Signal, SignalSender, Step, TaskId};
pub(crate) use spec::{BodyFactory, CleanupFn, RawSpec};
