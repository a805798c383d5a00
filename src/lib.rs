//! # taskloom
//!
//! A priority-preemptive, cooperative task scheduler for async Rust.
//!
//! Exactly one task body makes progress at a time, and control only changes
//! hands at explicit yield points, so tasks can safely share a serial
//! resource (a device port, a protocol session) without locking. Preemption
//! is decided between steps by a strict-priority policy with concurrency
//! groups and FIFO tie-breaking; `remove_tasks` cancels tasks by predicate
//! with ordered async cleanup.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  queue_task / start / stop / remove_tasks
//! │ TaskScheduler │ ─────────────commands────────────┐
//! └───────────────┘                                  ▼
//!        │ subscribe                            ┌────────┐  grants steps  ┌────────┐
//!        ▼                                      │ driver │ ◀──signals──── │ bodies │
//! ┌───────────────┐          events             └────────┘                └────────┘
//! │ Bus ─► SubscriberSet ─► Subscribe impls │        │ policy: priority ▸ groups ▸ FIFO
//! └───────────────┘                                  ▼
//!                                               Registry (per-task state machine)
//! ```
//!
//! - **[`TaskSpec`]** describes a task: a resumable body plus priority,
//!   interrupt behavior, optional [`TaskGroup`], optional cleanup hook.
//! - **[`TaskContext`]** is the body's yield handle: `checkpoint()` for plain
//!   suspension, `wait_for()` to suspend on any future, `delegate()` to run a
//!   nested task in the parent's place.
//! - **[`TaskHandle`]** resolves with the body's result once the task
//!   reaches a terminal state.
//!
//! ## Scheduling rules
//!
//! 1. Higher priority wins; outstanding work (paused *or* waiting) at a
//!    higher level blocks lower-priority tasks entirely.
//! 2. A started member of a [`TaskGroup`] excludes all other members until it
//!    settles, regardless of priority.
//! 3. A task resuming from a wait ranks behind fresh tasks of equal priority
//!    for one selection round.
//! 4. Ties break by submission order.
//!
//! ## Example
//!
//! ```
//! use taskloom::{TaskError, TaskPriority, TaskScheduler, TaskSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), TaskError> {
//!     let scheduler = TaskScheduler::new();
//!     scheduler.start();
//!
//!     let handle = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, |ctx| async move {
//!         let left = 20;
//!         ctx.checkpoint().await; // higher-priority tasks may run here
//!         Ok::<_, TaskError>(left + 22)
//!     }));
//!
//!     assert_eq!(handle.await?, 42);
//!     scheduler.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature flags
//!
//! - `logging` — enables `LogWriter`, a stdout subscriber for quick
//!   debugging.

mod config;
mod core;
mod error;
mod events;
mod subscribers;
mod tasks;

pub use config::SchedulerConfig;
pub use core::TaskScheduler;
pub use error::{SchedulerError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    TaskContext, TaskGroup, TaskHandle, TaskInfo, TaskInterruptBehavior, TaskPriority, TaskSpec,
};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
