//! # Task descriptors.
//!
//! [`TaskSpec`] bundles a resumable task body with the scheduling metadata
//! the engine needs: priority, interrupt behavior, an optional concurrency
//! group, an optional name, and an optional async cleanup hook invoked on
//! forced termination.
//!
//! The body is a *factory*: a closure invoked with a fresh
//! [`TaskContext`](crate::TaskContext) each time the body is (re-)started.
//! Re-invocation only happens for [`TaskInterruptBehavior::Restart`] tasks
//! that were actually preempted.
//!
//! ## Example
//! ```
//! use taskloom::{TaskError, TaskGroup, TaskPriority, TaskSpec};
//!
//! let spec = TaskSpec::new(TaskPriority::Normal, |ctx| async move {
//!     ctx.checkpoint().await;
//!     Ok::<_, TaskError>(42)
//! })
//! .with_name("answer")
//! .with_group(TaskGroup::new("serial-port"));
//!
//! assert_eq!(spec.info().name.as_deref(), Some("answer"));
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::TaskError;
use crate::tasks::context::TaskContext;
use crate::tasks::signal::Step;

/// Task priority, ordered `High > Normal > Low > Idle`.
///
/// The scheduler is strict-priority: outstanding work at a higher level
/// blocks Pending work at lower levels (starvation by design).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPriority {
    /// Urgent operations that jump ahead of everything else.
    High,
    /// Routine operations.
    Normal,
    /// Deferrable operations.
    Low,
    /// Background work that only runs when nothing else is outstanding.
    Idle,
}

impl TaskPriority {
    fn rank(self) -> u8 {
        match self {
            TaskPriority::High => 3,
            TaskPriority::Normal => 2,
            TaskPriority::Low => 1,
            TaskPriority::Idle => 0,
        }
    }
}

impl PartialOrd for TaskPriority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskPriority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// How a task reacts to preemption at its interrupt checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskInterruptBehavior {
    /// The task may be preempted; it later resumes exactly where it left off.
    #[default]
    Default,
    /// Once started, the task is never switched away from at a checkpoint; it
    /// runs to completion or to a Waiting suspension uninterrupted.
    Forbidden,
    /// Like `Default`, but an actual preemption discards the continuation and
    /// the body is re-invoked from the beginning at next selection.
    Restart,
}

/// A named mutual-exclusion domain.
///
/// At most one member task of a group is started (Active/Waiting/resumable)
/// at a time; group exclusivity dominates priority.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskGroup {
    /// Opaque group identifier.
    pub id: Cow<'static, str>,
}

impl TaskGroup {
    /// Creates a group with the given identifier.
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self { id: id.into() }
    }
}

/// Immutable snapshot of a task's descriptor metadata.
///
/// Passed to `remove_tasks` predicates and attached to events.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Human-readable name, if any.
    pub name: Option<Cow<'static, str>>,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Preemption behavior.
    pub interrupt: TaskInterruptBehavior,
    /// Concurrency group, if any.
    pub group: Option<TaskGroup>,
}

impl TaskInfo {
    /// Returns the task name, or a placeholder for unnamed tasks.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

pub(crate) type BodyFactory = Box<dyn FnMut(TaskContext) -> BoxFuture<'static, Step> + Send>;
pub(crate) type CleanupFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), TaskError>> + Send>;

/// Descriptor for a suspendable task with result type `T`.
///
/// Built with [`TaskSpec::new`] and the `with_*` methods, then submitted via
/// [`TaskScheduler::queue_task`](crate::TaskScheduler::queue_task) or
/// [`TaskContext::delegate`](crate::TaskContext::delegate).
pub struct TaskSpec<T> {
    name: Option<Cow<'static, str>>,
    priority: TaskPriority,
    interrupt: TaskInterruptBehavior,
    group: Option<TaskGroup>,
    body: Box<dyn FnMut(TaskContext) -> BoxFuture<'static, Result<T, TaskError>> + Send>,
    cleanup: Option<CleanupFn>,
}

impl<T: Send + 'static> TaskSpec<T> {
    /// Creates a descriptor from a priority and a body factory.
    ///
    /// The factory receives the task's [`TaskContext`] and returns the body
    /// future. It is invoked once per (re-)start.
    pub fn new<F, Fut>(priority: TaskPriority, body: F) -> Self
    where
        F: FnMut(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let mut body = body;
        Self {
            name: None,
            priority,
            interrupt: TaskInterruptBehavior::default(),
            group: None,
            body: Box::new(move |ctx| body(ctx).boxed()),
            cleanup: None,
        }
    }

    /// Sets a human-readable name (used in events and removal predicates).
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the interrupt behavior (default: [`TaskInterruptBehavior::Default`]).
    pub fn with_interrupt(mut self, interrupt: TaskInterruptBehavior) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Assigns the task to a concurrency group.
    pub fn with_group(mut self, group: TaskGroup) -> Self {
        self.group = Some(group);
        self
    }

    /// Attaches an async cleanup hook, invoked (and awaited) when the task is
    /// forcibly terminated by `remove_tasks` after it has started.
    pub fn with_cleanup<C, Fut>(mut self, cleanup: C) -> Self
    where
        C: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.cleanup = Some(Box::new(move || cleanup().boxed()));
        self
    }

    /// Returns the descriptor metadata.
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            name: self.name.clone(),
            priority: self.priority,
            interrupt: self.interrupt,
            group: self.group.clone(),
        }
    }

    /// Erases the result type so the engine can store the descriptor.
    pub(crate) fn erase(self) -> RawSpec {
        let info = self.info();
        let mut body = self.body;
        RawSpec {
            info,
            body: Box::new(move |ctx| {
                body(ctx)
                    .map(|res| res.map(|value| Box::new(value) as Box<dyn Any + Send>))
                    .boxed()
            }),
            cleanup: self.cleanup,
        }
    }
}

/// Type-erased task descriptor as stored by the scheduler core.
pub(crate) struct RawSpec {
    pub(crate) info: TaskInfo,
    pub(crate) body: BodyFactory,
    pub(crate) cleanup: Option<CleanupFn>,
}
