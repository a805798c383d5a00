//! # The per-task yield handle.
//!
//! A [`TaskContext`] is handed to each body invocation and provides the three
//! suspension forms of the engine:
//!
//! - [`checkpoint`](TaskContext::checkpoint) — plain suspension (interrupt
//!   checkpoint);
//! - [`wait_for`](TaskContext::wait_for) — suspension on an arbitrary external
//!   future (the suspension adapter);
//! - [`delegate`](TaskContext::delegate) — suspension on a freshly created
//!   nested task.
//!
//! Every suspension parks the body on a resume channel; the scheduler grants
//! it only when the task is selected again, so step execution stays totally
//! ordered no matter what the body awaits in between.
//!
//! If the scheduler discards the continuation (task removed, `Restart`
//! preemption, scheduler dropped), the park never resolves; the body future is
//! cancelled through its task's cancellation token instead of observing an
//! error here.

use std::future::{pending, Future};

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::error::TaskError;
use crate::tasks::signal::{downcast_step, Signal, SignalSender, TaskId};
use crate::tasks::spec::TaskSpec;

/// Yield handle for one task body invocation.
///
/// Cheap to use but deliberately not `Clone`: a task has exactly one
/// suspension stream, and concurrent suspensions from the same body are a
/// protocol violation.
pub struct TaskContext {
    id: TaskId,
    signals: SignalSender,
}

impl TaskContext {
    pub(crate) fn new(id: TaskId, signals: SignalSender) -> Self {
        Self { id, signals }
    }

    /// Plain suspension: an interrupt checkpoint.
    ///
    /// Control returns to the scheduler; the body resumes here when the task
    /// is next selected. Between checkpoints the body cannot be preempted.
    pub async fn checkpoint(&self) {
        let (grant, granted) = oneshot::channel();
        if self
            .signals
            .send((self.id, Signal::Checkpoint { resume: grant }))
            .is_err()
        {
            pending::<()>().await;
        }
        if granted.await.is_err() {
            // Continuation discarded; park until the body is cancelled.
            pending::<()>().await;
        }
    }

    /// Suspension adapter: suspends on an arbitrary external future.
    ///
    /// The task sits in `Waiting` until the future settles, then becomes
    /// resumable and receives the settled value here once selected. While it
    /// waits, equal-or-higher-priority tasks may run; lower-priority Pending
    /// work stays blocked per the strict-priority rules.
    ///
    /// Returns `Err(TaskError::Fatal)` only if the awaited future panicked;
    /// propagate it with `?` to fail the task.
    pub async fn wait_for<F>(&self, awaitable: F) -> Result<F::Output, TaskError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (grant, granted) = oneshot::channel();
        let future = awaitable
            .map(|value| Ok(Box::new(value) as Box<dyn std::any::Any + Send>))
            .boxed();
        if self
            .signals
            .send((self.id, Signal::Wait { future, resume: grant }))
            .is_err()
        {
            pending::<()>().await;
        }
        match granted.await {
            Ok(step) => step.and_then(downcast_step::<F::Output>),
            Err(_) => pending().await,
        }
    }

    /// Delegation: suspends on a freshly created nested task.
    ///
    /// The child must have equal or higher priority than this task; a
    /// strictly lower priority fails immediately with
    /// [`TaskError::LowerPriority`] at this yield point. Otherwise the task
    /// waits until the child reaches a terminal state and receives the
    /// child's return value, or its error re-raised here.
    ///
    /// A child sharing this task's own concurrency group can never run (the
    /// parent occupies the group slot while waiting); delegate into a
    /// different group or none.
    pub async fn delegate<T: Send + 'static>(&self, spec: TaskSpec<T>) -> Result<T, TaskError> {
        let (grant, granted) = oneshot::channel();
        let spec = spec.erase();
        if self
            .signals
            .send((self.id, Signal::Delegate { spec, resume: grant }))
            .is_err()
        {
            pending::<()>().await;
        }
        match granted.await {
            Ok(step) => step.and_then(downcast_step::<T>),
            Err(_) => pending().await,
        }
    }
}
