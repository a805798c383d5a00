//! Internal yield vocabulary shared between task contexts and the driver.
//!
//! A task body never runs unsupervised: every suspension sends a [`Signal`]
//! to the driver and parks on a resume channel that the driver grants only
//! when the task is selected again. Step results are type-erased
//! (`Box<dyn Any + Send>`) inside the engine and downcast at the typed edges
//! ([`TaskHandle`](crate::TaskHandle), `TaskContext::{wait_for, delegate}`).

use std::any::Any;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};

use crate::error::TaskError;
use crate::tasks::spec::RawSpec;

/// Stable identifier of a registered task.
///
/// Monotonically increasing; doubles as the FIFO submission order used by the
/// selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TaskId(pub(crate) u64);

/// Type-erased outcome of a task body or of an awaited future.
pub(crate) type Step = Result<Box<dyn Any + Send>, TaskError>;

/// A suspension signal emitted by a task body (or by a watcher on its behalf).
pub(crate) enum Signal {
    /// Plain suspension: an interrupt checkpoint. The task becomes `Pending`
    /// and resumes exactly here when the grant is sent.
    Checkpoint { resume: oneshot::Sender<()> },
    /// Suspension on an external awaitable. The driver spawns a watcher for
    /// the future; the settled value is delivered through `resume` when the
    /// task is next selected.
    Wait {
        future: BoxFuture<'static, Step>,
        resume: oneshot::Sender<Step>,
    },
    /// Delegation to a nested child task. The child's result (or error) is
    /// delivered through `resume` once the child reaches a terminal state.
    Delegate {
        spec: RawSpec,
        resume: oneshot::Sender<Step>,
    },
    /// The awaited future of a `Waiting` task settled (sent by its watcher,
    /// not by the body).
    Settled(Step),
    /// The body returned or failed.
    Finished(Step),
}

/// Channel on which bodies and watchers report signals to the driver.
pub(crate) type SignalSender = mpsc::UnboundedSender<(TaskId, Signal)>;

/// Recovers a typed value from an erased step result.
///
/// A mismatch is impossible by construction (the erasure and the downcast are
/// created as a pair); it degrades to a fatal error instead of panicking.
pub(crate) fn downcast_step<T: 'static>(value: Box<dyn Any + Send>) -> Result<T, TaskError> {
    value.downcast::<T>().map(|boxed| *boxed).map_err(|_| TaskError::Fatal {
        error: "task result type mismatch".into(),
    })
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
