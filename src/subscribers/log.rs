//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format:
//!
//! ```text
//! [queued] task=ping
//! [starting] task=ping
//! [yielded] task=ping
//! [waiting] task=ping
//! [failed] task=ping reason="task failed: boom"
//! [removed] task=ping reason="task was removed"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Not intended for production use —
/// implement a custom [`Subscribe`] for structured logging or metrics.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("<anonymous>");
        match e.kind {
            EventKind::SchedulerStarted => println!("[started]"),
            EventKind::SchedulerStopped => println!("[stopped]"),
            EventKind::TaskQueued => println!("[queued] task={task}"),
            EventKind::TaskStarting => println!("[starting] task={task}"),
            EventKind::TaskYielded => println!("[yielded] task={task}"),
            EventKind::TaskWaiting => println!("[waiting] task={task}"),
            EventKind::TaskDelegated => println!("[delegated] task={task}"),
            EventKind::TaskRestarted => println!("[restarted] task={task}"),
            EventKind::TaskCompleted => println!("[completed] task={task}"),
            EventKind::TaskFailed => {
                println!("[failed] task={task} reason={:?}", e.reason)
            }
            EventKind::TaskRemoved => {
                println!("[removed] task={task} reason={:?}", e.reason)
            }
            EventKind::CleanupFailed => {
                println!("[cleanup-failed] task={task} reason={:?}", e.reason)
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
