//! # Caller-facing scheduler handle.
//!
//! [`TaskScheduler`] is a cheap, cloneable handle to a driver task spawned at
//! construction. All mutation goes through a command channel, so the handle
//! can be shared freely across tasks and threads; the driver serializes
//! everything.
//!
//! Dropping the last handle closes the command channel: the driver exits and
//! cancels every body, watcher, and cleanup still in flight, and unsettled
//! [`TaskHandle`](crate::TaskHandle)s reject with
//! [`TaskError::Shutdown`](crate::TaskError::Shutdown).

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::SchedulerConfig;
use crate::core::driver::{Command, Driver};
use crate::error::{SchedulerError, TaskError};
use crate::events::{Bus, Event};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{TaskHandle, TaskInfo, TaskSpec};

/// Handle to a priority-preemptive cooperative task scheduler.
///
/// Tasks can be queued at any time; they only execute between
/// [`start`](TaskScheduler::start) and [`stop`](TaskScheduler::stop).
/// Exactly one task body makes progress at a time, and control only changes
/// hands at the yield points of [`TaskContext`](crate::TaskContext).
#[derive(Clone)]
pub struct TaskScheduler {
    commands: mpsc::UnboundedSender<Command>,
    bus: Bus,
}

impl TaskScheduler {
    /// Creates a scheduler with default configuration and no subscribers.
    ///
    /// Must be called within a tokio runtime; the driver is spawned here.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default(), Vec::new())
    }

    /// Creates a scheduler with the given configuration and subscribers.
    ///
    /// Subscribers receive every [`Event`] through a [`SubscriberSet`]
    /// (per-subscriber bounded queues; a slow subscriber drops events rather
    /// than stalling the driver). Must be called within a tokio runtime.
    pub fn with_config(config: SchedulerConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(config.bus_capacity);

        if !subscribers.is_empty() {
            let set = SubscriberSet::new(subscribers);
            let mut rx = bus.subscribe();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }

        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(Driver::new(rx, bus.clone()).run());

        Self { commands, bus }
    }

    /// Starts driving queued tasks. Idempotent; returns immediately.
    pub fn start(&self) {
        let _ = self.commands.send(Command::Start);
    }

    /// Stops driving tasks and waits for the in-flight step (if any) to reach
    /// its next yield point. Queued and paused tasks are frozen in place, not
    /// cancelled; `start` resumes them.
    pub async fn stop(&self) {
        let (done, stopped) = oneshot::channel();
        if self.commands.send(Command::Stop { done }).is_ok() {
            let _ = stopped.await;
        }
    }

    /// Queues a task for execution and returns its completion handle.
    ///
    /// Tasks may be queued before `start` and keep accumulating while the
    /// scheduler is stopped. Dropping the handle detaches it without
    /// cancelling the task.
    pub fn queue_task<T: Send + 'static>(&self, spec: TaskSpec<T>) -> TaskHandle<T> {
        let (completion, rx) = oneshot::channel();
        let _ = self.commands.send(Command::Queue { spec: spec.erase(), completion });
        TaskHandle::new(rx)
    }

    /// Cancels every task whose [`TaskInfo`] matches the predicate, plus
    /// their delegated descendants.
    ///
    /// Matched tasks settle with `error`, or [`TaskError::Removed`] when
    /// `None`. Removal takes effect at the next control point: never-started
    /// tasks vanish without cleanup, started tasks have their cleanup hooks
    /// awaited (registration order, the task currently holding control last).
    /// Cleanup failures are collected into
    /// [`SchedulerError::CleanupFailed`]; the removal itself still happens.
    pub async fn remove_tasks<P>(
        &self,
        predicate: P,
        error: Option<TaskError>,
    ) -> Result<(), SchedulerError>
    where
        P: Fn(&TaskInfo) -> bool + Send + Sync + 'static,
    {
        let (done, removed) = oneshot::channel();
        let cmd = Command::Remove { predicate: Box::new(predicate), error, done };
        if self.commands.send(cmd).is_err() {
            // Driver already gone; there is nothing left to remove.
            return Ok(());
        }
        removed.await.unwrap_or(Ok(()))
    }

    /// Subscribes to the raw event stream (alternative to [`Subscribe`]
    /// implementations passed at construction).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }
}

impl Default for TaskScheduler {
    /// Same as [`TaskScheduler::new`]; requires a tokio runtime.
    fn default() -> Self {
        Self::new()
    }
}
