//! Task registry and per-task state.
//!
//! Each registered task is a [`TaskEntry`] holding the descriptor, the
//! life-cycle [`TaskState`], and the stored continuation ([`ResumePoint`])
//! the driver grants when the task is next selected. Entries live in a
//! `BTreeMap` keyed by [`TaskId`], so iteration order is registration order.

use std::collections::BTreeMap;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::policy::TaskView;
use crate::tasks::{BodyFactory, CleanupFn, RawSpec, Step, TaskId, TaskInfo};

/// Life-cycle state of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskState {
    /// Selectable: not yet started, paused at a checkpoint, or resumable
    /// after its awaited future settled.
    Pending,
    /// Currently executing a step (at most one task at a time).
    Active,
    /// Suspended on an external awaitable or on a delegated child; not
    /// selectable, but still counts as outstanding work for priority
    /// blocking and group occupancy.
    Waiting,
}

/// Where a task resumes when it is next granted a step.
pub(crate) enum ResumePoint {
    /// Body not yet invoked; the next step spawns it.
    NotStarted,
    /// Parked at a checkpoint.
    Checkpoint(oneshot::Sender<()>),
    /// Parked on an awaitable or a delegated child that has not settled yet.
    Awaiting(oneshot::Sender<Step>),
    /// Parked with the settled value already in hand; the next step delivers it.
    Ready(oneshot::Sender<Step>, Step),
    /// Placeholder while the task is mid-step.
    Running,
}

pub(crate) struct TaskEntry {
    pub(crate) id: TaskId,
    pub(crate) info: TaskInfo,
    pub(crate) body: BodyFactory,
    pub(crate) cleanup: Option<CleanupFn>,
    pub(crate) state: TaskState,
    /// The body has been invoked at least once since the last restart.
    pub(crate) started: bool,
    /// The body has been invoked at least once over the task's lifetime.
    /// Unlike `started`, a restart rewind does not reset it; removal uses it
    /// to decide whether the cleanup hook must run.
    pub(crate) ran: bool,
    /// The task just became resumable from `Waiting`; deprioritized against
    /// fresh tasks of equal priority until it runs again.
    pub(crate) resumed: bool,
    pub(crate) resume: ResumePoint,
    /// Settles the caller's [`TaskHandle`](crate::TaskHandle). `None` for
    /// delegated children, whose result is routed to the parent instead.
    pub(crate) completion: Option<oneshot::Sender<Step>>,
    pub(crate) parent: Option<TaskId>,
    /// Cancels the spawned body (and any watcher) of this task.
    pub(crate) cancel: CancellationToken,
}

impl TaskEntry {
    pub(crate) fn view(&self) -> TaskView {
        TaskView {
            id: self.id,
            priority: self.info.priority,
            interrupt: self.info.interrupt,
            group: self.info.group.clone(),
            state: self.state,
            started: self.started,
            resumed: self.resumed,
        }
    }

    /// Discards the stored continuation and rewinds the task to a fresh
    /// not-started state (restart-on-preemption). The old body is cancelled
    /// through its token; a new child token guards the next invocation.
    pub(crate) fn discard_continuation(&mut self, root: &CancellationToken) {
        self.cancel.cancel();
        self.cancel = root.child_token();
        self.resume = ResumePoint::NotStarted;
        self.state = TaskState::Pending;
        self.started = false;
        self.resumed = false;
    }
}

/// All registered, not-yet-terminal tasks, in registration order.
pub(crate) struct Registry {
    entries: BTreeMap<TaskId, TaskEntry>,
    next_id: u64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self { entries: BTreeMap::new(), next_id: 0 }
    }

    /// Registers a task and returns its id. Ids are never reused, so stale
    /// signals from discarded bodies can be dropped by id.
    pub(crate) fn insert(
        &mut self,
        spec: RawSpec,
        completion: Option<oneshot::Sender<Step>>,
        parent: Option<TaskId>,
        cancel: CancellationToken,
    ) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let RawSpec { info, body, cleanup } = spec;
        self.entries.insert(
            id,
            TaskEntry {
                id,
                info,
                body,
                cleanup,
                state: TaskState::Pending,
                started: false,
                ran: false,
                resumed: false,
                resume: ResumePoint::NotStarted,
                completion,
                parent,
                cancel,
            },
        );
        id
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<&TaskEntry> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskEntry> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> Option<TaskEntry> {
        self.entries.remove(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &TaskEntry> {
        self.entries.values()
    }

    pub(crate) fn views(&self) -> Vec<TaskView> {
        self.entries.values().map(TaskEntry::view).collect()
    }
}
