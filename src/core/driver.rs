//! # The scheduler run loop.
//!
//! The driver owns the [`Registry`] and serializes everything: commands from
//! [`TaskScheduler`](crate::TaskScheduler) handles, suspension signals from
//! task bodies, and settlement signals from watchers all arrive on channels
//! consumed by a single loop. No locks, no shared mutable state.
//!
//! ```text
//!  TaskScheduler ──commands──▶ ┌────────┐ ──spawn──▶ task bodies
//!                              │ driver │ ◀─signals── (checkpoint/wait/
//!  watchers ──────settled────▶ └────────┘              delegate/finished)
//!                                   │
//!                                   └──▶ Bus (events)
//! ```
//!
//! ## Stepping
//!
//! While running, the driver repeatedly asks the policy for the next task and
//! *steps* it: the stored continuation is granted, the body runs until its
//! next suspension, and the resulting signal ends the step. Commands that
//! arrive mid-step are either applied immediately (queue/start) or deferred
//! to the end of the step (stop/remove), so removal and stop only take effect
//! at control points.
//!
//! ## Cancellation
//!
//! Every task owns a child token of the driver's root token. Discarding a
//! continuation (removal, `Restart` preemption) cancels the child token,
//! which drops the spawned body and any watcher without running them further.
//! When the last scheduler handle is dropped the command channel closes, the
//! loop exits, and the root token cancels everything still in flight.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::policy;
use crate::core::registry::{Registry, ResumePoint, TaskState};
use crate::error::{SchedulerError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{
    panic_reason, RawSpec, Signal, SignalSender, Step, TaskContext, TaskId, TaskInfo,
    TaskInterruptBehavior,
};

/// Requests sent from scheduler handles to the driver.
pub(crate) enum Command {
    Queue {
        spec: RawSpec,
        completion: oneshot::Sender<Step>,
    },
    Start,
    Stop {
        done: oneshot::Sender<()>,
    },
    Remove {
        // Sync as well: the reference is held across cleanup awaits inside
        // the spawned driver future.
        predicate: Box<dyn Fn(&TaskInfo) -> bool + Send + Sync>,
        error: Option<TaskError>,
        done: oneshot::Sender<Result<(), SchedulerError>>,
    },
}

/// Outcome of granting a stored continuation.
enum Grant {
    /// First step: the body must be spawned.
    Spawn,
    /// Resume grant delivered; the body is running.
    Granted,
    /// The parked body is gone without having finished.
    Dead,
}

pub(crate) struct Driver {
    registry: Registry,
    commands: mpsc::UnboundedReceiver<Command>,
    signals: mpsc::UnboundedReceiver<(TaskId, Signal)>,
    /// Kept so `signals.recv()` never observes channel closure; cloned into
    /// every spawned body and watcher.
    signal_tx: SignalSender,
    bus: Bus,
    root: CancellationToken,
    running: bool,
    closed: bool,
    /// The task that was given control most recently and has not reached a
    /// terminal state. Drives `Forbidden` pinning, `Restart` preemption and
    /// the cleanup ordering of `remove_tasks`.
    current: Option<TaskId>,
    /// Stop/remove commands received mid-step, applied at the next control
    /// point.
    deferred: VecDeque<Command>,
}

impl Driver {
    pub(crate) fn new(commands: mpsc::UnboundedReceiver<Command>, bus: Bus) -> Self {
        let (signal_tx, signals) = mpsc::unbounded_channel();
        Self {
            registry: Registry::new(),
            commands,
            signals,
            signal_tx,
            bus,
            root: CancellationToken::new(),
            running: false,
            closed: false,
            current: None,
            deferred: VecDeque::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            if self.closed {
                break;
            }
            if self.running {
                if let Some(id) = self.select_next() {
                    self.step(id).await;
                    self.apply_deferred().await;
                    continue;
                }
            }
            // Idle: nothing selectable. Wake on a command or a settlement.
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.apply_command(cmd).await,
                    None => break,
                },
                sig = self.signals.recv() => {
                    if let Some((id, Signal::Settled(step))) = sig {
                        self.deliver(id, step);
                    }
                }
            }
        }
        // All remaining bodies and watchers die here; unsettled completion
        // channels close, so outstanding handles observe `Shutdown`.
        self.root.cancel();
    }

    /// Consults the policy, applying `Restart` preemption if the choice
    /// switches away from a restartable paused task.
    fn select_next(&mut self) -> Option<TaskId> {
        let views = self.registry.views();
        let next = policy::next_task(&views, self.current)?;
        self.note_preemption(next);
        Some(next)
    }

    /// Switching away from a started `Restart` task paused at a checkpoint
    /// discards its continuation; the body reruns from the top when the task
    /// is next selected.
    fn note_preemption(&mut self, next: TaskId) {
        let Some(cur) = self.current else { return };
        if cur == next {
            return;
        }
        let Some(entry) = self.registry.get_mut(cur) else { return };
        // Only a pause at a checkpoint counts as preemption. A task that is
        // Pending because its wait settled (or its delegation was rejected)
        // resumes with the stored value intact.
        if entry.info.interrupt == TaskInterruptBehavior::Restart
            && matches!(entry.resume, ResumePoint::Checkpoint(_))
        {
            entry.discard_continuation(&self.root);
            let label = entry.info.label().to_string();
            self.current = None;
            self.bus
                .publish(Event::now(EventKind::TaskRestarted).with_task(label));
        }
    }

    /// Runs one step of `id`: grants the stored continuation, then consumes
    /// signals and commands until the task suspends or finishes.
    async fn step(&mut self, id: TaskId) {
        let grant = {
            let Some(entry) = self.registry.get_mut(id) else { return };
            match std::mem::replace(&mut entry.resume, ResumePoint::Running) {
                ResumePoint::NotStarted => {
                    entry.state = TaskState::Active;
                    entry.started = true;
                    entry.ran = true;
                    entry.resumed = false;
                    Grant::Spawn
                }
                ResumePoint::Checkpoint(grant) => {
                    entry.state = TaskState::Active;
                    entry.resumed = false;
                    if grant.send(()).is_ok() { Grant::Granted } else { Grant::Dead }
                }
                ResumePoint::Ready(grant, step) => {
                    entry.state = TaskState::Active;
                    entry.resumed = false;
                    if grant.send(step).is_ok() { Grant::Granted } else { Grant::Dead }
                }
                // Not selectable; the policy never picks these.
                other => {
                    entry.resume = other;
                    return;
                }
            }
        };
        match grant {
            Grant::Spawn => self.spawn_body(id),
            Grant::Granted => {}
            Grant::Dead => {
                self.settle(id, Err(TaskError::Fatal { error: "task body was dropped".into() }));
                return;
            }
        }
        self.current = Some(id);
        self.await_step_end(id).await;
    }

    /// Invokes the body factory and spawns the body under the task's token.
    fn spawn_body(&mut self, id: TaskId) {
        let label = {
            let Some(entry) = self.registry.get_mut(id) else { return };
            let ctx = TaskContext::new(id, self.signal_tx.clone());
            let fut = (entry.body)(ctx);
            let token = entry.cancel.clone();
            let tx = self.signal_tx.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    out = AssertUnwindSafe(fut).catch_unwind() => {
                        let step = out.unwrap_or_else(|payload| {
                            Err(TaskError::Fatal { error: panic_reason(payload.as_ref()) })
                        });
                        let _ = tx.send((id, Signal::Finished(step)));
                    }
                }
            });
            entry.info.label().to_string()
        };
        self.bus
            .publish(Event::now(EventKind::TaskStarting).with_task(label));
    }

    /// Waits for the step-ending signal from `id`, handling unrelated traffic
    /// (settlements, queue/start) as it arrives and deferring stop/remove.
    async fn await_step_end(&mut self, id: TaskId) {
        loop {
            tokio::select! {
                sig = self.signals.recv() => {
                    let Some((sid, sig)) = sig else { return };
                    match sig {
                        Signal::Settled(step) => self.deliver(sid, step),
                        sig if sid == id => {
                            self.finish_step(id, sig);
                            return;
                        }
                        // Stale signal from a discarded body.
                        _ => {}
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Queue { spec, completion }) => {
                        self.register(spec, Some(completion), None);
                    }
                    Some(Command::Start) => self.do_start(),
                    Some(cmd) => self.deferred.push_back(cmd),
                    None => {
                        // Abandon the step; run() tears everything down.
                        self.closed = true;
                        return;
                    }
                },
            }
        }
    }

    /// Applies the step-ending suspension (or completion) of `id`.
    fn finish_step(&mut self, id: TaskId, sig: Signal) {
        match sig {
            Signal::Checkpoint { resume } => {
                let label = {
                    let Some(entry) = self.registry.get_mut(id) else { return };
                    entry.state = TaskState::Pending;
                    entry.resume = ResumePoint::Checkpoint(resume);
                    entry.info.label().to_string()
                };
                self.bus
                    .publish(Event::now(EventKind::TaskYielded).with_task(label));
            }
            Signal::Wait { future, resume } => {
                let (token, label) = {
                    let Some(entry) = self.registry.get_mut(id) else { return };
                    entry.state = TaskState::Waiting;
                    entry.resume = ResumePoint::Awaiting(resume);
                    (entry.cancel.clone(), entry.info.label().to_string())
                };
                self.spawn_watcher(id, future, token);
                self.bus
                    .publish(Event::now(EventKind::TaskWaiting).with_task(label));
            }
            Signal::Delegate { spec, resume } => self.delegate(id, spec, resume),
            Signal::Finished(step) => self.settle(id, step),
            // Settled is routed through `deliver`, never here.
            Signal::Settled(step) => self.deliver(id, step),
        }
    }

    /// Watches an awaited future on behalf of a `Waiting` task and reports
    /// its settlement. Panics in the future settle the wait with a fatal
    /// error; cancellation via the task token drops the future silently.
    fn spawn_watcher(&self, id: TaskId, future: BoxFuture<'static, Step>, token: CancellationToken) {
        let tx = self.signal_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                out = AssertUnwindSafe(future).catch_unwind() => {
                    let step = out.unwrap_or_else(|payload| {
                        Err(TaskError::Fatal { error: panic_reason(payload.as_ref()) })
                    });
                    let _ = tx.send((id, Signal::Settled(step)));
                }
            }
        });
    }

    /// Handles a delegation request from `parent`.
    fn delegate(&mut self, parent: TaskId, spec: RawSpec, resume: oneshot::Sender<Step>) {
        let parent_priority = match self.registry.get(parent) {
            Some(entry) => entry.info.priority,
            None => return,
        };
        if spec.info.priority < parent_priority {
            // Rejected at the yield point; the parent stays schedulable and
            // receives the error on its next step. No deprioritization: it
            // never left Pending for Waiting.
            let err = TaskError::LowerPriority { child: spec.info.label().to_string() };
            if let Some(entry) = self.registry.get_mut(parent) {
                entry.state = TaskState::Pending;
                entry.resume = ResumePoint::Ready(resume, Err(err));
            }
            return;
        }
        let parent_label = {
            let Some(entry) = self.registry.get_mut(parent) else { return };
            entry.state = TaskState::Waiting;
            entry.resume = ResumePoint::Awaiting(resume);
            entry.info.label().to_string()
        };
        self.register(spec, None, Some(parent));
        self.bus
            .publish(Event::now(EventKind::TaskWaiting).with_task(parent_label));
    }

    /// Registers a task. Top-level tasks carry a completion channel for their
    /// handle; delegated children route their result to the parent instead.
    fn register(
        &mut self,
        spec: RawSpec,
        completion: Option<oneshot::Sender<Step>>,
        parent: Option<TaskId>,
    ) -> TaskId {
        let kind = if parent.is_some() { EventKind::TaskDelegated } else { EventKind::TaskQueued };
        let label = spec.info.label().to_string();
        let token = self.root.child_token();
        let id = self.registry.insert(spec, completion, parent, token);
        self.bus.publish(Event::now(kind).with_task(label));
        id
    }

    /// Makes a `Waiting` task resumable with the settled step value.
    ///
    /// Ignores tasks that are gone or no longer waiting (stale watcher
    /// signals after a removal race are benign; ids are never reused).
    fn deliver(&mut self, id: TaskId, step: Step) {
        let Some(entry) = self.registry.get_mut(id) else { return };
        if entry.state != TaskState::Waiting {
            return;
        }
        match std::mem::replace(&mut entry.resume, ResumePoint::Running) {
            ResumePoint::Awaiting(grant) => {
                entry.resume = ResumePoint::Ready(grant, step);
                entry.state = TaskState::Pending;
                entry.resumed = true;
            }
            other => entry.resume = other,
        }
    }

    /// Finalizes a task that reached a terminal state: publishes the outcome
    /// and routes the result to the parent delegation or the caller's handle.
    fn settle(&mut self, id: TaskId, step: Step) {
        let Some(mut entry) = self.registry.remove(id) else { return };
        if self.current == Some(id) {
            self.current = None;
        }
        entry.cancel.cancel();
        let label = entry.info.label().to_string();
        match &step {
            Ok(_) => self
                .bus
                .publish(Event::now(EventKind::TaskCompleted).with_task(label)),
            Err(err) => self.bus.publish(
                Event::now(EventKind::TaskFailed)
                    .with_task(label)
                    .with_reason(err.to_string()),
            ),
        }
        if let Some(parent) = entry.parent {
            self.deliver(parent, step);
        } else if let Some(tx) = entry.completion.take() {
            let _ = tx.send(step);
        }
    }

    async fn apply_deferred(&mut self) {
        while let Some(cmd) = self.deferred.pop_front() {
            self.apply_command(cmd).await;
        }
    }

    async fn apply_command(&mut self, cmd: Command) {
        match cmd {
            Command::Queue { spec, completion } => {
                self.register(spec, Some(completion), None);
            }
            Command::Start => self.do_start(),
            Command::Stop { done } => {
                if self.running {
                    self.running = false;
                    self.bus.publish(Event::now(EventKind::SchedulerStopped));
                }
                let _ = done.send(());
            }
            Command::Remove { predicate, error, done } => {
                let res = self.remove_matching(predicate.as_ref(), error).await;
                let _ = done.send(res);
            }
        }
    }

    fn do_start(&mut self) {
        if !self.running {
            self.running = true;
            self.bus.publish(Event::now(EventKind::SchedulerStarted));
        }
    }

    /// Cancels every task whose [`TaskInfo`] matches the predicate, plus all
    /// of their delegated descendants.
    ///
    /// - never-started tasks settle immediately, without cleanup;
    /// - started tasks are cancelled and their cleanup hooks awaited in
    ///   registration order, except that the task holding control goes last;
    /// - a removed child fails its parent's pending delegation with the
    ///   removal error (unless the parent is being removed too).
    ///
    /// Cleanup failures don't abort the sweep; they are collected into
    /// [`SchedulerError::CleanupFailed`].
    async fn remove_matching(
        &mut self,
        predicate: &(dyn Fn(&TaskInfo) -> bool + Send + Sync),
        error: Option<TaskError>,
    ) -> Result<(), SchedulerError> {
        let removal = error.unwrap_or(TaskError::Removed);

        let mut matched: Vec<TaskId> = self
            .registry
            .iter()
            .filter(|e| predicate(&e.info))
            .map(|e| e.id)
            .collect();

        // Cancellation cascades to delegated descendants.
        loop {
            let more: Vec<TaskId> = self
                .registry
                .iter()
                .filter(|e| !matched.contains(&e.id))
                .filter(|e| e.parent.is_some_and(|p| matched.contains(&p)))
                .map(|e| e.id)
                .collect();
            if more.is_empty() {
                break;
            }
            matched.extend(more);
        }
        if matched.is_empty() {
            return Ok(());
        }
        matched.sort();

        // Surviving parents see their delegation fail with the removal error.
        let orphaned_parents: Vec<TaskId> = matched
            .iter()
            .filter_map(|id| self.registry.get(*id).and_then(|e| e.parent))
            .filter(|p| !matched.contains(p))
            .collect();
        for parent in orphaned_parents {
            self.deliver(parent, Err(removal.clone()));
        }

        // A rewound Restart task still ran; its cleanup must not be skipped.
        let (started, unstarted): (Vec<TaskId>, Vec<TaskId>) = matched
            .into_iter()
            .partition(|id| self.registry.get(*id).is_some_and(|e| e.ran));

        for id in unstarted {
            self.discard(id, &removal);
        }

        // Registration order, with the task holding control cleaned up last.
        let mut ordered = started;
        if let Some(cur) = self.current {
            if let Some(pos) = ordered.iter().position(|id| *id == cur) {
                let cur = ordered.remove(pos);
                ordered.push(cur);
            }
        }

        let mut failed: Vec<String> = Vec::new();
        for id in ordered {
            let Some(mut entry) = self.registry.remove(id) else { continue };
            if self.current == Some(id) {
                self.current = None;
            }
            entry.cancel.cancel();
            let label = entry.info.label().to_string();
            if let Some(cleanup) = entry.cleanup.take() {
                match AssertUnwindSafe(cleanup()).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        self.bus.publish(
                            Event::now(EventKind::CleanupFailed)
                                .with_task(label.as_str())
                                .with_reason(err.to_string()),
                        );
                        failed.push(label.clone());
                    }
                    Err(payload) => {
                        self.bus.publish(
                            Event::now(EventKind::CleanupFailed)
                                .with_task(label.as_str())
                                .with_reason(panic_reason(payload.as_ref())),
                        );
                        failed.push(label.clone());
                    }
                }
            }
            if let Some(tx) = entry.completion.take() {
                let _ = tx.send(Err(removal.clone()));
            }
            self.bus.publish(
                Event::now(EventKind::TaskRemoved)
                    .with_task(label.as_str())
                    .with_reason(removal.to_string()),
            );
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(SchedulerError::CleanupFailed { tasks: failed })
        }
    }

    /// Removes a never-started task: no body, no cleanup, immediate rejection.
    fn discard(&mut self, id: TaskId, removal: &TaskError) {
        let Some(mut entry) = self.registry.remove(id) else { return };
        entry.cancel.cancel();
        let label = entry.info.label().to_string();
        if let Some(tx) = entry.completion.take() {
            let _ = tx.send(Err(removal.clone()));
        }
        self.bus.publish(
            Event::now(EventKind::TaskRemoved)
                .with_task(label)
                .with_reason(removal.to_string()),
        );
    }
}
