//! Pure task-selection logic.
//!
//! Given a snapshot of all registered tasks, [`next_task`] decides which task
//! receives the next step. Rules, in order:
//!
//! 1. **Forbidden pin** — a started `Forbidden` task that is still Pending
//!    keeps the slot if it was the one running last; nothing may switch in.
//! 2. **Group exclusivity** — within a concurrency group, a started member
//!    (Active/Waiting/paused) excludes every other member from selection,
//!    regardless of priority.
//! 3. **Strict priority** — the highest priority among eligible outstanding
//!    tasks (Pending *and* Waiting) sets the bar; Pending tasks below the bar
//!    are blocked. Waiting tasks hold their priority level while suspended.
//! 4. **Resumed deprioritization** — among Pending tasks at the bar, tasks
//!    that just came back from Waiting rank behind fresh ones.
//! 5. **FIFO** — ties break by registration order.
//!
//! Returning `None` means no step can be taken right now (idle, everything
//! waiting, or blocked behind higher-priority suspended work).

use crate::core::registry::TaskState;
use crate::tasks::{TaskGroup, TaskId, TaskInterruptBehavior, TaskPriority};

/// Selection-relevant snapshot of one registered task.
pub(crate) struct TaskView {
    pub(crate) id: TaskId,
    pub(crate) priority: TaskPriority,
    pub(crate) interrupt: TaskInterruptBehavior,
    pub(crate) group: Option<TaskGroup>,
    pub(crate) state: TaskState,
    pub(crate) started: bool,
    pub(crate) resumed: bool,
}

pub(crate) fn next_task(tasks: &[TaskView], current: Option<TaskId>) -> Option<TaskId> {
    // An uninterruptible task keeps its slot across checkpoints.
    if let Some(cur) = current {
        if let Some(task) = tasks.iter().find(|t| t.id == cur) {
            if task.started
                && task.interrupt == TaskInterruptBehavior::Forbidden
                && task.state == TaskState::Pending
            {
                return Some(cur);
            }
        }
    }

    // A started group member occupies its group exclusively.
    let eligible = |t: &TaskView| match &t.group {
        None => true,
        Some(group) => {
            match tasks.iter().find(|o| o.started && o.group.as_ref() == Some(group)) {
                Some(occupant) => occupant.id == t.id,
                None => true,
            }
        }
    };

    // Waiting tasks hold the priority bar without being selectable.
    let bar = tasks.iter().filter(|t| eligible(t)).map(|t| t.priority).max()?;

    tasks
        .iter()
        .filter(|t| eligible(t) && t.priority == bar && t.state == TaskState::Pending)
        .min_by_key(|t| (t.resumed, t.id))
        .map(|t| t.id)
}
