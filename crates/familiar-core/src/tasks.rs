//! Delayed and repeating tasks scheduled by a companion's hooks.
//!
//! Tasks count host ticks and belong to one companion; they are dropped when
//! it is dismissed or switches behavior.

use std::fmt;

use crate::behavior::TaskHook;

/// Pending tasks one companion may hold at once.
pub const MAX_TASKS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

struct ScheduledTask {
    id: TaskId,
    remaining_ticks: u64,
    /// `None` = one-shot, `Some(n)` = repeating every `n` ticks.
    interval: Option<u64>,
    hook: TaskHook,
}

/// The task queue of one companion.
#[derive(Default)]
pub struct TaskQueue {
    tasks: Vec<ScheduledTask>,
    next_id: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` after `delay_ticks` host ticks (at least one). Returns
    /// `None` when the queue is full.
    pub fn schedule_delayed(&mut self, delay_ticks: u64, hook: TaskHook) -> Option<TaskId> {
        self.push(delay_ticks, None, hook)
    }

    /// Run `hook` after `delay_ticks`, then every `interval_ticks` (both at least one).
    pub fn schedule_repeating(&mut self, delay_ticks: u64, interval_ticks: u64, hook: TaskHook) -> Option<TaskId> {
        self.push(delay_ticks, Some(interval_ticks.max(1)), hook)
    }

    fn push(&mut self, delay_ticks: u64, interval: Option<u64>, hook: TaskHook) -> Option<TaskId> {
        if self.tasks.len() >= MAX_TASKS {
            return None;
        }
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.tasks.push(ScheduledTask {
            id,
            remaining_ticks: delay_ticks.max(1),
            interval,
            hook,
        });
        Some(id)
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advance one host tick and return the tasks that fired, in scheduling
    /// order. One-shot tasks leave the queue; repeating ones are re-armed.
    pub fn tick(&mut self) -> Vec<(TaskId, TaskHook)> {
        let mut fired = Vec::new();
        for task in &mut self.tasks {
            if task.remaining_ticks > 0 {
                task.remaining_ticks -= 1;
            }
            if task.remaining_ticks == 0 {
                fired.push((task.id, task.hook.clone()));
                if let Some(interval) = task.interval {
                    task.remaining_ticks = interval;
                }
            }
        }
        self.tasks.retain(|t| t.remaining_ticks > 0);
        fired
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tasks.iter().map(|t| t.id)).finish()
    }
}
