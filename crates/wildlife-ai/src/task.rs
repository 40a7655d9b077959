//! Cooperative task bookkeeping.
//!
//! Every wait in the behavior core is a small value stored on the animal and
//! stepped once per tick. A task is identified by a `TaskId`; cancelling it
//! means dropping it from its slot. After a step the world only writes the
//! task back if the slot still holds the same id, so anything that replaced or
//! cancelled it mid-step wins.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Creates a task ID from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// A task together with its handle and the tick it was scheduled on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled<T> {
    /// Handle used for cancellation checks.
    pub id: TaskId,
    /// Tick during which the task was created; it first runs on the next one.
    pub scheduled_tick: u64,
    /// Task payload.
    pub task: T,
}

impl<T> Scheduled<T> {
    /// Returns whether the task may run during `tick`.
    #[must_use]
    pub fn is_due(&self, tick: u64) -> bool {
        tick > self.scheduled_tick
    }

    /// Keeps the handle but swaps the payload.
    #[must_use]
    pub fn with_task(self, task: T) -> Self {
        Self { task, ..self }
    }
}

/// Outcome of stepping a task once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step<T> {
    /// Suspend until the next tick with the updated payload.
    Yield(T),
    /// Task finished (or transitioned away and must not be written back).
    Done,
}

/// State handler tasks, one per behavior state that needs waiting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateTask {
    /// Idle: sleep until `wake_at`, then pick a wander destination.
    WaitToMove {
        /// Simulation time at which the wait ends.
        wake_at: f64,
    },
    /// Moving: poll until the destination is reached or the walk times out.
    WatchDestination {
        /// Simulation time the animal entered Moving.
        started_at: f64,
    },
}

impl StateTask {
    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::WaitToMove { .. } => "wait-to-move",
            Self::WatchDestination { .. } => "watch-destination",
        }
    }
}

/// Monotonic task handle allocator.
#[derive(Debug, Default)]
pub struct TaskIds {
    next: u64,
}

impl TaskIds {
    /// Allocates the next handle.
    pub fn allocate(&mut self) -> TaskId {
        self.next += 1;
        TaskId(self.next)
    }

    /// Number of handles handed out so far.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let mut ids = TaskIds::default();
        let a = ids.allocate();
        let b = ids.allocate();
        assert_ne!(a, b);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn test_task_waits_one_tick() {
        let scheduled = Scheduled {
            id: TaskId::new(1),
            scheduled_tick: 4,
            task: StateTask::WaitToMove { wake_at: 1.0 },
        };
        assert!(!scheduled.is_due(4));
        assert!(scheduled.is_due(5));
    }

    #[test]
    fn test_with_task_keeps_handle() {
        let scheduled = Scheduled {
            id: TaskId::new(9),
            scheduled_tick: 0,
            task: StateTask::WatchDestination { started_at: 0.0 },
        };
        let updated = scheduled.with_task(StateTask::WatchDestination { started_at: 2.0 });
        assert_eq!(updated.id, scheduled.id);
        assert_eq!(updated.task.label(), "watch-destination");
    }
}
