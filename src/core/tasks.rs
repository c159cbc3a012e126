//! Deferred work with a "not before" instant.
//!
//! A task is a suspended workflow. When it comes due the caller must check
//! its [`TaskGuard`] before acting: the session or panel it was scheduled for
//! may have gone away while it waited.

use std::cmp;
use std::collections::{BinaryHeap, VecDeque};
use std::time::Instant;

use crate::panels::Generation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Apply the configured default inventory size
    ApplyDefaultQuantity,
    /// Populate the item catalog ahead of first use
    WarmCatalog,
}

/// What must still hold when the task resumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskGuard {
    Session(Generation),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredTask {
    pub action: DeferredAction,
    pub guard: TaskGuard,
}

#[derive(Debug)]
struct QueuedTask {
    not_before: Instant,
    id: u64,
    task: DeferredTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == cmp::Ordering::Equal
    }
}
impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Eq for QueuedTask {}
impl Ord for QueuedTask {
    // Reversed so the max-heap pops the earliest task first
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.not_before
            .cmp(&other.not_before)
            .then(self.id.cmp(&other.id))
            .reverse()
    }
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: BinaryHeap<QueuedTask>,
    next_id: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks due at the same instant run in submission order.
    pub fn enqueue_at(&mut self, task: DeferredTask, not_before: Instant) {
        self.tasks.push(QueuedTask {
            not_before,
            id: self.next_id,
            task,
        });
        self.next_id += 1;
    }

    pub fn retrieve_due(&mut self, now: Instant, dest_buf: &mut VecDeque<DeferredTask>) {
        while let Some(task) = self.tasks.peek() {
            if task.not_before > now {
                break;
            }
            if let Some(task) = self.tasks.pop() {
                dest_buf.push_back(task.task);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn task(action: DeferredAction) -> DeferredTask {
        DeferredTask {
            action,
            guard: TaskGuard::None,
        }
    }

    #[test]
    fn test_tasks_wait_until_due() {
        let start = Instant::now();
        let mut queue = TaskQueue::new();
        queue.enqueue_at(task(DeferredAction::WarmCatalog), start + Duration::from_secs(5));
        queue.enqueue_at(task(DeferredAction::ApplyDefaultQuantity), start + Duration::from_secs(2));

        let mut due = VecDeque::new();
        queue.retrieve_due(start + Duration::from_secs(1), &mut due);
        assert!(due.is_empty());
        assert_eq!(queue.len(), 2);

        queue.retrieve_due(start + Duration::from_secs(5), &mut due);
        assert_eq!(
            due.iter().map(|t| t.action).collect::<Vec<_>>(),
            vec![DeferredAction::ApplyDefaultQuantity, DeferredAction::WarmCatalog]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_instant_keeps_submission_order() {
        let at = Instant::now();
        let mut queue = TaskQueue::new();
        for generation in 1..=3 {
            queue.enqueue_at(
                DeferredTask {
                    action: DeferredAction::ApplyDefaultQuantity,
                    guard: TaskGuard::Session(Generation::from_raw(generation)),
                },
                at,
            );
        }

        let mut due = VecDeque::new();
        queue.retrieve_due(at, &mut due);
        let guards: Vec<TaskGuard> = due.iter().map(|t| t.guard).collect();
        assert_eq!(
            guards,
            (1..=3)
                .map(|g| TaskGuard::Session(Generation::from_raw(g)))
                .collect::<Vec<_>>()
        );
    }
}
