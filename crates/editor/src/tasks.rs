use std::collections::VecDeque;

/// Work deferred to the end of the current event, after the surface has
/// settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    RefreshToolbar,
    SmartScan,
    Reattach,
    /// Free detached nodes once they dominate the arena.
    Compact,
}

/// FIFO of deferred tasks. Scheduling a task that is already queued is a
/// no-op, so bursts of events collapse into one run.
#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: VecDeque<Task>,
}

impl TaskQueue {
    pub fn schedule(&mut self, task: Task) -> bool {
        if self.pending.contains(&task) {
            return false;
        }
        self.pending.push_back(task);
        true
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.pending.pop_front()
    }

    pub fn contains(&self, task: Task) -> bool {
        self.pending.contains(&task)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
