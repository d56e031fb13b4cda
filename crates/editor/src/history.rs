use std::collections::VecDeque;

use crate::config::HistoryConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub index: u64,
    pub snapshot: String,
}

/// Linear undo/redo over serialized snapshots. `current` always points at
/// the snapshot the surface shows; a push after undo drops the redo tail.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    current: usize,
    next_index: u64,
    config: HistoryConfig,
}

impl History {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            current: 0,
            next_index: 0,
            config,
        }
    }

    pub fn set_config(&mut self, config: HistoryConfig) {
        self.config = config;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the current snapshot within the retained entries.
    pub fn position(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.current)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.current < self.entries.len() - 1
    }

    /// Records a snapshot. Returns false when it equals the current one.
    pub fn push(&mut self, snapshot: impl Into<String>) -> bool {
        let snapshot = snapshot.into();
        if self
            .current()
            .is_some_and(|entry| entry.snapshot == snapshot)
        {
            return false;
        }

        if !self.entries.is_empty() {
            self.entries.truncate(self.current + 1);
        }

        let cap = self.config.cap_for(snapshot.chars().count());
        self.entries.push_back(HistoryEntry {
            index: self.next_index,
            snapshot,
        });
        self.next_index += 1;

        while self.entries.len() > cap {
            self.entries.pop_front();
        }
        self.current = self.entries.len() - 1;
        true
    }

    pub fn undo(&mut self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.current -= 1;
        self.entries.get(self.current).map(|e| e.snapshot.as_str())
    }

    pub fn redo(&mut self) -> Option<&str> {
        if !self.can_redo() {
            return None;
        }
        self.current += 1;
        self.entries.get(self.current).map(|e| e.snapshot.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = 0;
    }
}
