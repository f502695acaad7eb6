pub mod command;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::graph_utils::graph::GraphStore;

pub use command::{Command, NodeMove};

pub const DEFAULT_HISTORY_CAP: usize = 20;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub command: Command,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// Linear undo/redo log with a bounded depth. Oldest entries fall off the
/// bottom once the cap is reached.
#[derive(Clone, Debug)]
pub struct HistoryLog {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    cap: usize,
}

impl Default for HistoryLog {
    fn default() -> Self { Self::with_capacity(DEFAULT_HISTORY_CAP) }
}

impl HistoryLog {
    pub fn with_capacity(cap: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), cap: cap.max(1) }
    }

    pub fn capacity(&self) -> usize { self.cap }
    pub fn can_undo(&self) -> bool { !self.undo.is_empty() }
    pub fn can_redo(&self) -> bool { !self.redo.is_empty() }
    pub fn undo_len(&self) -> usize { self.undo.len() }
    pub fn redo_len(&self) -> usize { self.redo.len() }

    /// Record an already-applied mutation. Clears the redo stack.
    pub fn record(&mut self, command: Command) {
        log::debug!("history: recorded {}", command.label());
        self.redo.clear();
        self.undo.push_back(HistoryEntry { command, recorded_at: OffsetDateTime::now_utc() });
        while self.undo.len() > self.cap {
            self.undo.pop_front();
        }
    }

    /// Apply `command` to `graph` and record it.
    pub fn execute(&mut self, command: Command, graph: &mut GraphStore) {
        command.apply(graph);
        self.record(command);
    }

    pub fn undo(&mut self, graph: &mut GraphStore) -> bool {
        let Some(entry) = self.undo.pop_back() else { return false };
        log::debug!("history: undo {}", entry.command.label());
        entry.command.revert(graph);
        self.redo.push(entry);
        true
    }

    pub fn redo(&mut self, graph: &mut GraphStore) -> bool {
        let Some(entry) = self.redo.pop() else { return false };
        log::debug!("history: redo {}", entry.command.label());
        entry.command.apply(graph);
        self.undo.push_back(entry);
        true
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
