//! Undo/redo history over whole-table snapshots
//!
//! Every committed edit pushes the pre-edit table onto the undo stack and
//! clears the redo stack. Undo and redo move snapshots between the stacks
//! and the live table; a snapshot is always moved out of its stack, so no
//! stored snapshot is ever reachable from the live table.

use crate::error::{Error, HistoryOp, Result};
use crate::table::Table;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A snapshot held on one of the history stacks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Label of the edit this snapshot brackets
    pub label: String,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// The table as it was
    pub table: Table,
}

impl HistoryEntry {
    fn new(label: String, table: Table) -> Self {
        Self {
            label,
            timestamp: Utc::now(),
            table,
        }
    }
}

/// The live table plus its undo and redo stacks
#[derive(Debug, Clone)]
pub struct History {
    current: Table,
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    capacity: Option<usize>,
}

impl History {
    /// Start an unbounded history for a freshly loaded table
    pub fn new(table: Table) -> Self {
        Self::with_capacity(table, None)
    }

    /// Start a history keeping at most `capacity` undo entries. `Some(0)` means unbounded.
    pub fn with_capacity(table: Table, capacity: Option<usize>) -> Self {
        Self {
            current: table,
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.filter(|&c| c > 0),
        }
    }

    /// The live table
    pub fn current(&self) -> &Table {
        &self.current
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Labels on the undo stack, oldest first
    pub fn undo_labels(&self) -> Vec<&str> {
        self.undo.iter().map(|e| e.label.as_str()).collect()
    }

    /// Labels on the redo stack, next-to-redo last
    pub fn redo_labels(&self) -> Vec<&str> {
        self.redo.iter().map(|e| e.label.as_str()).collect()
    }

    /// Label of the edit the next `undo` would revert
    pub fn peek_undo_label(&self) -> Option<&str> {
        self.undo.back().map(|e| e.label.as_str())
    }

    /// Label of the edit the next `redo` would reapply
    pub fn peek_redo_label(&self) -> Option<&str> {
        self.redo.last().map(|e| e.label.as_str())
    }

    /// Install a new table and forget all history
    pub fn reset(&mut self, table: Table) {
        self.current = table;
        self.clear();
    }

    /// Drop both stacks, keeping the live table
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Start a scoped edit of the live table.
    ///
    /// The handle must be committed or discarded; dropping it without a
    /// decision rolls the live table back to the pre-edit snapshot.
    pub fn begin_edit(&mut self, label: impl Into<String>) -> EditHandle<'_> {
        let snapshot = self.current.clone();
        EditHandle {
            history: self,
            snapshot: Some(snapshot),
            label: label.into(),
        }
    }

    /// Install `table` as the live table as one undoable step
    pub fn commit(&mut self, label: impl Into<String>, table: Table) {
        let previous = std::mem::replace(&mut self.current, table);
        self.push_undo(label.into(), previous);
    }

    fn push_undo(&mut self, label: String, snapshot: Table) {
        debug!("commit '{}' (undo depth {})", label, self.undo.len() + 1);
        self.undo.push_back(HistoryEntry::new(label, snapshot));
        self.redo.clear();
        if let Some(capacity) = self.capacity {
            while self.undo.len() > capacity {
                if let Some(evicted) = self.undo.pop_front() {
                    warn!("history full, evicting oldest entry '{}'", evicted.label);
                }
            }
        }
    }

    /// Revert the most recent commit
    pub fn undo(&mut self) -> Result<&Table> {
        let entry = self
            .undo
            .pop_back()
            .ok_or(Error::EmptyHistory(HistoryOp::Undo))?;
        debug!("undo '{}'", entry.label);
        let previous = std::mem::replace(&mut self.current, entry.table);
        self.redo.push(HistoryEntry::new(entry.label, previous));
        Ok(&self.current)
    }

    /// Reapply the most recently undone commit
    pub fn redo(&mut self) -> Result<&Table> {
        let entry = self
            .redo
            .pop()
            .ok_or(Error::EmptyHistory(HistoryOp::Redo))?;
        debug!("redo '{}'", entry.label);
        let previous = std::mem::replace(&mut self.current, entry.table);
        self.undo.push_back(HistoryEntry::new(entry.label, previous));
        Ok(&self.current)
    }
}

/// A pending edit of the live table
pub struct EditHandle<'a> {
    history: &'a mut History,
    snapshot: Option<Table>,
    label: String,
}

impl EditHandle<'_> {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The live table as currently edited
    pub fn table(&self) -> &Table {
        &self.history.current
    }

    /// Mutate the live table in place
    pub fn table_mut(&mut self) -> &mut Table {
        &mut self.history.current
    }

    /// Keep the edits made through `table_mut`. Returns the edit label.
    pub fn commit(mut self) -> String {
        let label = std::mem::take(&mut self.label);
        if let Some(snapshot) = self.snapshot.take() {
            self.history.push_undo(label.clone(), snapshot);
        }
        label
    }

    /// Replace the live table with `table` and keep it. Returns the edit label.
    pub fn commit_with(self, table: Table) -> String {
        self.history.current = table;
        self.commit()
    }

    /// Abandon the edit, restoring the pre-edit table
    pub fn discard(mut self) {
        self.rollback();
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            debug!("discarding edit '{}'", self.label);
            self.history.current = snapshot;
        }
    }
}

impl Drop for EditHandle<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;

    fn table(values: &[&str]) -> Table {
        Table::from_rows(vec![Row::from(values.to_vec())], false).unwrap()
    }

    #[test]
    fn test_undo_with_empty_history() {
        let mut history = History::new(table(&["a"]));
        let err = history.undo().unwrap_err();
        assert!(matches!(err, Error::EmptyHistory(HistoryOp::Undo)));
        assert!(matches!(history.redo(), Err(Error::EmptyHistory(HistoryOp::Redo))));
    }

    #[test]
    fn test_commit_undo_redo() {
        let mut history = History::new(table(&["a"]));
        history.commit("one", table(&["b"]));
        history.commit("two", table(&["c"]));

        assert_eq!(history.undo().unwrap(), &table(&["b"]));
        assert_eq!(history.undo().unwrap(), &table(&["a"]));
        assert!(history.undo().is_err());

        assert_eq!(history.redo().unwrap(), &table(&["b"]));
        assert_eq!(history.redo().unwrap(), &table(&["c"]));
        assert!(!history.can_redo());
        assert_eq!(history.undo_labels(), vec!["one", "two"]);
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut history = History::new(table(&["a"]));
        history.commit("one", table(&["b"]));
        history.undo().unwrap();
        assert!(history.can_redo());

        history.commit("other", table(&["z"]));
        assert!(!history.can_redo());
        assert_eq!(history.peek_undo_label(), Some("other"));
    }

    #[test]
    fn test_edit_handle_commit() {
        let mut history = History::new(table(&["a"]));
        let mut edit = history.begin_edit("set");
        edit.table_mut().set_field(0, 0, "b").unwrap();
        assert_eq!(edit.commit(), "set");

        assert_eq!(history.current(), &table(&["b"]));
        assert_eq!(history.undo().unwrap(), &table(&["a"]));
    }

    #[test]
    fn test_edit_handle_drop_rolls_back() {
        let mut history = History::new(table(&["a"]));
        {
            let mut edit = history.begin_edit("abandoned");
            edit.table_mut().set_field(0, 0, "b").unwrap();
            assert_eq!(edit.table().get_field(0, 0).unwrap(), "b");
        }
        assert_eq!(history.current(), &table(&["a"]));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_edit_handle_rolls_back_on_error_path() {
        fn failing_edit(history: &mut History) -> Result<()> {
            let mut edit = history.begin_edit("bad");
            edit.table_mut().set_field(0, 0, "partial")?;
            edit.table_mut().set_field(7, 0, "out of range")?;
            edit.commit();
            Ok(())
        }

        let mut history = History::new(table(&["a"]));
        assert!(failing_edit(&mut history).is_err());
        assert_eq!(history.current(), &table(&["a"]));
        assert_eq!(history.undo_len(), 0);
    }

    #[test]
    fn test_edit_handle_discard_and_commit_with() {
        let mut history = History::new(table(&["a"]));
        let mut edit = history.begin_edit("x");
        edit.table_mut().set_field(0, 0, "q").unwrap();
        edit.discard();
        assert_eq!(history.current(), &table(&["a"]));

        history.begin_edit("replace").commit_with(table(&["r"]));
        assert_eq!(history.current(), &table(&["r"]));
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::with_capacity(table(&["0"]), Some(2));
        history.commit("1", table(&["1"]));
        history.commit("2", table(&["2"]));
        history.commit("3", table(&["3"]));

        assert_eq!(history.undo_labels(), vec!["2", "3"]);
        assert_eq!(history.undo().unwrap(), &table(&["2"]));
        assert_eq!(history.undo().unwrap(), &table(&["1"]));
        assert!(history.undo().is_err());
    }

    #[test]
    fn test_reset_clears_history() {
        let mut history = History::new(table(&["a"]));
        history.commit("one", table(&["b"]));
        history.undo().unwrap();
        history.reset(table(&["fresh"]));
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.current(), &table(&["fresh"]));
    }

    #[test]
    fn test_restored_table_is_independent_of_stacks() {
        let mut history = History::new(table(&["a"]));
        history.commit("one", table(&["b"]));
        history.undo().unwrap();

        let mut edit = history.begin_edit("mutate");
        edit.table_mut().set_field(0, 0, "mutated").unwrap();
        edit.commit();

        // the redo entry for "one" was cleared; undo returns the true pre-edit state
        assert_eq!(history.undo().unwrap(), &table(&["a"]));
    }
}
