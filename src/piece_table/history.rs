//! Linear undo/redo for a [`PieceTable`]
//!
//! The primary export of this module is the [`ChangeLog`]. Each edit to a table is stored as a
//! [`ChangeRecord`]: the pieces that were cut out of the table, and the pieces that were spliced
//! in to replace them. Because pieces are just offsets into buffers that only ever grow, undoing
//! an edit is the same splice in reverse -- no bytes are ever copied or replayed.
//!
//! [`PieceTable`]: super::PieceTable

use super::piece::{run_len, PieceRun};
use crate::model::Notification;

/// The kind of edit that produced a [`ChangeRecord`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EditKind {
    Insert,
    Remove,
    Replace,
    Swap,
    SetByte,
}

/// A single invertible edit
///
/// The edit replaced the bytes at `offset..offset + prior_len()` (which were made up of `prior`)
/// with the ones in `applied`.
#[derive(Clone, Debug)]
pub struct ChangeRecord {
    pub kind: EditKind,
    pub offset: usize,
    pub prior: PieceRun,
    pub applied: PieceRun,
    /// The notification emitted when the edit was first made
    ///
    /// Redoing the edit emits this again; undoing it emits its inverse.
    pub notification: Notification,
}

impl ChangeRecord {
    pub fn prior_len(&self) -> usize {
        run_len(&self.prior)
    }

    pub fn applied_len(&self) -> usize {
        run_len(&self.applied)
    }
}

/// A linear history of edits
///
/// This works the same way as the undo stack in most editors: undoing moves back through the
/// stack, redoing moves forward, and making a new edit after undoing discards everything that
/// could have been redone.
#[derive(Clone, Debug, Default)]
pub struct ChangeLog {
    /// The linear stack of edits
    records: Vec<ChangeRecord>,
    /// The number of records that are currently applied. Everything at or after this index can be
    /// redone.
    stack_pos: usize,
    /// The maximum number of records to keep, if any
    limit: Option<usize>,
}

impl ChangeLog {
    /// Creates a new, empty `ChangeLog`, keeping at most `limit` records (if given)
    pub fn new(limit: Option<usize>) -> Self {
        ChangeLog {
            records: Vec::new(),
            stack_pos: 0,
            limit,
        }
    }

    /// Adds a newly-made edit to the log, discarding any edits that could have been redone
    pub fn push(&mut self, record: ChangeRecord) {
        self.records.truncate(self.stack_pos);
        self.records.push(record);
        self.stack_pos = self.records.len();

        if let Some(limit) = self.limit {
            if self.records.len() > limit {
                let excess = self.records.len() - limit;
                self.records.drain(..excess);
                self.stack_pos -= excess;
                log::trace!("change log over limit; dropped {} oldest records", excess);
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.stack_pos != 0
    }

    pub fn can_redo(&self) -> bool {
        self.stack_pos < self.records.len()
    }

    /// Returns the record that [`undo`](Self::undo) would revert, without moving
    pub fn peek_undo(&self) -> Option<&ChangeRecord> {
        self.records.get(self.stack_pos.checked_sub(1)?)
    }

    /// Returns the record that [`redo`](Self::redo) would re-apply, without moving
    pub fn peek_redo(&self) -> Option<&ChangeRecord> {
        self.records.get(self.stack_pos)
    }

    /// Steps back over the most recent applied edit, returning it
    pub fn undo(&mut self) -> Option<&ChangeRecord> {
        let idx = self.stack_pos.checked_sub(1)?;
        self.stack_pos = idx;
        Some(&self.records[idx])
    }

    /// Steps forward over the next undone edit, returning it
    pub fn redo(&mut self) -> Option<&ChangeRecord> {
        let record = self.records.get(self.stack_pos)?;
        self.stack_pos += 1;
        Some(record)
    }

    /// Returns the number of edits that can currently be undone
    pub fn undo_depth(&self) -> usize {
        self.stack_pos
    }

    /// Returns the number of edits that can currently be redone
    pub fn redo_depth(&self) -> usize {
        self.records.len() - self.stack_pos
    }

    /// Discards the entire history
    pub fn clear(&mut self) {
        self.records.clear();
        self.stack_pos = 0;
    }
}
