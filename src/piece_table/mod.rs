//! The piece-table backend for [`ByteArrayModel`]
//!
//! A [`PieceTable`] never moves existing bytes around. It keeps the buffer it was created from
//! (the "original" buffer) untouched, appends every inserted byte to a separate "add" buffer, and
//! describes the current content as an ordered sequence of [`Piece`]s, each pointing into one of
//! those two buffers. Editing is then a matter of cutting and splicing pieces, with cost
//! proportional to the number of pieces touched (plus a logarithmic lookup), and independent of
//! the size of the buffer.
//!
//! ## Performance characteristics
//!
//! For `k` pieces:
//! * [`byte_at`] is `O(log(k))`;
//! * insert, remove, replace, swap, undo, and redo are `O(log(k) + a)`, where `a` is the number of
//!   pieces in the affected range;
//! * [`copy_range`] is `O(log(k) + n)` for `n` bytes copied.
//!
//! `k` grows with the number of edits made, not with the size of the buffer. Adjacent pieces that
//! happen to be contiguous in the same buffer (like those produced by typing one byte at a time)
//! are joined as they're spliced in, and [`compact`] can be used to collapse everything back into
//! a single piece.
//!
//! [`byte_at`]: ByteArrayModel::byte_at
//! [`copy_range`]: ByteArrayModel::copy_range
//! [`compact`]: PieceTable::compact

use crate::config::Config;
use crate::error::ModelError;
use crate::model::{check_range, check_swap, checked_range, ByteArrayModel, Notification};
use smallvec::smallvec;
use std::fmt::{self, Debug, Formatter};
use std::ops::Range;
use std::sync::Arc;

pub mod history;
mod piece;
pub mod tree;

#[cfg(test)]
mod tests;

pub use history::{ChangeLog, ChangeRecord, EditKind};
pub use piece::{Piece, PieceRun, Source};
pub use tree::{PieceTree, Pieces};

use piece::split_run;

/// An editable byte buffer, stored as a sequence of pieces
///
/// See the [module-level documentation](self) for an overview.
///
/// The original buffer is held by an `Arc`, so multiple tables opened on the same immutable
/// source can share it (see [`from_shared`]). The add buffer and the pieces themselves are owned
/// exclusively by each table; cloning a `PieceTable` copies them.
///
/// [`from_shared`]: Self::from_shared
#[derive(Clone)]
pub struct PieceTable {
    original: Arc<[u8]>,
    /// Every byte ever inserted, in order. Only ever appended to, except by `compact`.
    add: Vec<u8>,
    tree: PieceTree,
    history: ChangeLog,
    read_only: bool,
    coalesce: bool,
    notifications: Vec<Notification>,
}

impl Default for PieceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for PieceTable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("PieceTable")
            .field("size", &self.size())
            .field("pieces", &self.piece_count())
            .field("add_buffer_len", &self.add.len())
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl PieceTable {
    /// Creates an empty `PieceTable`
    pub fn new() -> Self {
        Self::from_shared(Arc::from(Vec::new()))
    }

    /// Creates a `PieceTable` whose original content is the given bytes
    ///
    /// Anything convertible into an `Arc<[u8]>` works here; passing a `Vec<u8>` or `Box<[u8]>`
    /// avoids copying the content where the standard library allows it.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::from_shared(bytes.into())
    }

    /// Creates a `PieceTable` over a shared original buffer
    ///
    /// The buffer is never written to, so it's fine for other tables (or anything else) to hold
    /// references to it at the same time.
    pub fn from_shared(original: Arc<[u8]>) -> Self {
        let len = original.len();

        PieceTable {
            original,
            add: Vec::new(),
            tree: PieceTree::from_pieces(&[Piece::new(Source::Original, 0..len)]),
            history: ChangeLog::new(None),
            read_only: false,
            coalesce: true,
            notifications: Vec::new(),
        }
    }

    /// Applies the relevant settings from the configuration
    pub fn with_config(self, config: &Config) -> Self {
        self.with_undo_limit(config.undo_limit)
            .with_coalescing(config.coalesce_pieces)
    }

    /// Sets the maximum number of edits kept for undo, discarding any existing history
    pub fn with_undo_limit(mut self, limit: Option<usize>) -> Self {
        self.history = ChangeLog::new(limit);
        self
    }

    /// Sets whether contiguous pieces are joined as they're spliced in
    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// Returns the buffer the table was created from
    pub fn original(&self) -> &Arc<[u8]> {
        &self.original
    }

    /// Returns the number of bytes in the add buffer
    ///
    /// This only ever increases, except after a call to [`compact`](Self::compact).
    pub fn add_buffer_len(&self) -> usize {
        self.add.len()
    }

    pub fn piece_count(&self) -> usize {
        self.tree.piece_count()
    }

    /// Returns an iterator over the pieces making up the current content, in order
    pub fn pieces(&self) -> Pieces<'_> {
        self.tree.pieces()
    }

    /// Returns the full content of the table as a single vector
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        self.tree
            .pieces()
            .for_each(|p| out.extend_from_slice(&self.buffer(p.source)[p.range()]));
        out
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Returns the change log, mostly for inspection
    pub fn history(&self) -> &ChangeLog {
        &self.history
    }

    /// Reverts the most recent edit, returning `Ok(false)` if there was nothing to undo
    ///
    /// Undoing queues the inverse of the edit's original notification: undoing an insertion
    /// reports a removal, and so on.
    ///
    /// ## Errors
    ///
    /// Fails with [`ModelError::ReadOnlyViolation`] if the table is read-only.
    pub fn undo(&mut self) -> Result<bool, ModelError> {
        self.check_writable()?;

        let record = match self.history.undo() {
            Some(r) => r,
            None => return Ok(false),
        };

        let range = record.offset..record.offset + record.applied_len();
        let prior = record.prior.clone();
        let notification = record.notification.inverted();

        log::trace!("undo {:?} at {}..{}", record.kind, range.start, range.end);
        self.tree.replace_with(range, self.coalesce, |_| prior);
        self.notifications.push(notification);
        Ok(true)
    }

    /// Re-applies the most recently undone edit, returning `Ok(false)` if there was nothing to
    /// redo
    ///
    /// ## Errors
    ///
    /// Fails with [`ModelError::ReadOnlyViolation`] if the table is read-only.
    pub fn redo(&mut self) -> Result<bool, ModelError> {
        self.check_writable()?;

        let record = match self.history.redo() {
            Some(r) => r,
            None => return Ok(false),
        };

        let range = record.offset..record.offset + record.prior_len();
        let applied = record.applied.clone();
        let notification = record.notification.clone();

        log::trace!("redo {:?} at {}..{}", record.kind, range.start, range.end);
        self.tree.replace_with(range, self.coalesce, |_| applied);
        self.notifications.push(notification);
        Ok(true)
    }

    /// Collapses the table into a single piece, reclaiming the add buffer
    ///
    /// This copies the entire content into a new original buffer, so it's `O(n)` in the size of the
    /// table. Because the old pieces no longer mean anything afterwards, the change log is cleared
    /// as well. The content is unchanged, so no notification is queued.
    pub fn compact(&mut self) {
        let bytes = self.to_vec();
        let len = bytes.len();

        log::debug!(
            "compacting {} pieces ({} add-buffer bytes) into one",
            self.piece_count(),
            self.add.len()
        );

        self.original = Arc::from(bytes);
        self.add = Vec::new();
        self.tree = PieceTree::from_pieces(&[Piece::new(Source::Original, 0..len)]);
        self.history.clear();
    }

    /// Queues a notification for a change made outside of the table's own operations
    pub(crate) fn push_notification(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn buffer(&self, source: Source) -> &[u8] {
        match source {
            Source::Original => &self.original,
            Source::Add => &self.add,
        }
    }

    fn check_writable(&self) -> Result<(), ModelError> {
        match self.read_only {
            true => Err(ModelError::ReadOnlyViolation),
            false => Ok(()),
        }
    }

    /// (*Internal*) Appends the bytes to the add buffer, returning the piece that refers to them
    fn append(&mut self, bytes: &[u8]) -> Piece {
        let start = self.add.len();
        self.add.extend_from_slice(bytes);
        Piece::new(Source::Add, start..self.add.len())
    }

    /// (*Internal*) Splices the run produced by `func` over `range`, recording the edit and
    /// queueing its notification
    ///
    /// All validation must have already happened by the time this is called; it can't fail.
    fn splice(
        &mut self,
        kind: EditKind,
        range: Range<usize>,
        notification: Notification,
        func: impl FnOnce(&[Piece]) -> PieceRun,
    ) {
        log::trace!("{:?} over {}..{}", kind, range.start, range.end);

        let mut applied = PieceRun::new();
        let prior = self.tree.replace_with(range.clone(), self.coalesce, |removed| {
            applied = func(removed);
            applied.clone()
        });

        self.history.push(ChangeRecord {
            kind,
            offset: range.start,
            prior,
            applied,
            notification: notification.clone(),
        });
        self.notifications.push(notification);
    }
}

impl ByteArrayModel for PieceTable {
    fn size(&self) -> usize {
        self.tree.len()
    }

    fn byte_at(&self, offset: usize) -> Result<u8, ModelError> {
        match self.tree.find(offset) {
            Some((piece, idx)) => Ok(self.buffer(piece.source)[piece.offset + idx]),
            None => Err(ModelError::out_of_range(
                offset..offset.saturating_add(1),
                self.size(),
            )),
        }
    }

    fn set_byte_at(&mut self, offset: usize, value: u8) -> Result<(), ModelError> {
        self.check_writable()?;
        if offset >= self.size() {
            return Err(ModelError::out_of_range(
                offset..offset.saturating_add(1),
                self.size(),
            ));
        }

        let piece = self.append(&[value]);
        self.splice(
            EditKind::SetByte,
            offset..offset + 1,
            Notification::ByteChanged { offset },
            |_| smallvec![piece],
        );
        Ok(())
    }

    fn insert(&mut self, offset: usize, bytes: &[u8]) -> Result<(), ModelError> {
        self.check_writable()?;
        check_range(&(offset..offset), self.size())?;
        checked_range(self.size(), bytes.len())?;

        if bytes.is_empty() {
            return Ok(());
        }

        let piece = self.append(bytes);
        self.splice(
            EditKind::Insert,
            offset..offset,
            Notification::Inserted {
                offset,
                len: bytes.len(),
            },
            |_| smallvec![piece],
        );
        Ok(())
    }

    fn remove(&mut self, range: Range<usize>) -> Result<(), ModelError> {
        self.check_writable()?;
        check_range(&range, self.size())?;

        if range.is_empty() {
            return Ok(());
        }

        let notification = Notification::Removed {
            offset: range.start,
            len: range.len(),
        };
        self.splice(EditKind::Remove, range, notification, |_| PieceRun::new());
        Ok(())
    }

    fn replace(&mut self, range: Range<usize>, bytes: &[u8]) -> Result<(), ModelError> {
        self.check_writable()?;
        check_range(&range, self.size())?;
        checked_range(self.size() - range.len(), bytes.len())?;

        if range.is_empty() && bytes.is_empty() {
            return Ok(());
        }

        let run: PieceRun = match bytes.is_empty() {
            true => PieceRun::new(),
            false => smallvec![self.append(bytes)],
        };

        let notification = Notification::Replaced {
            offset: range.start,
            removed: range.len(),
            inserted: bytes.len(),
        };
        self.splice(EditKind::Replace, range, notification, |_| run);
        Ok(())
    }

    fn swap(
        &mut self,
        offset_a: usize,
        len_a: usize,
        offset_b: usize,
        len_b: usize,
    ) -> Result<(), ModelError> {
        self.check_writable()?;
        let (first, second) = match check_swap(self.size(), offset_a, len_a, offset_b, len_b)? {
            Some(pair) => pair,
            None => return Ok(()),
        };

        let region = first.start..second.end;
        let (first_len, gap_len) = (first.len(), second.start - first.end);
        let notification = Notification::Swapped { first, second };

        // The region is cut out as [first][gap][second] and spliced back in as
        // [second][gap][first]. Only pieces move; the add buffer is left alone.
        self.splice(EditKind::Swap, region, notification, |removed| {
            let (first, rest) = split_run(removed, first_len);
            let (gap, second) = split_run(&rest, gap_len);

            let mut run = second;
            run.extend(gap);
            run.extend(first);
            run
        });
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn copy_range(&self, range: Range<usize>) -> Result<Vec<u8>, ModelError> {
        check_range(&range, self.size())?;

        let mut out = Vec::with_capacity(range.len());
        let (pieces, mut skip) = self.tree.pieces_from(range.start);

        for piece in pieces {
            if out.len() == range.len() {
                break;
            }

            let wanted = range.len() - out.len();
            let src = &self.buffer(piece.source)[piece.range()][skip..];
            out.extend_from_slice(&src[..wanted.min(src.len())]);
            skip = 0;
        }

        Ok(out)
    }
}
