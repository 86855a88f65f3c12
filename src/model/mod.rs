//! The [`ByteArrayModel`] contract shared by every storage backend
//!
//! A byte-array model is an editable, possibly very large sequence of bytes. Backends differ in
//! how they store the bytes ([`PieceTable`] splices pieces, [`FlatModel`] keeps a single vector),
//! but they all present the same operations with the same observable behavior. That behavior is
//! pinned down by the [`conformance_suite!`] macro, which can be instantiated for any backend.
//!
//! ## Notifications
//!
//! Every successful mutation queues exactly one [`Notification`], describing the affected region
//! in the coordinates of the model *before* the change. Consumers drain the queue with
//! [`take_notifications`], much like a listener syncing up with a shared text object: whatever
//! was returned is considered seen.
//!
//! Calls that change nothing (inserting zero bytes, removing an empty range, ...) queue nothing.
//!
//! [`PieceTable`]: crate::PieceTable
//! [`FlatModel`]: flat::FlatModel
//! [`conformance_suite!`]: crate::conformance_suite
//! [`take_notifications`]: ByteArrayModel::take_notifications

use crate::error::ModelError;
use std::ops::Range;

pub mod conformance;
pub mod flat;

/// The operations every byte-array backend must provide
///
/// All offsets are byte offsets. Ranges are half-open, and a range with `start > end` is always
/// rejected with [`ModelError::OutOfRange`]. Failed calls leave the model untouched and queue no
/// notification.
pub trait ByteArrayModel {
    /// Returns the total number of bytes in the model
    fn size(&self) -> usize;

    /// Returns the byte at `offset`
    ///
    /// ## Errors
    ///
    /// Fails with [`ModelError::OutOfRange`] if `offset >= self.size()`.
    fn byte_at(&self, offset: usize) -> Result<u8, ModelError>;

    /// Overwrites the byte at `offset`
    fn set_byte_at(&mut self, offset: usize, value: u8) -> Result<(), ModelError>;

    /// Inserts `bytes` immediately before the byte currently at `offset`
    ///
    /// `offset` may be equal to `self.size()`, in which case the bytes are appended.
    fn insert(&mut self, offset: usize, bytes: &[u8]) -> Result<(), ModelError>;

    /// Removes the bytes in `range`
    fn remove(&mut self, range: Range<usize>) -> Result<(), ModelError>;

    /// Replaces the bytes in `range` with `bytes`, as a single change
    ///
    /// Observers see one [`Notification::Replaced`], never a removal followed by an insertion.
    fn replace(&mut self, range: Range<usize>, bytes: &[u8]) -> Result<(), ModelError>;

    /// Exchanges the `len_a` bytes at `offset_a` with the `len_b` bytes at `offset_b`
    ///
    /// The two ranges may have different lengths and may be given in either order. The result is
    /// as if the content of each range was moved to where the other was.
    ///
    /// ## Errors
    ///
    /// Fails with [`ModelError::OutOfRange`] if either range exceeds the model, and with
    /// [`ModelError::Overlap`] if the ranges intersect. An empty range counts as intersecting
    /// when its offset lies strictly inside the other range.
    fn swap(
        &mut self,
        offset_a: usize,
        len_a: usize,
        offset_b: usize,
        len_b: usize,
    ) -> Result<(), ModelError>;

    fn is_read_only(&self) -> bool;

    fn set_read_only(&mut self, read_only: bool);

    /// Drains all queued notifications, oldest first
    fn take_notifications(&mut self) -> Vec<Notification>;

    /// Copies the bytes in `range` out of the model
    ///
    /// The default implementation reads one byte at a time; backends are expected to provide
    /// something better.
    fn copy_range(&self, range: Range<usize>) -> Result<Vec<u8>, ModelError> {
        check_range(&range, self.size())?;
        range.map(|i| self.byte_at(i)).collect()
    }
}

/// The kind of a [`Notification`], without its payload
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    ByteChanged,
    Inserted,
    Removed,
    Replaced,
    Swapped,
    Reloaded,
}

/// A description of a single change to a model
///
/// Offsets are given in the coordinates of the model immediately *before* the change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    ByteChanged { offset: usize },
    Inserted { offset: usize, len: usize },
    Removed { offset: usize, len: usize },
    Replaced {
        offset: usize,
        removed: usize,
        inserted: usize,
    },
    /// `first` is always the earlier of the two ranges
    Swapped {
        first: Range<usize>,
        second: Range<usize>,
    },
    /// The whole content was replaced from the backing file
    Reloaded { old_size: usize, new_size: usize },
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::ByteChanged { .. } => NotificationKind::ByteChanged,
            Notification::Inserted { .. } => NotificationKind::Inserted,
            Notification::Removed { .. } => NotificationKind::Removed,
            Notification::Replaced { .. } => NotificationKind::Replaced,
            Notification::Swapped { .. } => NotificationKind::Swapped,
            Notification::Reloaded { .. } => NotificationKind::Reloaded,
        }
    }

    /// Returns the offset of the first affected byte
    pub fn offset(&self) -> usize {
        match self {
            Notification::ByteChanged { offset }
            | Notification::Inserted { offset, .. }
            | Notification::Removed { offset, .. }
            | Notification::Replaced { offset, .. } => *offset,
            Notification::Swapped { first, .. } => first.start,
            Notification::Reloaded { .. } => 0,
        }
    }

    /// Returns the number of affected bytes, counted in the model before the change
    ///
    /// For insertions (which affect no existing bytes) this is the number of bytes inserted. For
    /// swaps, it's the length of the whole region from the start of the first range to the end of
    /// the second.
    pub fn len(&self) -> usize {
        match self {
            Notification::ByteChanged { .. } => 1,
            Notification::Inserted { len, .. } | Notification::Removed { len, .. } => *len,
            Notification::Replaced { removed, .. } => *removed,
            Notification::Swapped { first, second } => second.end - first.start,
            Notification::Reloaded { old_size, .. } => *old_size,
        }
    }

    /// Returns the notification describing the change that undoes this one
    ///
    /// Undoing a reload isn't possible, so `Reloaded` maps to itself with the sizes exchanged.
    pub fn inverted(&self) -> Notification {
        match self.clone() {
            n @ Notification::ByteChanged { .. } => n,
            Notification::Inserted { offset, len } => Notification::Removed { offset, len },
            Notification::Removed { offset, len } => Notification::Inserted { offset, len },
            Notification::Replaced {
                offset,
                removed,
                inserted,
            } => Notification::Replaced {
                offset,
                removed: inserted,
                inserted: removed,
            },
            // After the swap, the second range's content sits at the start of the region and the
            // first range's content at its end.
            Notification::Swapped { first, second } => Notification::Swapped {
                first: first.start..first.start + second.len(),
                second: second.end - first.len()..second.end,
            },
            Notification::Reloaded { old_size, new_size } => Notification::Reloaded {
                old_size: new_size,
                new_size: old_size,
            },
        }
    }
}

/// Checks that `range` is a valid range within a model of size `size`
pub(crate) fn check_range(range: &Range<usize>, size: usize) -> Result<(), ModelError> {
    if range.start > range.end || range.end > size {
        return Err(ModelError::out_of_range(range.clone(), size));
    }

    Ok(())
}

/// Computes `offset..offset + len`, failing on overflow
pub(crate) fn checked_range(offset: usize, len: usize) -> Result<Range<usize>, ModelError> {
    match offset.checked_add(len) {
        Some(end) => Ok(offset..end),
        None => Err(ModelError::Overflow { offset, len }),
    }
}

/// Validates the arguments to [`ByteArrayModel::swap`], returning the two ranges in order
///
/// Returns `Ok(None)` if the swap would have no effect: either both ranges are empty, or one is
/// empty and sits directly against the other.
pub(crate) fn check_swap(
    size: usize,
    offset_a: usize,
    len_a: usize,
    offset_b: usize,
    len_b: usize,
) -> Result<Option<(Range<usize>, Range<usize>)>, ModelError> {
    let a = checked_range(offset_a, len_a)?;
    let b = checked_range(offset_b, len_b)?;
    check_range(&a, size)?;
    check_range(&b, size)?;

    let (first, second) = if (a.start, a.end) <= (b.start, b.end) {
        (a, b)
    } else {
        (b, a)
    };

    // Non-empty ranges overlap when they share a byte. An empty range "overlaps" when it would
    // split the other one.
    let overlaps = match (first.is_empty(), second.is_empty()) {
        (false, false) => second.start < first.end,
        (true, false) => false,
        (false, true) => first.start < second.start && second.start < first.end,
        (true, true) => false,
    };

    if overlaps {
        return Err(ModelError::Overlap { first, second });
    }

    let no_op = (first.is_empty() && second.is_empty())
        || (first.is_empty() && first.start == second.start)
        || (second.is_empty() && second.start == first.end);

    match no_op {
        true => Ok(None),
        false => Ok(Some((first, second))),
    }
}
