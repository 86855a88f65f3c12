//! Wrapper module for [`FlatModel`]

use super::{check_range, check_swap, checked_range, ByteArrayModel, Notification};
use crate::error::ModelError;
use std::ops::Range;

/// The simplest possible [`ByteArrayModel`]: a single contiguous `Vec<u8>`
///
/// Every edit is `O(n)` in the size of the buffer, so this isn't meant for real use on large
/// files. It exists as a reference: it's small enough to be obviously correct, which makes it a
/// useful oracle when checking the [`PieceTable`](crate::PieceTable) against random edits.
#[derive(Clone, Debug, Default)]
pub struct FlatModel {
    bytes: Vec<u8>,
    read_only: bool,
    notifications: Vec<Notification>,
}

impl FlatModel {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        FlatModel {
            bytes: bytes.into(),
            read_only: false,
            notifications: Vec::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn check_writable(&self) -> Result<(), ModelError> {
        match self.read_only {
            true => Err(ModelError::ReadOnlyViolation),
            false => Ok(()),
        }
    }
}

impl ByteArrayModel for FlatModel {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn byte_at(&self, offset: usize) -> Result<u8, ModelError> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or_else(|| ModelError::out_of_range(offset..offset.saturating_add(1), self.size()))
    }

    fn set_byte_at(&mut self, offset: usize, value: u8) -> Result<(), ModelError> {
        self.check_writable()?;
        let size = self.size();
        let byte = self
            .bytes
            .get_mut(offset)
            .ok_or_else(|| ModelError::out_of_range(offset..offset.saturating_add(1), size))?;

        *byte = value;
        self.notifications.push(Notification::ByteChanged { offset });
        Ok(())
    }

    fn insert(&mut self, offset: usize, bytes: &[u8]) -> Result<(), ModelError> {
        self.check_writable()?;
        check_range(&(offset..offset), self.size())?;
        checked_range(self.size(), bytes.len())?;

        if bytes.is_empty() {
            return Ok(());
        }

        self.bytes.splice(offset..offset, bytes.iter().copied());
        self.notifications.push(Notification::Inserted {
            offset,
            len: bytes.len(),
        });
        Ok(())
    }

    fn remove(&mut self, range: Range<usize>) -> Result<(), ModelError> {
        self.check_writable()?;
        check_range(&range, self.size())?;

        if range.is_empty() {
            return Ok(());
        }

        let (offset, len) = (range.start, range.len());
        self.bytes.drain(range);
        self.notifications.push(Notification::Removed { offset, len });
        Ok(())
    }

    fn replace(&mut self, range: Range<usize>, bytes: &[u8]) -> Result<(), ModelError> {
        self.check_writable()?;
        check_range(&range, self.size())?;
        checked_range(self.size() - range.len(), bytes.len())?;

        if range.is_empty() && bytes.is_empty() {
            return Ok(());
        }

        let (offset, removed) = (range.start, range.len());
        self.bytes.splice(range, bytes.iter().copied());
        self.notifications.push(Notification::Replaced {
            offset,
            removed,
            inserted: bytes.len(),
        });
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
        let mut swapped = Vec::with_capacity(region.len());
        swapped.extend_from_slice(&self.bytes[second.clone()]);
        swapped.extend_from_slice(&self.bytes[first.end..second.start]);
        swapped.extend_from_slice(&self.bytes[first.clone()]);

        self.bytes[region].copy_from_slice(&swapped);
        self.notifications
            .push(Notification::Swapped { first, second });
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
        Ok(self.bytes[range].to_vec())
    }
}
