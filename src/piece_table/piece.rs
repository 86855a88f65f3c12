//! Wrapper module for [`Piece`]

use smallvec::SmallVec;
use std::ops::Range;

/// Which of a [`PieceTable`]'s two buffers a [`Piece`] reads from
///
/// [`PieceTable`]: super::PieceTable
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    /// The immutable buffer the table was created from
    Original,
    /// The table's append-only buffer of inserted bytes
    Add,
}

/// A contiguous run of bytes from one of the table's buffers
///
/// Pieces don't hold onto their bytes -- they're just a `(source, offset, len)` triple -- so
/// copying one is free, and a snapshot of the pieces covering some range is a cheap value copy.
/// This is what lets the change log store the prior state of every edit without storing any
/// bytes.
///
/// Pieces stored in a table are never empty.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Piece {
    pub source: Source,
    pub offset: usize,
    pub len: usize,
}

/// A short sequence of pieces, usually the ones covering a single edited range
///
/// Most edits touch only a handful of pieces, so these are kept inline where possible.
pub type PieceRun = SmallVec<[Piece; 4]>;

impl Piece {
    pub fn new(source: Source, range: Range<usize>) -> Self {
        debug_assert!(range.start <= range.end);

        Piece {
            source,
            offset: range.start,
            len: range.end - range.start,
        }
    }

    /// Returns the range of the source buffer that this piece covers
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    /// Cuts the piece in two at `idx`, returning the upper half
    ///
    /// After calling this, `self` covers `[0, idx)` of the original piece and the returned piece
    /// covers `[idx, len)`.
    pub fn split_at(&mut self, idx: usize) -> Piece {
        debug_assert!(idx <= self.len);

        let upper = Piece {
            source: self.source,
            offset: self.offset + idx,
            len: self.len - idx,
        };
        self.len = idx;
        upper
    }

    /// Attempts to join `other` onto the end of `self`, returning the pair unchanged if they aren't
    /// contiguous in the same buffer
    pub fn try_join(self, other: Piece) -> Result<Piece, (Piece, Piece)> {
        if self.source == other.source && self.offset + self.len == other.offset {
            Ok(Piece {
                source: self.source,
                offset: self.offset,
                len: self.len + other.len,
            })
        } else {
            Err((self, other))
        }
    }
}

/// Splits a run of pieces at the byte offset `at`, returning the pieces before and after it
///
/// A piece straddling `at` is cut in two.
pub fn split_run(run: &[Piece], at: usize) -> (PieceRun, PieceRun) {
    let mut lower = PieceRun::new();
    let mut upper = PieceRun::new();
    let mut pos = 0;

    for &piece in run {
        let end = pos + piece.len;

        if end <= at {
            lower.push(piece);
        } else if pos >= at {
            upper.push(piece);
        } else {
            let mut piece = piece;
            let rhs = piece.split_at(at - pos);
            lower.push(piece);
            upper.push(rhs);
        }

        pos = end;
    }

    (lower, upper)
}

/// Appends `piece` to the run, joining it with the last piece if possible
pub fn push_joined(run: &mut PieceRun, piece: Piece) {
    if piece.len == 0 {
        return;
    }

    match run.pop() {
        None => run.push(piece),
        Some(last) => match last.try_join(piece) {
            Ok(joined) => run.push(joined),
            Err((last, piece)) => {
                run.push(last);
                run.push(piece);
            }
        },
    }
}

/// Returns the total number of bytes covered by the run
pub fn run_len(run: &[Piece]) -> usize {
    run.iter().map(|p| p.len).sum()
}
