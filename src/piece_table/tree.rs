//! Wrapper module for [`PieceTree`]

use super::piece::{push_joined, Piece, PieceRun};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;

/// An ordered sequence of [`Piece`]s, indexed by byte offset
///
/// Internally, this is a treap (a binary search tree that's also a heap on randomly-assigned
/// priorities), where each node is tagged with the total number of bytes in its subtree. The
/// "key" of each node is implicit: it's the number of bytes in all of the pieces before it. This
/// gives us expected `O(log(k))` lookup by offset and `O(log(k))` splitting and joining, for `k`
/// pieces, regardless of how many bytes those pieces cover.
///
/// All modification goes through a single operation, [`replace_with`], which cuts out a range of
/// bytes and splices a new run of pieces in its place. Everything the [`PieceTable`] does (insert,
/// remove, replace, swap, undo, redo) is expressed in terms of it.
///
/// [`replace_with`]: Self::replace_with
/// [`PieceTable`]: super::PieceTable
#[derive(Clone)]
pub struct PieceTree {
    root: Link,
    // Priorities don't need to be unpredictable, only well-distributed, so a `SmallRng` with a
    // fixed seed is fine (and keeps the shape of the tree reproducible).
    rng: SmallRng,
}

type Link = Option<Box<Node>>;

/// (*Internal*) A single node in the treap
#[derive(Clone)]
struct Node {
    piece: Piece,
    priority: u32,
    left: Link,
    right: Link,
    /// The total number of bytes in this subtree, including `piece`
    size: usize,
    /// The total number of pieces in this subtree, including `piece`
    count: usize,
}

/// An iterator over the pieces in a [`PieceTree`], in order
///
/// Created by the [`pieces`](PieceTree::pieces) and [`pieces_from`](PieceTree::pieces_from)
/// methods.
pub struct Pieces<'a> {
    // The stack of nodes whose piece (and right subtree) hasn't been visited yet. The top of the
    // stack is the next piece.
    stack: Vec<&'a Node>,
}

impl Node {
    fn new(piece: Piece, priority: u32) -> Box<Node> {
        Box::new(Node {
            piece,
            priority,
            left: None,
            right: None,
            size: piece.len,
            count: 1,
        })
    }

    // Recomputes `size` and `count` from the children
    fn update(&mut self) {
        self.size = self.piece.len + size(&self.left) + size(&self.right);
        self.count = 1 + count(&self.left) + count(&self.right);
    }
}

fn size(link: &Link) -> usize {
    link.as_ref().map(|n| n.size).unwrap_or(0)
}

fn count(link: &Link) -> usize {
    link.as_ref().map(|n| n.count).unwrap_or(0)
}

impl Default for PieceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceTree {
    /// Creates an empty `PieceTree`
    pub fn new() -> Self {
        PieceTree {
            root: None,
            // The initialization of `SmallRng` calls for seeds without many zeroes.
            rng: SmallRng::seed_from_u64(u64::MAX),
        }
    }

    /// Creates a `PieceTree` holding exactly the given pieces, in order
    ///
    /// Empty pieces are skipped.
    pub fn from_pieces(pieces: &[Piece]) -> Self {
        let mut this = Self::new();
        this.root = this.build(pieces);
        this
    }

    /// Returns the total number of bytes covered by the pieces in the tree
    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of pieces in the tree
    pub fn piece_count(&self) -> usize {
        count(&self.root)
    }

    /// Returns the piece containing the byte at `offset`, alongside the position of that byte
    /// within the piece
    ///
    /// Returns `None` if `offset >= self.len()`.
    pub fn find(&self, offset: usize) -> Option<(Piece, usize)> {
        let mut node = self.root.as_deref();
        let mut at = offset;

        while let Some(n) = node {
            let left_size = size(&n.left);

            if at < left_size {
                node = n.left.as_deref();
            } else if at < left_size + n.piece.len {
                return Some((n.piece, at - left_size));
            } else {
                at -= left_size + n.piece.len;
                node = n.right.as_deref();
            }
        }

        None
    }

    /// Returns an iterator over all of the pieces in the tree
    pub fn pieces(&self) -> Pieces<'_> {
        let mut iter = Pieces { stack: Vec::new() };
        iter.push_left_spine(self.root.as_deref());
        iter
    }

    /// Returns an iterator over the pieces starting at the one containing `offset`, alongside the
    /// position of `offset` within that first piece
    ///
    /// If `offset >= self.len()`, the iterator is empty.
    pub fn pieces_from(&self, offset: usize) -> (Pieces<'_>, usize) {
        let mut stack = Vec::new();
        let mut node = self.root.as_deref();
        let mut at = offset;

        while let Some(n) = node {
            let left_size = size(&n.left);

            if at < left_size {
                stack.push(n);
                node = n.left.as_deref();
            } else if at < left_size + n.piece.len {
                stack.push(n);
                return (Pieces { stack }, at - left_size);
            } else {
                at -= left_size + n.piece.len;
                node = n.right.as_deref();
            }
        }

        // We only get here if `offset` was past the end. Any nodes we pushed are before it, so
        // there's nothing left to visit.
        (Pieces { stack: Vec::new() }, 0)
    }

    /// Replaces the pieces covering `range` with the run produced by `func`, returning the pieces
    /// that were removed
    ///
    /// `func` is given the removed pieces (cut exactly at the range boundaries), so that the
    /// replacement may be built from them -- this is how swapping two ranges avoids copying any
    /// bytes.
    ///
    /// If `coalesce` is true, pieces in the new run are joined with each other and with their new
    /// neighbors wherever they're contiguous in the same buffer. This never changes the bytes the
    /// tree represents, only how many pieces it takes to do so.
    ///
    /// ## Panics
    ///
    /// Panics if `range.start > range.end` or `range.end > self.len()`. Callers are expected to
    /// have validated the range already.
    pub fn replace_with(
        &mut self,
        range: Range<usize>,
        coalesce: bool,
        func: impl FnOnce(&[Piece]) -> PieceRun,
    ) -> PieceRun {
        assert!(
            range.start <= range.end && range.end <= self.len(),
            "invalid range {}..{} for tree of size {}",
            range.start,
            range.end,
            self.len()
        );

        let (mut left, rest) = split(self.root.take(), range.start);
        let (middle, mut right) = split(rest, range.end - range.start);

        let mut removed = PieceRun::new();
        collect(middle, &mut removed);

        let replacement = func(&removed);

        let mut run = PieceRun::new();
        if coalesce {
            // Pull the piece just before the range into the run if it'll join with whatever comes
            // next -- either the start of the replacement or, for a pure removal, the piece after
            // the range.
            let next = replacement
                .iter()
                .find(|p| p.len != 0)
                .copied()
                .or_else(|| first_piece(&right));

            if let (Some(last), Some(next)) = (last_piece(&left), next) {
                if last.try_join(next).is_ok() {
                    let lhs_size = size(&left) - last.len;
                    left = split(left, lhs_size).0;
                    run.push(last);
                }
            }

            replacement.iter().for_each(|&p| push_joined(&mut run, p));

            if let (Some(&prev), Some(first)) = (run.last(), first_piece(&right)) {
                if prev.try_join(first).is_ok() {
                    right = split(right, first.len).1;
                    push_joined(&mut run, first);
                }
            }
        } else {
            run.extend(replacement.into_iter().filter(|p| p.len != 0));
        }

        let middle = self.build(&run);
        self.root = merge(merge(left, middle), right);

        removed
    }

    /// (*Internal*) Builds a standalone treap from the pieces, in order
    fn build(&mut self, pieces: &[Piece]) -> Link {
        let mut root = None;
        for &p in pieces.iter().filter(|p| p.len != 0) {
            root = merge(root, Some(Node::new(p, self.rng.gen())));
        }
        root
    }
}

impl<'a> Pieces<'a> {
    fn push_left_spine(&mut self, mut node: Option<&'a Node>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a> Iterator for Pieces<'a> {
    type Item = Piece;

    fn next(&mut self) -> Option<Piece> {
        let node = self.stack.pop()?;
        self.push_left_spine(node.right.as_deref());
        Some(node.piece)
    }
}

/// Joins two treaps, where every piece in `left` comes before every piece in `right`
fn merge(left: Link, right: Link) -> Link {
    match (left, right) {
        (None, r) => r,
        (l, None) => l,
        (Some(mut l), Some(mut r)) => {
            if l.priority >= r.priority {
                l.right = merge(l.right.take(), Some(r));
                l.update();
                Some(l)
            } else {
                r.left = merge(Some(l), r.left.take());
                r.update();
                Some(r)
            }
        }
    }
}

/// Splits a treap so that the first returned half covers exactly `at` bytes
///
/// If `at` falls in the middle of a piece, that piece is cut in two.
fn split(link: Link, at: usize) -> (Link, Link) {
    let mut node = match link {
        None => return (None, None),
        Some(n) => n,
    };

    let left_size = size(&node.left);

    if at <= left_size {
        let (l, r) = split(node.left.take(), at);
        node.left = r;
        node.update();
        (l, Some(node))
    } else if at >= left_size + node.piece.len {
        let (l, r) = split(node.right.take(), at - left_size - node.piece.len);
        node.right = l;
        node.update();
        (Some(node), r)
    } else {
        // The split point is inside this node's piece. The upper half becomes a new node, joined
        // with everything that was to the right. It takes this node's priority, so that whoever
        // links the right half in as a child still outranks it.
        let upper = node.piece.split_at(at - left_size);
        let right = merge(Some(Node::new(upper, node.priority)), node.right.take());
        node.update();
        (Some(node), right)
    }
}

/// Moves all of the pieces in the treap into `out`, in order
fn collect(link: Link, out: &mut PieceRun) {
    if let Some(node) = link {
        let Node {
            left, right, piece, ..
        } = *node;
        collect(left, out);
        out.push(piece);
        collect(right, out);
    }
}

fn first_piece(link: &Link) -> Option<Piece> {
    let mut node = link.as_deref()?;
    while let Some(n) = node.left.as_deref() {
        node = n;
    }
    Some(node.piece)
}

fn last_piece(link: &Link) -> Option<Piece> {
    let mut node = link.as_deref()?;
    while let Some(n) = node.right.as_deref() {
        node = n;
    }
    Some(node.piece)
}

#[cfg(test)]
impl PieceTree {
    // Checks that the sizes, counts, and heap ordering in the tree are all consistent
    pub(super) fn assert_valid(&self) {
        fn assert_valid_node(node: &Node) -> (usize, usize) {
            assert!(node.piece.len != 0, "empty piece in tree");

            let mut size = node.piece.len;
            let mut count = 1;

            for child in [&node.left, &node.right].iter().filter_map(|c| c.as_deref()) {
                assert!(child.priority <= node.priority, "heap property violated");
                let (s, c) = assert_valid_node(child);
                size += s;
                count += c;
            }

            assert_eq!(size, node.size);
            assert_eq!(count, node.count);
            (size, count)
        }

        if let Some(root) = self.root.as_deref() {
            assert_valid_node(root);
        }
    }

    pub(super) fn height(&self) -> usize {
        fn height(link: &Link) -> usize {
            match link {
                None => 0,
                Some(n) => 1 + height(&n.left).max(height(&n.right)),
            }
        }

        height(&self.root)
    }
}
