//! Tests for `PieceTable`, mostly in terms of edit scripts

use super::*;
use crate::model::flat::FlatModel;
use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

// A little DSL for writing out sequences of edits, checking the content after each one:
//
//   edit_script! {
//       start: "ABCDEFGH";
//       remove(2..4) => "ABEFGH";
//       insert(2, "XY") => "ABXYEFGH";
//       undo() => "ABEFGH";
//   }
//
// Every step must succeed, and the tree is checked for consistency after each one. The macro
// evaluates to the final table.
macro_rules! edit_script {
    (
        start: $start:expr;
        $( $op:ident ( $($arg:expr),* ) => $expected:expr; )*
    ) => {{
        #[allow(unused_mut)]
        let mut table = PieceTable::from_bytes($start.as_bytes());
        $(
            edit_script!(@op table, $op ( $($arg),* ));
            assert_eq!(
                String::from_utf8_lossy(&table.to_vec()),
                $expected,
                "after `{}`",
                stringify!($op($($arg),*)),
            );
            assert_eq!(table.size(), $expected.len());
            table.tree.assert_valid();
        )*
        table
    }};

    (@op $t:ident, insert($at:expr, $s:expr)) => { $t.insert($at, $s.as_bytes()).unwrap() };
    (@op $t:ident, remove($r:expr)) => { $t.remove($r).unwrap() };
    (@op $t:ident, replace($r:expr, $s:expr)) => { $t.replace($r, $s.as_bytes()).unwrap() };
    (@op $t:ident, set($at:expr, $b:expr)) => { $t.set_byte_at($at, $b).unwrap() };
    (@op $t:ident, swap($a:expr, $la:expr, $b:expr, $lb:expr)) => {
        $t.swap($a, $la, $b, $lb).unwrap()
    };
    (@op $t:ident, undo()) => { assert!($t.undo().unwrap(), "nothing to undo") };
    (@op $t:ident, redo()) => { assert!($t.redo().unwrap(), "nothing to redo") };
}

#[test]
fn remove_insert_undo() {
    let table = edit_script! {
        start: "ABCDEFGH";
        remove(2..4) => "ABEFGH";
        insert(2, "XY") => "ABXYEFGH";
        undo() => "ABEFGH";
        undo() => "ABCDEFGH";
    };

    assert!(!table.can_undo());
    assert!(table.can_redo());
    // Undoing everything should get us back to the single original piece
    assert_eq!(table.piece_count(), 1);
}

#[test]
fn redo_after_undo() {
    edit_script! {
        start: "hello world";
        replace(0..5, "goodbye") => "goodbye world";
        set(0, b'G') => "Goodbye world";
        undo() => "goodbye world";
        undo() => "hello world";
        redo() => "goodbye world";
        redo() => "Goodbye world";
    };
}

#[test]
fn new_edit_discards_redo() {
    let mut table = edit_script! {
        start: "abc";
        insert(3, "def") => "abcdef";
        undo() => "abc";
        insert(0, "x") => "xabc";
    };

    assert!(!table.can_redo());
    assert_eq!(table.redo(), Ok(false));
}

#[test]
fn swap_scenarios() {
    edit_script! {
        start: "aBCdeFGHIJk";
        swap(1, 2, 5, 5) => "aFGHIJdeBCk";
        undo() => "aBCdeFGHIJk";
        // Order of the ranges doesn't matter
        swap(5, 5, 1, 2) => "aFGHIJdeBCk";
        // Adjacent ranges
        swap(0, 1, 1, 5) => "FGHIJadeBCk";
        // An empty range moves the other one
        swap(0, 0, 6, 2) => "deFGHIJaBCk";
    };
}

#[test]
fn swap_adds_nothing_to_add_buffer() {
    let mut table = PieceTable::from_bytes(&b"0123456789"[..]);
    table.swap(0, 3, 6, 4).unwrap();
    table.swap(1, 1, 8, 2).unwrap();

    // "0123456789" -> "6789345012" -> "6128934507"
    assert_eq!(table.to_vec(), b"6128934507");
    assert_eq!(table.add_buffer_len(), 0);
}

#[test]
fn insert_at_every_offset() {
    let start = "0123456";
    for at in 0..=start.len() {
        let mut table = PieceTable::from_bytes(start.as_bytes());
        table.insert(at, b"--").unwrap();

        let mut expected = start.to_owned();
        expected.insert_str(at, "--");
        assert_eq!(table.to_vec(), expected.into_bytes());
        table.tree.assert_valid();
    }
}

#[test]
fn single_notification_per_edit() {
    let mut table = PieceTable::from_bytes(&b"abcdef"[..]);
    table.replace(1..3, b"XYZ").unwrap();
    table.swap(0, 1, 5, 2).unwrap();
    table.remove(0..0).unwrap();
    table.insert(2, b"").unwrap();

    assert_eq!(
        table.take_notifications(),
        vec![
            Notification::Replaced {
                offset: 1,
                removed: 2,
                inserted: 3
            },
            Notification::Swapped {
                first: 0..1,
                second: 5..7
            },
        ]
    );
    assert!(table.take_notifications().is_empty());
}

#[test]
fn undo_emits_inverse() {
    let mut table = PieceTable::from_bytes(&b"abcdef"[..]);
    table.insert(3, b"123").unwrap();
    table.take_notifications();

    table.undo().unwrap();
    table.redo().unwrap();
    assert_eq!(
        table.take_notifications(),
        vec![
            Notification::Removed { offset: 3, len: 3 },
            Notification::Inserted { offset: 3, len: 3 },
        ]
    );
}

#[test]
fn read_only_blocks_history() {
    let mut table = PieceTable::from_bytes(&b"abc"[..]);
    table.insert(0, b"x").unwrap();
    table.set_read_only(true);

    assert_eq!(table.undo(), Err(ModelError::ReadOnlyViolation));
    assert_eq!(table.insert(0, b"y"), Err(ModelError::ReadOnlyViolation));
    assert_eq!(table.to_vec(), b"xabc");

    table.set_read_only(false);
    assert_eq!(table.undo(), Ok(true));
    assert_eq!(table.to_vec(), b"abc");
}

#[test]
fn typing_coalesces() {
    let mut table = PieceTable::from_bytes(&b"header|footer"[..]);
    for (i, b) in b"some typed text".iter().enumerate() {
        table.insert(7 + i, &[*b]).unwrap();
    }

    assert_eq!(table.to_vec(), b"header|some typed textfooter");
    assert_eq!(table.piece_count(), 3);

    let mut uncoalesced = PieceTable::from_bytes(&b"header|footer"[..]).with_coalescing(false);
    for (i, b) in b"some typed text".iter().enumerate() {
        uncoalesced.insert(7 + i, &[*b]).unwrap();
    }

    assert_eq!(uncoalesced.to_vec(), table.to_vec());
    assert_eq!(uncoalesced.piece_count(), 2 + 15);
}

#[test]
fn undo_limit() {
    let mut table = PieceTable::from_bytes(&b""[..]).with_undo_limit(Some(3));
    for i in 0..10 {
        table.insert(i, b"a").unwrap();
    }

    assert_eq!(table.history().undo_depth(), 3);
    while table.undo().unwrap() {}
    assert_eq!(table.size(), 7);
}

#[test]
fn compact_collapses_pieces() {
    let mut table = PieceTable::from_bytes(&b"abcdef"[..]);
    table.insert(3, b"123").unwrap();
    table.swap(0, 2, 7, 2).unwrap();
    let before = table.to_vec();

    table.compact();

    assert_eq!(table.to_vec(), before);
    assert_eq!(table.piece_count(), 1);
    assert_eq!(table.add_buffer_len(), 0);
    assert!(!table.can_undo());
    assert_eq!(table.pieces().next(), Some(Piece::new(Source::Original, 0..9)));
}

#[test]
fn copy_range_across_pieces() {
    let mut table = PieceTable::from_bytes(&b"0123456789"[..]);
    table.insert(5, b"abc").unwrap();
    table.insert(2, b"XY").unwrap();
    let full = table.to_vec();

    for (start, end) in (0..=full.len()).tuple_combinations() {
        assert_eq!(table.copy_range(start..end).unwrap(), &full[start..end]);
    }
    assert_eq!(table.copy_range(3..3).unwrap(), Vec::<u8>::new());
    assert!(table.copy_range(0..full.len() + 1).is_err());
}

#[test]
fn shared_original() {
    let original: Arc<[u8]> = Arc::from(&b"shared bytes"[..]);
    let mut a = PieceTable::from_shared(original.clone());
    let b = PieceTable::from_shared(original.clone());

    a.remove(0..7).unwrap();

    assert_eq!(a.to_vec(), b"bytes");
    assert_eq!(b.to_vec(), b"shared bytes");
    assert!(Arc::ptr_eq(a.original(), b.original()));
}

// Every ordering of a few independent-looking edits should agree with the flat backend, and undo
// all the way back to the start.
#[test]
fn edit_permutations_match_flat() {
    type Edit = fn(&mut dyn ByteArrayModel);

    let edits: [Edit; 4] = [
        |m| m.insert(m.size() / 2, b"<ins>").unwrap(),
        |m| m.remove(1..3).unwrap(),
        |m| m.replace(0..1, b"RR").unwrap(),
        |m| m.swap(0, 2, m.size() - 2, 2).unwrap(),
    ];

    let start = b"the quick brown fox";
    for order in edits.iter().permutations(edits.len()) {
        let mut table = PieceTable::from_bytes(&start[..]);
        let mut flat = FlatModel::new(&start[..]);

        for edit in order {
            edit(&mut table);
            edit(&mut flat);
            assert_eq!(table.to_vec(), flat.as_bytes());
        }
        assert_eq!(table.take_notifications(), flat.take_notifications());

        while table.undo().unwrap() {}
        assert_eq!(table.to_vec(), start);
    }
}

// Long random edit sequences, checked against the flat backend after every step
#[test]
fn random_edits_match_flat() {
    let mut rng = SmallRng::seed_from_u64(0x5eed_f00d);

    for _ in 0..20 {
        let start: Vec<u8> = (0..rng.gen_range(0..200)).map(|_| rng.gen()).collect();
        let mut table = PieceTable::from_bytes(start.clone());
        let mut flat = FlatModel::new(start.clone());
        let mut snapshots = vec![start.clone()];

        for _ in 0..200 {
            let size = flat.size();
            let a = rng.gen_range(0..=size);
            let b = rng.gen_range(a..=size);
            let bytes: Vec<u8> = (0..rng.gen_range(0..8)).map(|_| rng.gen()).collect();

            let (t, f) = match rng.gen_range(0..5) {
                0 => (table.insert(a, &bytes), flat.insert(a, &bytes)),
                1 => (table.remove(a..b), flat.remove(a..b)),
                2 => (table.replace(a..b, &bytes), flat.replace(a..b, &bytes)),
                3 if size > 0 => {
                    let at = a.min(size - 1);
                    let value = bytes.len() as u8;
                    (table.set_byte_at(at, value), flat.set_byte_at(at, value))
                }
                _ => {
                    let c = rng.gen_range(0..=size);
                    let d = rng.gen_range(c..=size);
                    (table.swap(a, b - a, c, d - c), flat.swap(a, b - a, c, d - c))
                }
            };

            assert_eq!(t, f);
            assert_eq!(table.to_vec(), flat.as_bytes());
            assert_eq!(table.take_notifications(), flat.take_notifications());
            table.tree.assert_valid();

            // Only successful, non-empty edits land in the history
            if table.history().undo_depth() == snapshots.len() {
                snapshots.push(table.to_vec());
            }
        }

        // Walk back through every recorded state
        snapshots.pop();
        while let Some(expected) = snapshots.pop() {
            assert_eq!(table.undo(), Ok(true));
            assert_eq!(table.to_vec(), expected);
        }
        assert!(!table.can_undo());
        assert_eq!(table.to_vec(), start);
    }
}
