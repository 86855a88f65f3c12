//! A reusable battery of behavioral tests for [`ByteArrayModel`] backends
//!
//! The tests make no assumptions about how a backend stores its bytes; they only exercise the
//! trait. To run them against a backend, instantiate [`conformance_suite!`] in a test module (or an
//! integration test) with a pair of factory functions:
//!
//! ```ignore
//! use piecebuf::{conformance_suite, PieceTable};
//!
//! conformance_suite!(
//!     piece_table,
//!     create = |bytes: &[u8]| PieceTable::from_bytes(bytes),
//!     destroy = drop,
//! );
//! ```
//!
//! `create` is given the initial content (possibly empty) and must return a writable model holding
//! exactly those bytes, with no queued notifications. `destroy` is handed the model at the end of
//! every test.
//!
//! [`ByteArrayModel`]: super::ByteArrayModel
//! [`conformance_suite!`]: crate::conformance_suite

/// Size of the buffer used by the "large" tests; a few megabytes
pub const LARGE_SIZE: usize = 4 * 1024 * 1024;

/// Produces `len` bytes of non-repeating-looking content
///
/// The period (251) is prime, so it never lines up with power-of-two chunk or piece sizes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Generates a module of `#[test]`s checking a [`ByteArrayModel`] backend
///
/// See the [module-level documentation](crate::model::conformance) for usage.
///
/// [`ByteArrayModel`]: crate::ByteArrayModel
#[macro_export]
macro_rules! conformance_suite {
    ($name:ident, create = $create:expr, destroy = $destroy:expr $(,)?) => {
        mod $name {
            #[allow(unused_imports)]
            use super::*;
            use $crate::model::conformance::{pattern, LARGE_SIZE};
            use $crate::model::{ByteArrayModel, Notification};
            use $crate::ModelError;

            /// Creates a model from `bytes`, runs `test` against it, then destroys it
            fn with_model(bytes: &[u8], test: impl FnOnce(&mut dyn ByteArrayModel)) {
                let create = $create;
                let destroy = $destroy;

                let mut model = create(bytes);
                assert_eq!(model.size(), bytes.len(), "created model has the wrong size");
                test(&mut model);
                destroy(model);
            }

            fn content(model: &dyn ByteArrayModel) -> Vec<u8> {
                model.copy_range(0..model.size()).unwrap()
            }

            fn out_of_range<T: std::fmt::Debug>(result: Result<T, ModelError>) {
                assert!(
                    matches!(result, Err(ModelError::OutOfRange { .. })),
                    "expected OutOfRange, got {:?}",
                    result
                );
            }

            #[test]
            fn size_matches_content() {
                for bytes in [&b""[..], &b"x"[..], &b"hello, world"[..]] {
                    with_model(bytes, |m| {
                        assert_eq!(m.size(), bytes.len());
                        assert_eq!(content(m), bytes);
                        assert!(m.take_notifications().is_empty());
                    });
                }
            }

            #[test]
            fn byte_at_boundaries() {
                with_model(b"abcdef", |m| {
                    assert_eq!(m.byte_at(0), Ok(b'a'));
                    assert_eq!(m.byte_at(m.size() - 1), Ok(b'f'));
                    out_of_range(m.byte_at(m.size()));
                    out_of_range(m.byte_at(usize::MAX));
                });

                with_model(b"", |m| out_of_range(m.byte_at(0)));
                with_model(b"z", |m| {
                    assert_eq!(m.byte_at(0), Ok(b'z'));
                    out_of_range(m.byte_at(1));
                });
            }

            #[test]
            fn byte_at_is_idempotent() {
                with_model(b"0123456789", |m| {
                    m.insert(4, b"abc").unwrap();
                    for offset in 0..m.size() {
                        let first = m.byte_at(offset);
                        assert_eq!(m.byte_at(offset), first);
                    }
                    assert_eq!(m.size(), 13);
                });
            }

            #[test]
            fn set_byte_at_boundaries() {
                with_model(b"abc", |m| {
                    m.set_byte_at(0, b'A').unwrap();
                    m.set_byte_at(2, b'C').unwrap();
                    assert_eq!(content(m), b"AbC");
                    assert_eq!(
                        m.take_notifications(),
                        vec![
                            Notification::ByteChanged { offset: 0 },
                            Notification::ByteChanged { offset: 2 },
                        ]
                    );

                    out_of_range(m.set_byte_at(3, b'!'));
                    assert_eq!(content(m), b"AbC");
                    assert!(m.take_notifications().is_empty());
                });

                with_model(b"", |m| out_of_range(m.set_byte_at(0, 0)));
            }

            #[test]
            fn insert_prepends_and_appends() {
                with_model(b"middle", |m| {
                    m.insert(0, b"<").unwrap();
                    let end = m.size();
                    m.insert(end, b">").unwrap();

                    assert_eq!(content(m), b"<middle>");
                    assert_eq!(
                        m.take_notifications(),
                        vec![
                            Notification::Inserted { offset: 0, len: 1 },
                            Notification::Inserted { offset: 7, len: 1 },
                        ]
                    );
                });

                with_model(b"", |m| {
                    m.insert(0, b"first").unwrap();
                    assert_eq!(content(m), b"first");
                });
            }

            #[test]
            fn insert_past_end_fails() {
                with_model(b"abc", |m| {
                    out_of_range(m.insert(4, b"x"));
                    assert_eq!(content(m), b"abc");
                    assert!(m.take_notifications().is_empty());
                });
            }

            #[test]
            fn empty_edits_are_silent() {
                with_model(b"abc", |m| {
                    m.insert(1, b"").unwrap();
                    m.insert(3, b"").unwrap();
                    m.remove(0..0).unwrap();
                    m.remove(3..3).unwrap();
                    m.replace(2..2, b"").unwrap();

                    assert_eq!(content(m), b"abc");
                    assert!(m.take_notifications().is_empty());
                });
            }

            #[test]
            fn remove_boundaries() {
                with_model(b"abcdef", |m| {
                    let last = m.size() - 1;
                    m.remove(last..last + 1).unwrap();
                    m.remove(0..1).unwrap();
                    assert_eq!(content(m), b"bcde");

                    out_of_range(m.remove(2..5));
                    let (start, end) = (3, 1);
                    out_of_range(m.remove(start..end));
                    assert_eq!(content(m), b"bcde");

                    let all = 0..m.size();
                    m.remove(all).unwrap();
                    assert_eq!(m.size(), 0);

                    assert_eq!(
                        m.take_notifications(),
                        vec![
                            Notification::Removed { offset: 5, len: 1 },
                            Notification::Removed { offset: 0, len: 1 },
                            Notification::Removed { offset: 0, len: 4 },
                        ]
                    );
                });
            }

            #[test]
            fn remove_then_insert_restores() {
                let original = pattern(1000);
                for (start, end) in [(0, 1), (0, 1000), (999, 1000), (10, 500), (250, 251)] {
                    with_model(&original, |m| {
                        let removed = m.copy_range(start..end).unwrap();
                        m.remove(start..end).unwrap();
                        assert_eq!(m.size(), original.len() - removed.len());

                        m.insert(start, &removed).unwrap();
                        assert_eq!(m.size(), original.len());
                        assert_eq!(content(m), original);
                    });
                }
            }

            #[test]
            fn replace_is_one_change() {
                with_model(b"hello world", |m| {
                    m.replace(0..5, b"goodbye").unwrap();
                    assert_eq!(content(m), b"goodbye world");
                    assert_eq!(
                        m.take_notifications(),
                        vec![Notification::Replaced {
                            offset: 0,
                            removed: 5,
                            inserted: 7
                        }]
                    );

                    // Shrinking, and at the very end
                    let size = m.size();
                    m.replace(size - 5..size, b"!").unwrap();
                    assert_eq!(content(m), b"goodbye !");

                    // Pure insertion and pure removal still count as replacements
                    m.replace(0..0, b">").unwrap();
                    m.replace(1..9, b"").unwrap();
                    assert_eq!(content(m), b">!");

                    let kinds: Vec<_> = m.take_notifications().iter().map(|n| n.kind()).collect();
                    assert_eq!(kinds.len(), 3);
                    assert!(kinds.iter().all(|k| *k == $crate::model::NotificationKind::Replaced));

                    out_of_range(m.replace(1..3, b"x"));
                    assert_eq!(content(m), b">!");
                });
            }

            #[test]
            fn swap_unequal_lengths() {
                with_model(b"aBCdeFGHIJk", |m| {
                    m.swap(1, 2, 5, 5).unwrap();
                    assert_eq!(content(m), b"aFGHIJdeBCk");

                    // The same swap with the arguments the other way round undoes it, as long as
                    // the ranges are adjusted for the new layout
                    m.swap(8, 2, 1, 5).unwrap();
                    assert_eq!(content(m), b"aBCdeFGHIJk");

                    assert_eq!(
                        m.take_notifications(),
                        vec![
                            Notification::Swapped {
                                first: 1..3,
                                second: 5..10,
                            },
                            Notification::Swapped {
                                first: 1..6,
                                second: 8..10,
                            },
                        ]
                    );
                });
            }

            #[test]
            fn swap_boundaries() {
                with_model(b"0123456789", |m| {
                    // Adjacent ranges at both ends of the buffer
                    m.swap(0, 3, 3, 7).unwrap();
                    assert_eq!(content(m), b"3456789012");

                    let size = m.size();
                    m.swap(size - 1, 1, 0, 1).unwrap();
                    assert_eq!(content(m), b"2456789013");

                    out_of_range(m.swap(0, 1, 9, 2));
                    assert_eq!(content(m), b"2456789013");
                });
            }

            #[test]
            fn overlapping_swap_fails() {
                with_model(b"0123456789", |m| {
                    for (a, la, b, lb) in [(0, 5, 4, 2), (4, 2, 0, 5), (2, 2, 2, 2), (0, 10, 5, 0)] {
                        let result = m.swap(a, la, b, lb);
                        assert!(
                            matches!(result, Err(ModelError::Overlap { .. })),
                            "swap({}, {}, {}, {}) gave {:?}",
                            a,
                            la,
                            b,
                            lb,
                            result
                        );
                    }

                    assert_eq!(content(m), b"0123456789");
                    assert!(m.take_notifications().is_empty());
                });
            }

            #[test]
            fn swap_offset_overflow() {
                with_model(b"abc", |m| {
                    assert_eq!(
                        m.swap(usize::MAX, 2, 0, 1),
                        Err(ModelError::Overflow {
                            offset: usize::MAX,
                            len: 2
                        })
                    );
                    assert_eq!(content(m), b"abc");
                });
            }

            #[test]
            fn read_only_rejects_mutation() {
                with_model(b"locked", |m| {
                    assert!(!m.is_read_only());
                    m.set_read_only(true);
                    assert!(m.is_read_only());

                    let ro = Err(ModelError::ReadOnlyViolation);
                    assert_eq!(m.set_byte_at(0, b'L'), ro);
                    assert_eq!(m.insert(0, b"x"), ro);
                    assert_eq!(m.remove(0..1), ro);
                    assert_eq!(m.replace(0..1, b"x"), ro);
                    assert_eq!(m.swap(0, 1, 2, 1), ro);
                    // Even calls that would otherwise be out of range or no-ops
                    assert_eq!(m.insert(100, b""), ro);

                    assert_eq!(m.byte_at(0), Ok(b'l'));
                    assert_eq!(content(m), b"locked");
                    assert!(m.take_notifications().is_empty());

                    m.set_read_only(false);
                    m.insert(0, b"un").unwrap();
                    assert_eq!(content(m), b"unlocked");
                });
            }

            #[test]
            fn copy_range_agrees_with_byte_at() {
                with_model(&pattern(300), |m| {
                    m.insert(100, b"inserted").unwrap();
                    m.remove(10..20).unwrap();
                    m.swap(0, 5, 200, 50).unwrap();

                    let bytes: Vec<u8> = (0..m.size()).map(|i| m.byte_at(i).unwrap()).collect();
                    assert_eq!(content(m), bytes);
                    assert_eq!(m.copy_range(37..160).unwrap(), &bytes[37..160]);
                    assert!(m.copy_range(m.size()..m.size()).unwrap().is_empty());
                    out_of_range(m.copy_range(0..m.size() + 1));
                });
            }

            #[test]
            fn large_buffer() {
                let original = pattern(LARGE_SIZE);
                with_model(&original, |m| {
                    let size = m.size();
                    assert_eq!(m.byte_at(0), Ok(original[0]));
                    assert_eq!(m.byte_at(size - 1), Ok(original[size - 1]));
                    out_of_range(m.byte_at(size));

                    m.insert(size / 2, b"needle").unwrap();
                    assert_eq!(m.copy_range(size / 2..size / 2 + 6).unwrap(), b"needle");
                    assert_eq!(m.byte_at(size / 2 + 6), Ok(original[size / 2]));

                    m.remove(size / 2..size / 2 + 6).unwrap();
                    m.swap(0, 1024, size - 1024, 1024).unwrap();
                    assert_eq!(m.copy_range(0..1024).unwrap(), &original[size - 1024..]);
                    assert_eq!(m.copy_range(size - 1024..size).unwrap(), &original[..1024]);

                    m.swap(0, 1024, size - 1024, 1024).unwrap();
                    assert_eq!(content(m), original);
                    assert_eq!(m.take_notifications().len(), 4);
                });
            }
        }
    };
}
