//! An editable byte-array storage engine
//!
//! The crate is built around the [`ByteArrayModel`] trait, the set of operations any editable
//! byte buffer provides, and [`PieceTable`], a backend for it whose edits cost the same no matter
//! how large the buffer is. On top of that, [`sync::ModelHandle`] ties a table to a file and
//! reloads it in the background without blocking whoever's editing it.
//!
//! A quick tour:
//!
//! ```
//! use piecebuf::{ByteArrayModel, PieceTable};
//!
//! let mut table = PieceTable::from_bytes(&b"ABCDEFGH"[..]);
//! table.remove(2..4).unwrap();
//! table.insert(2, b"XY").unwrap();
//! assert_eq!(table.to_vec(), b"ABXYEFGH");
//!
//! table.undo().unwrap();
//! table.undo().unwrap();
//! assert_eq!(table.to_vec(), b"ABCDEFGH");
//! ```

#![warn(clippy::style, clippy::perf)]
#![deny(clippy::len_zero, clippy::redundant_closure, unused_must_use)]

pub mod config;
pub mod error;
pub mod logger;
pub mod model;
pub mod piece_table;
pub mod script;
pub mod sync;

pub use config::Config;
pub use error::{ConfigError, ModelError, ReloadError};
pub use model::flat::FlatModel;
pub use model::{ByteArrayModel, Notification, NotificationKind};
pub use piece_table::PieceTable;
pub use sync::{JobState, ModelHandle, ReloadJob};
