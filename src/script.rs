//! Edit scripts for the command-line front end
//!
//! Each edit is a single colon-separated word, e.g. `insert:4:hello`. The trailing text argument
//! (where there is one) takes the rest of the word, so it may itself contain colons.
//!
//! | Edit                       | Meaning                                         |
//! |----------------------------|-------------------------------------------------|
//! | `insert:OFFSET:TEXT`       | Insert `TEXT` before `OFFSET`                   |
//! | `remove:START:END`         | Remove the bytes in `START..END`                |
//! | `replace:START:END:TEXT`   | Replace the bytes in `START..END` with `TEXT`   |
//! | `set:OFFSET:BYTE`          | Overwrite a single byte (decimal or `0x..` hex) |
//! | `swap:A:LEN_A:B:LEN_B`     | Exchange two ranges                             |
//! | `undo`, `redo`             | Step through the history                        |

use crate::error::ModelError;
use crate::model::ByteArrayModel;
use crate::piece_table::PieceTable;
use std::fmt::Write;
use std::num::ParseIntError;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Insert { offset: usize, bytes: Vec<u8> },
    Remove { range: Range<usize> },
    Replace { range: Range<usize>, bytes: Vec<u8> },
    Set { offset: usize, value: u8 },
    Swap {
        a: usize,
        len_a: usize,
        b: usize,
        len_b: usize,
    },
    Undo,
    Redo,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("unknown edit `{0}`")]
    UnknownEdit(String),
    #[error("`{edit}` is missing its {arg} argument")]
    MissingArgument { edit: String, arg: &'static str },
    #[error("bad number `{value}` in `{edit}`: {cause}")]
    BadNumber {
        edit: String,
        value: String,
        #[source]
        cause: ParseIntError,
    },
}

impl FromStr for Edit {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, ScriptError> {
        let (name, rest) = match s.split_once(':') {
            Some((name, rest)) => (name, Some(rest)),
            None => (s, None),
        };

        let mut args = Args { edit: s, rest };

        let edit = match name {
            "insert" => Edit::Insert {
                offset: args.number("offset")?,
                bytes: args.text("text")?,
            },
            "remove" => Edit::Remove {
                range: args.number("start")?..args.number("end")?,
            },
            "replace" => Edit::Replace {
                range: args.number("start")?..args.number("end")?,
                bytes: args.text("text")?,
            },
            "set" => Edit::Set {
                offset: args.number("offset")?,
                value: args.number("byte")?,
            },
            "swap" => Edit::Swap {
                a: args.number("first offset")?,
                len_a: args.number("first length")?,
                b: args.number("second offset")?,
                len_b: args.number("second length")?,
            },
            "undo" => Edit::Undo,
            "redo" => Edit::Redo,
            _ => return Err(ScriptError::UnknownEdit(s.to_owned())),
        };

        Ok(edit)
    }
}

// Pulls arguments off the front of an edit, one at a time
struct Args<'a> {
    edit: &'a str,
    rest: Option<&'a str>,
}

impl<'a> Args<'a> {
    fn next(&mut self, arg: &'static str) -> Result<&'a str, ScriptError> {
        let rest = self.rest.ok_or_else(|| ScriptError::MissingArgument {
            edit: self.edit.to_owned(),
            arg,
        })?;

        let (value, rest) = match rest.split_once(':') {
            Some((value, rest)) => (value, Some(rest)),
            None => (rest, None),
        };

        self.rest = rest;
        Ok(value)
    }

    fn number<N: FromHex>(&mut self, arg: &'static str) -> Result<N, ScriptError> {
        let value = self.next(arg)?;
        let parsed = match value.strip_prefix("0x") {
            Some(hex) => N::from_hex(hex),
            None => value.parse(),
        };

        parsed.map_err(|cause| ScriptError::BadNumber {
            edit: self.edit.to_owned(),
            value: value.to_owned(),
            cause,
        })
    }

    /// Takes everything that's left as a single argument
    fn text(&mut self, arg: &'static str) -> Result<Vec<u8>, ScriptError> {
        match self.rest.take() {
            Some(text) => Ok(text.as_bytes().to_vec()),
            None => Err(ScriptError::MissingArgument {
                edit: self.edit.to_owned(),
                arg,
            }),
        }
    }
}

trait FromHex: FromStr<Err = ParseIntError> {
    fn from_hex(s: &str) -> Result<Self, ParseIntError>;
}

impl FromHex for usize {
    fn from_hex(s: &str) -> Result<Self, ParseIntError> {
        usize::from_str_radix(s, 16)
    }
}

impl FromHex for u8 {
    fn from_hex(s: &str) -> Result<Self, ParseIntError> {
        u8::from_str_radix(s, 16)
    }
}

impl Edit {
    /// Applies the edit to the table
    ///
    /// Undoing or redoing with nothing to undo or redo isn't an error; it just does nothing.
    pub fn apply(&self, table: &mut PieceTable) -> Result<(), ModelError> {
        match self {
            Edit::Insert { offset, bytes } => table.insert(*offset, bytes),
            Edit::Remove { range } => table.remove(range.clone()),
            Edit::Replace { range, bytes } => table.replace(range.clone(), bytes),
            Edit::Set { offset, value } => table.set_byte_at(*offset, *value),
            Edit::Swap { a, len_a, b, len_b } => table.swap(*a, *len_a, *b, *len_b),
            Edit::Undo => table.undo().map(|_| ()),
            Edit::Redo => table.redo().map(|_| ()),
        }
    }
}

/// Formats `bytes` as a classic hex dump: offset, sixteen bytes of hex, then printable ASCII
///
/// `base` is added to the offsets shown, for dumping a range from the middle of a buffer.
pub fn hex_dump(bytes: &[u8], base: usize) -> String {
    let mut out = String::new();

    for (i, line) in bytes.chunks(16).enumerate() {
        // Writing to a `String` can't fail
        let _ = write!(out, "{:08x} ", base + i * 16);

        for col in 0..16 {
            if col == 8 {
                out.push(' ');
            }
            match line.get(col) {
                Some(b) => {
                    let _ = write!(out, " {:02x}", b);
                }
                None => out.push_str("   "),
            }
        }

        out.push_str("  |");
        out.extend(line.iter().map(|&b| match b {
            0x20..=0x7e => b as char,
            _ => '.',
        }));
        out.push_str("|\n");
    }

    out
}
