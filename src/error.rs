//! Error types for the engine, the synchronizer, and configuration
//!
//! Every error produced by a [`ByteArrayModel`] is local and recoverable: the model is left exactly
//! as it was before the failing call. Reload failures are reported through the outcome of the
//! [`ReloadJob`] that produced them and never touch the live model.
//!
//! [`ByteArrayModel`]: crate::ByteArrayModel
//! [`ReloadJob`]: crate::sync::ReloadJob

use std::io;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors from operations on a [`ByteArrayModel`](crate::ByteArrayModel)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// An offset or range fell outside of the model
    ///
    /// `size` gives the size of the model at the time of the call.
    #[error("range {}..{} out of bounds for model of size {size}", .range.start, .range.end)]
    OutOfRange { range: Range<usize>, size: usize },

    /// The two ranges given to `swap` intersect
    #[error("swap ranges {}..{} and {}..{} overlap", .first.start, .first.end, .second.start, .second.end)]
    Overlap {
        first: Range<usize>,
        second: Range<usize>,
    },

    /// A mutation was attempted while the model was marked read-only
    #[error("model is read-only")]
    ReadOnlyViolation,

    /// Computing `offset + len` (or the size after an insertion) overflowed `usize`
    #[error("offset {offset} + length {len} overflows")]
    Overflow { offset: usize, len: usize },
}

impl ModelError {
    pub(crate) fn out_of_range(range: Range<usize>, size: usize) -> Self {
        ModelError::OutOfRange { range, size }
    }
}

/// Errors from reloading a model's content from its file
#[derive(Debug, Clone, Error)]
pub enum ReloadError {
    /// Opening or reading the file failed
    ///
    /// The cause is kept behind an `Arc` so that the error can be published in the job's terminal
    /// state and handed to the owner at the same time.
    #[error("failed to read {}: {cause}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        cause: Arc<io::Error>,
    },

    /// The job was cancelled before it finished; no content was swapped in
    #[error("reload was cancelled")]
    Cancelled,

    /// The worker went away without reporting a result
    #[error("reload worker exited without reporting a result")]
    Lost,

    /// The job's result was already handed out by an earlier call
    #[error("reload result was already collected")]
    AlreadyCollected,
}

impl ReloadError {
    pub(crate) fn io(path: impl Into<PathBuf>, cause: io::Error) -> Self {
        ReloadError::Io {
            path: path.into(),
            cause: Arc::new(cause),
        }
    }

    /// Returns the kind of the underlying I/O error, if this is an [`Io`](Self::Io) error
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            ReloadError::Io { cause, .. } => Some(cause.kind()),
            _ => None,
        }
    }
}

/// Errors from loading a [`Config`](crate::config::Config)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {cause}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
