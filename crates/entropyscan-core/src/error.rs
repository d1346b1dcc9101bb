//! Error types for the classification engine.

use std::path::Path;
use thiserror::Error;

/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors that can occur while classifying a target.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Empty or otherwise unusable path argument.
    #[error("must provide a path to a file")]
    InvalidPath,

    /// Policy parameters out of range.
    #[error("invalid scan policy: {0}")]
    InvalidPolicy(String),

    /// Target is a directory, device, FIFO, socket or dangling link.
    #[error("file ({path}) is not a regular file")]
    NotRegularFile { path: String },

    /// Target exceeds the analyzable size ceiling.
    #[error("file ({path}) size ({size}) is too large to analyze (max allowed: {max})")]
    TooLarge { path: String, size: u64, max: u64 },

    /// Opening or reading the target failed.
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Directory walk failed somewhere other than a plain I/O error (loops).
    #[error("error walking directory ({path}): {reason}")]
    Walk { path: String, reason: String },

    /// `/proc` could not be listed.
    #[error("procfs error: {0}")]
    Procfs(String),

    /// The scan was interrupted.
    #[error("scan cancelled")]
    Cancelled,
}

/// Coarse classification of a [`ScanError`], used by sweeps to decide
/// between skipping a target and aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input from the caller; nothing was scanned.
    Malformed,
    /// Not a regular file.
    NotRegular,
    /// Over the size ceiling.
    SizeCeiling,
    /// The file disappeared between discovery and classification.
    Vanished,
    /// Any other I/O failure (permissions, EIO, ...).
    Io,
    /// User interrupt.
    Cancelled,
}

impl ScanError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub(crate) fn not_regular(path: impl AsRef<Path>) -> Self {
        Self::NotRegularFile {
            path: path.as_ref().display().to_string(),
        }
    }

    /// Returns true if the target no longer exists.
    #[must_use]
    pub fn is_vanished(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// Map this error onto the skip/abort taxonomy.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidPath | Self::InvalidPolicy(_) => ErrorCategory::Malformed,
            Self::NotRegularFile { .. } => ErrorCategory::NotRegular,
            Self::TooLarge { .. } => ErrorCategory::SizeCeiling,
            Self::Cancelled => ErrorCategory::Cancelled,
            e if e.is_vanished() => ErrorCategory::Vanished,
            Self::Io { .. } | Self::Walk { .. } | Self::Procfs(_) => ErrorCategory::Io,
        }
    }
}

impl ErrorCategory {
    /// Categories a sweep always absorbs without producing a record.
    #[must_use]
    pub const fn is_benign(self) -> bool {
        matches!(self, Self::NotRegular | Self::SizeCeiling | Self::Vanished)
    }
}
