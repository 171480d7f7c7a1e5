//! Error types for the volume assembly crate.

use std::fmt;
use std::path::PathBuf;

use cfradial::RadarError;
use thiserror::Error;

/// Errors that can occur while indexing sweeps or processing a granule.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Failed to index sweep directory: {0}")]
    Indexing(String),

    #[error("Failed to read sweep {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: RadarError,
    },

    #[error("Failed to merge sweep {}: {source}", .path.display())]
    Merge {
        path: PathBuf,
        #[source]
        source: RadarError,
    },

    #[error("Malformed volume: {0}")]
    MalformedVolume(String),

    #[error("Failed to write volume {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: RadarError,
    },

    #[error("Failed to commit volume {}: {source}", .path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Window has {found} sweeps, expected {expected}")]
    WindowSizeMismatch { expected: usize, found: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Granule aborted: {0}")]
    Aborted(String),
}

impl AssemblyError {
    /// Taxonomy bucket used for logging and outcome reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Indexing(_) | Self::InvalidConfig(_) => FailureKind::Indexing,
            Self::Read { .. } => FailureKind::Read,
            Self::Merge { .. } => FailureKind::Merge,
            Self::MalformedVolume(_) => FailureKind::Correction,
            Self::Write { .. } | Self::Commit { .. } => FailureKind::Write,
            Self::WindowSizeMismatch { .. } => FailureKind::WindowSizeMismatch,
            Self::Aborted(_) => FailureKind::Aborted,
        }
    }
}

/// Coarse failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Indexing,
    Read,
    Merge,
    Correction,
    Write,
    WindowSizeMismatch,
    /// The granule panicked
    Aborted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indexing => "indexing_error",
            Self::Read => "read_failure",
            Self::Merge => "merge_failure",
            Self::Correction => "malformed_volume",
            Self::Write => "write_failure",
            Self::WindowSizeMismatch => "window_size_mismatch",
            Self::Aborted => "granule_aborted",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result type for assembly operations.
pub type Result<T> = std::result::Result<T, AssemblyError>;
