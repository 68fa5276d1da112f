use std::fmt;
use std::io;

use crate::format::{ArchiveFormat, CompressionAlgorithm};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which half of a codec a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Error taxonomy for the transcoding core.
///
/// Capability errors are raised at resolution time, before any stream is
/// opened. Entry errors abort the whole operation: there is no partial
/// archive and no retry anywhere in this crate, since corruption and
/// configuration mismatches are not transient.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive format {format} does not support {direction}")]
    UnsupportedFormat {
        format: ArchiveFormat,
        direction: Direction,
    },

    #[error("compression algorithm {algorithm} does not support {direction}")]
    UnsupportedAlgorithm {
        algorithm: CompressionAlgorithm,
        direction: Direction,
    },

    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },

    /// Staging or writing a single entry failed during compression.
    /// The whole write is abandoned; no artifact is published.
    #[error("failed to materialize archive entry '{name}'")]
    EntryMaterialization {
        name: String,
        #[source]
        source: io::Error,
    },

    /// An archive entry's data cannot be decoded (corruption, or a feature
    /// of the container this catalogue does not implement).
    #[error("unable to read archive entry '{name}'")]
    UnreadableEntry {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Closing or finalizing a stream layer failed. Only surfaced from the
    /// success path; a failure path drops the layers instead so the primary
    /// error is never masked.
    #[error("failed to finalize {stage} stage")]
    Teardown {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("malformed archive: {0}")]
    Corrupt(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Failure in the byte-storage collaborator.
    #[error("byte storage failure")]
    Storage(#[source] anyhow::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        Error::Storage(err)
    }
}
