//! Error types for mirrorboard-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::NodeId;

/// Errors raised while loading or saving the on-disk board and config files.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file path.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Failures reported by a [`crate::NodeStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("board error: {0}")]
    Board(#[from] BoardError),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node store unavailable: {0}")]
    Unavailable(String),
}

/// Per-parent failure of a remote directory lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network or connection level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-success status.
    #[error("remote returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// The remote answered but the payload could not be decoded.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// No answer within the configured bound.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BoardError {
    BoardError::Io {
        path: path.into(),
        source,
    }
}
