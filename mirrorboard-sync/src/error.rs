//! Error types for mirrorboard-sync.

use thiserror::Error;

use mirrorboard_core::{BoardError, StoreError};

/// Errors that abort a reconciliation pass.
///
/// Remote fetch failures never appear here: they are recorded on the
/// affected parent and the pass carries on.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local node store rejected a read or a mutation batch.
    #[error("node store error: {0}")]
    Store(#[from] StoreError),

    /// Board document could not be loaded or saved.
    #[error("board error: {0}")]
    Board(#[from] BoardError),
}
