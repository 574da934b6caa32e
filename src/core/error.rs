//! Error types for the persisted registry and quote store.
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or write one of the persisted JSON files.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error while reading, writing or replacing the file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file exists but does not hold the expected JSON document.
    #[error("Corrupt store {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failure while encoding a value for persistence.
    #[error("JSON serialization error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
