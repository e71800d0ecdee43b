//! Storage backends
//!
//! File-based key/value documents standing in for browser local storage.

mod local;

pub use local::LocalStorage;

use thiserror::Error;

/// Failure reading or writing a stored document
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt document '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
