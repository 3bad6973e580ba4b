use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, HashCacheError>;

/// Errors produced by file hashing and hash cache lookups.
#[derive(Debug, thiserror::Error)]
pub enum HashCacheError {
    #[error("failed to read {path} for hashing: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no hash cache layer serves {path}")]
    UnhandledPath { path: PathBuf },
}
