use std::path::PathBuf;

use crate::embedding::Modality;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported document format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("{modality} embedding failed: {message}")]
    EmbeddingFailure {
        modality: Modality,
        message: String,
    },

    #[error("corrupt cache at {}: {reason}", dir.display())]
    CacheReadCorrupt { dir: PathBuf, reason: String },

    #[error("cannot write cache at {}: {source}", dir.display())]
    CacheWrite {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read directory {}: {source}", dir.display())]
    DirectoryUnreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid embedding bundle {}: {reason}", path.display())]
    InvalidBundle { path: PathBuf, reason: String },

    #[error("an index build is already running for {}", .0.display())]
    BuildInProgress(PathBuf),
}
