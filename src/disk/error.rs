use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot open database file {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("Corrupt meta page: {0}")]
    CorruptMeta(String),

    #[error("Database file is full")]
    Full,
}

pub type DiskResult<T> = Result<T, DiskError>;
