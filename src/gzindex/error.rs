//! Error type for the gzip indexer (`builder`, `store`, `inflate`).
use crate::error::{ErrorKind, TraceError};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("compression: {0}")]
    Compression(String),
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("initialization: {0}")]
    Initialization(String),
}

impl From<IndexError> for TraceError {
    fn from(e: IndexError) -> Self {
        let kind = match &e {
            IndexError::Io(_) => ErrorKind::FileIo,
            IndexError::Sqlite(_) => ErrorKind::IndexCorrupt,
            IndexError::Compression(_) => ErrorKind::Compression,
            IndexError::IndexCorrupt(_) => ErrorKind::IndexCorrupt,
            IndexError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            IndexError::Initialization(_) => ErrorKind::Initialization,
        };
        TraceError::new(kind, e.to_string())
    }
}
