use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Embedded store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to encode or decode a scaffold record: {0}")]
    Codec(#[from] bincode::Error),

    #[error("I/O error on cache storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache record: {0}")]
    Corrupt(String),

    #[error("Scaffold id {0} is not in the cache")]
    MissingRecord(u64),

    #[error("Scaffold {parent} links to child {child}, which is not in the cache")]
    DanglingChild { parent: u64, child: u64 },

    #[error("Scaffold '{key}' has no id; merge the tree before linking it")]
    Unmerged { key: String },

    #[error("The {0} backend needs a storage path")]
    MissingPath(&'static str),

    #[error("Cache lock was poisoned by a panicking writer")]
    Poisoned,
}

impl From<sled::transaction::TransactionError<CacheError>> for CacheError {
    fn from(err: sled::transaction::TransactionError<CacheError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(inner) => CacheError::Sled(inner),
        }
    }
}
