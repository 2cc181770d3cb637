use thiserror::Error;

/// Failures surfaced by the result cache.
///
/// A cache miss is never an error, see `CacheResult::Miss`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store rejected or failed a write.
    #[error("failed to write result to storage @ {key}")]
    StorageWrite {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The store failed while reading an existing result.
    #[error("failed to read result from storage @ {key}")]
    StorageRead {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl CacheError {
    pub fn key(&self) -> &str {
        match self {
            Self::StorageWrite { key, .. } => key,
            Self::StorageRead { key, .. } => key,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
