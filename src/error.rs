//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Lookups never fail;
//! absence is `None`. Errors only come from construction and from waiting
//! on a worker that is no longer running.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background thread could not be started
    #[error("Failed to spawn cache worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// The serializing worker has stopped
    #[error("Cache worker is not running")]
    WorkerStopped,
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CacheError::InvalidConfig("shard_count must be a power of two".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: shard_count must be a power of two"
        );
        assert_eq!(
            CacheError::WorkerStopped.to_string(),
            "Cache worker is not running"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "no threads left");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::WorkerSpawn(_)));
    }
}
