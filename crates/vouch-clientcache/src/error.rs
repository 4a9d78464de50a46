//! Error types for client cache operations.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error returned by certificate sources, builders and retirement hooks.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors surfaced by [`crate::ClientCache::get`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// The certificate source returned no bytes, so no comparison was possible.
    #[error("certificate comparison failed: no certificate available")]
    NoCertificate,
    /// Reading the current certificate failed.
    #[error("failed to read current certificate")]
    Certificate {
        /// Underlying source error.
        #[source]
        source: BoxError,
    },
    /// A required rebuild failed; the previous handle stays cached.
    #[error("failed to build client")]
    Build {
        /// Underlying builder error.
        #[source]
        source: BoxError,
    },
    /// The caller canceled while waiting for the cache.
    #[error("client cache acquisition canceled")]
    Canceled,
}

/// Convenience alias for cache results.
pub type CacheResult<T> = Result<T, CacheError>;
