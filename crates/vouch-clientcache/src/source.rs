//! Collaborators the cache is generic over.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;

/// Reads the certificate the next client should be built from.
pub trait CertificateSource: Send + Sync {
    /// Current certificate bytes. `Ok(None)` (or empty bytes) means no
    /// certificate is present, which is distinct from a read failure.
    ///
    /// # Errors
    ///
    /// Returns an error when the certificate cannot be read.
    fn current_certificate(&self) -> Result<Option<Vec<u8>>, BoxError>;
}

/// Builds a fresh client from the current credential.
#[async_trait]
pub trait ClientBuilder<C>: Send + Sync {
    /// Build a client, honouring `cancel`.
    ///
    /// # Errors
    ///
    /// Returns an error when the client cannot be constructed.
    async fn build(&self, cancel: &CancellationToken) -> Result<C, BoxError>;
}

/// Closes a client once it has been superseded.
#[async_trait]
pub trait RetireClient: Send + Sync {
    /// Release resources held by the client.
    ///
    /// # Errors
    ///
    /// Returns an error when shutdown fails; the cache logs it and moves on.
    async fn close(&self) -> Result<(), BoxError>;
}
