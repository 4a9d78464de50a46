//! Error types for watch streams and cluster calls.

use std::error::Error as StdError;

use thiserror::Error;

use crate::payloads::WatchKind;

/// Boxed source error carried across the backend boundary.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Liveness failures reported by a watch stream.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Backend does not serve this kind (older backend version).
    #[error("watch kind not implemented by backend")]
    NotImplemented {
        /// Kind that was requested.
        kind: WatchKind,
    },
    /// Stream ended without reporting a cause.
    #[error("watch stream closed")]
    Closed,
    /// Stream was canceled by its owner.
    #[error("watch stream canceled")]
    Canceled,
    /// Transport or backend failure while streaming.
    #[error("watch stream failed")]
    Stream {
        /// Kind being streamed when the failure occurred.
        kind: WatchKind,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
}

impl WatchError {
    /// Whether the backend reported the kind as unsupported.
    #[must_use]
    pub const fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }

    /// Wrap a transport failure for `kind`.
    pub fn stream(kind: WatchKind, source: impl Into<BoxError>) -> Self {
        Self::Stream {
            kind,
            source: source.into(),
        }
    }
}

/// Result alias for watch operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Errors raised by cluster RPCs and the cluster directory.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Cluster URI is not known to the directory.
    #[error("cluster not found")]
    NotFound {
        /// URI that failed to resolve.
        uri: String,
    },
    /// Backend rejected the call.
    #[error("cluster call rejected")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// Backend-provided detail.
        message: String,
    },
    /// Backend could not be reached.
    #[error("cluster unavailable")]
    Unavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
}

/// Result alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;
