//! Error types for the headless watcher.

use thiserror::Error;
use vouch_events::{ClusterError, OpType, WatchError, WatchKind};

/// Errors raised by [`crate::HeadlessWatcher`] and its watch loops.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// The cluster directory could not resolve or list clusters.
    #[error("failed to resolve cluster")]
    Cluster {
        /// URI being resolved, when a single cluster was requested.
        uri: Option<String>,
        /// Directory failure.
        #[source]
        source: ClusterError,
    },
    /// No watch is registered for the cluster.
    #[error("no headless watcher for cluster")]
    WatcherNotFound {
        /// Cluster URI.
        uri: String,
    },
    /// The watch ended before its pending stream initialised.
    #[error("headless watch ended before initialisation")]
    InitAborted {
        /// Cluster URI.
        uri: String,
    },
    /// The watcher has been shut down.
    #[error("headless watcher is shut down")]
    ShutDown,
    /// Forwarding an approve/deny decision failed.
    #[error("failed to update headless authentication state")]
    UpdateState {
        /// Cluster URI.
        uri: String,
        /// Request being resolved.
        request_id: String,
        /// Backend failure.
        #[source]
        source: ClusterError,
    },
    /// A watch stream could not be opened or failed while streaming.
    #[error("headless watch stream failed")]
    Stream {
        /// Stream that failed.
        kind: WatchKind,
        /// Stream failure.
        #[source]
        source: WatchError,
    },
    /// A stream delivered an operation out of contract.
    #[error("unexpected event on headless watch stream")]
    UnexpectedEvent {
        /// Stream that misbehaved.
        kind: WatchKind,
        /// Operation required at this point.
        expected: OpType,
        /// Operation received.
        got: OpType,
    },
    /// A stream delivered a resource of the wrong kind.
    #[error("unexpected resource on headless watch stream")]
    UnexpectedResource {
        /// Stream that misbehaved.
        kind: WatchKind,
        /// Kind of resource received, if any.
        resource_kind: Option<String>,
    },
}

impl HeadlessError {
    pub(crate) const fn stream(kind: WatchKind, source: WatchError) -> Self {
        Self::Stream { kind, source }
    }

    /// Whether the backend does not serve headless watches at all.
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::Stream { source, .. } if source.is_not_implemented())
    }
}

/// Convenience alias for watcher results.
pub type HeadlessResult<T> = Result<T, HeadlessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_implemented_is_detected_through_stream_errors() {
        let unsupported = HeadlessError::stream(
            WatchKind::PendingHeadless,
            WatchError::NotImplemented {
                kind: WatchKind::PendingHeadless,
            },
        );
        assert!(unsupported.is_not_implemented());
        assert!(!HeadlessError::stream(WatchKind::Headless, WatchError::Closed).is_not_implemented());
        assert!(
            !HeadlessError::WatcherNotFound {
                uri: "cluster://a".into()
            }
            .is_not_implemented()
        );
    }
}
