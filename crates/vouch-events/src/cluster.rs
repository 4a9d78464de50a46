//! Cluster-facing client contracts consumed by the headless watcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClusterResult;
use crate::payloads::HeadlessState;
use crate::watch::ResourceWatcher;

/// Connection to one cluster's backend.
#[async_trait]
pub trait ClusterClient: ResourceWatcher {
    /// Stable URI identifying the cluster.
    fn uri(&self) -> &str;

    /// Whether the local session for this cluster is currently usable.
    fn connected(&self) -> bool;

    /// Record an approve/deny decision for `request_id`.
    async fn update_headless_state(
        &self,
        request_id: &str,
        state: HeadlessState,
    ) -> ClusterResult<()>;
}

/// Directory of clusters known to the local process.
pub trait ClusterStore: Send + Sync {
    /// Resolve a cluster by URI.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClusterError::NotFound`] for unknown URIs.
    fn resolve(&self, uri: &str) -> ClusterResult<Arc<dyn ClusterClient>>;

    /// Every known cluster, connected or not.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be read.
    fn read_all(&self) -> ClusterResult<Vec<Arc<dyn ClusterClient>>>;
}
