//! Cluster-keyed orchestrator for headless watch loops.
//!
//! # Design
//! - One owned instance per process; nothing here is global.
//! - The cluster registry lock is never held across an await.
//! - Each watch carries a generation so a loop that exits on its own only
//!   removes its own registration, never a replacement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};
use vouch_config::HeadlessSettings;
use vouch_events::{ClusterClient, ClusterStore, HeadlessState};
use vouch_telemetry::Metrics;

use crate::error::{HeadlessError, HeadlessResult};
use crate::notify::{ApproverNotifier, NotificationPool};
use crate::registry::RequestRegistry;
use crate::retry::LinearRetry;
use crate::session::{SessionExit, WatchSession};

/// Tunables for [`HeadlessWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherOptions {
    /// Ceiling for reconnect backoff.
    pub max_backoff: Duration,
    /// Lifetime of each approver notification.
    pub login_timeout: Duration,
    /// Approver notifications allowed in flight across all clusters.
    pub notify_concurrency: usize,
}

impl From<&HeadlessSettings> for WatcherOptions {
    fn from(settings: &HeadlessSettings) -> Self {
        Self {
            max_backoff: settings.max_watcher_backoff(),
            login_timeout: settings.headless_login_timeout(),
            notify_concurrency: settings.notify_concurrency,
        }
    }
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self::from(&HeadlessSettings::default())
    }
}

struct WatchHandle {
    generation: u64,
    token: CancellationToken,
    requests: Arc<RequestRegistry>,
    initialized: watch::Receiver<bool>,
}

struct WatcherInner {
    clusters: Arc<dyn ClusterStore>,
    options: WatcherOptions,
    watches: Mutex<HashMap<String, WatchHandle>>,
    next_generation: AtomicU64,
    root: CancellationToken,
    tracker: TaskTracker,
    pool: NotificationPool,
    metrics: Metrics,
}

/// Watches every connected cluster for pending headless logins and relays
/// them to the approver.
#[derive(Clone)]
pub struct HeadlessWatcher {
    inner: Arc<WatcherInner>,
}

impl HeadlessWatcher {
    /// Create a watcher and start its notification workers.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(
        clusters: Arc<dyn ClusterStore>,
        notifier: Arc<dyn ApproverNotifier>,
        options: WatcherOptions,
        metrics: Metrics,
    ) -> Self {
        let root = CancellationToken::new();
        let tracker = TaskTracker::new();
        let pool = NotificationPool::spawn(
            options.notify_concurrency,
            notifier,
            metrics.clone(),
            &tracker,
            root.clone(),
        );
        Self {
            inner: Arc::new(WatcherInner {
                clusters,
                options,
                watches: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                root,
                tracker,
                pool,
                metrics,
            }),
        }
    }

    /// Start watching `cluster_uri`, replacing any existing watch.
    ///
    /// With `wait_for_init`, returns once the pending stream has delivered
    /// its initial event.
    ///
    /// # Errors
    ///
    /// - [`HeadlessError::Cluster`] when the URI does not resolve.
    /// - [`HeadlessError::ShutDown`] after [`HeadlessWatcher::shutdown`].
    /// - [`HeadlessError::InitAborted`] when the watch ends before init.
    pub async fn start(&self, cluster_uri: &str, wait_for_init: bool) -> HeadlessResult<()> {
        let cluster =
            self.inner
                .clusters
                .resolve(cluster_uri)
                .map_err(|source| HeadlessError::Cluster {
                    uri: Some(cluster_uri.to_string()),
                    source,
                })?;
        let (token, mut initialized) = self.launch(cluster)?;
        if !wait_for_init {
            return Ok(());
        }

        tokio::select! {
            biased;
            ready = initialized.wait_for(|ready| *ready) => {
                ready.map(|_| ()).map_err(|_| HeadlessError::InitAborted {
                    uri: cluster_uri.to_string(),
                })
            }
            () = token.cancelled() => Err(HeadlessError::InitAborted {
                uri: cluster_uri.to_string(),
            }),
        }
    }

    /// Start a watch for every connected cluster without waiting for init.
    ///
    /// # Errors
    ///
    /// Returns the first failure; clusters after it are not started.
    pub fn start_all(&self) -> HeadlessResult<()> {
        let clusters = self
            .inner
            .clusters
            .read_all()
            .map_err(|source| HeadlessError::Cluster { uri: None, source })?;
        for cluster in clusters {
            if cluster.connected() {
                self.launch(cluster)?;
            }
        }
        Ok(())
    }

    /// Stop and forget the watch for `cluster_uri`.
    ///
    /// # Errors
    ///
    /// Returns [`HeadlessError::WatcherNotFound`] when nothing is watching it.
    pub fn stop(&self, cluster_uri: &str) -> HeadlessResult<()> {
        let removed = {
            let mut watches = self.inner.lock_watches();
            let removed = watches.remove(cluster_uri);
            self.inner.metrics.set_active_watches(watches.len());
            removed
        };
        let handle = removed.ok_or_else(|| HeadlessError::WatcherNotFound {
            uri: cluster_uri.to_string(),
        })?;
        handle.token.cancel();
        debug!(cluster = %cluster_uri, "stopped headless watch");
        Ok(())
    }

    /// Stop every watch.
    pub fn stop_all(&self) {
        let drained: Vec<(String, WatchHandle)> = {
            let mut watches = self.inner.lock_watches();
            let drained = watches.drain().collect();
            self.inner.metrics.set_active_watches(0);
            drained
        };
        for (uri, handle) in drained {
            handle.token.cancel();
            debug!(cluster = %uri, "stopped headless watch");
        }
    }

    /// Forward an approve/deny decision for `request_id` to the backend.
    /// Local state changes only when the resulting event arrives.
    ///
    /// # Errors
    ///
    /// Returns [`HeadlessError::Cluster`] when the URI does not resolve and
    /// [`HeadlessError::UpdateState`] when the backend call fails.
    pub async fn update_state(
        &self,
        cluster_uri: &str,
        request_id: &str,
        state: HeadlessState,
    ) -> HeadlessResult<()> {
        let cluster =
            self.inner
                .clusters
                .resolve(cluster_uri)
                .map_err(|source| HeadlessError::Cluster {
                    uri: Some(cluster_uri.to_string()),
                    source,
                })?;
        cluster
            .update_headless_state(request_id, state)
            .await
            .map_err(|source| HeadlessError::UpdateState {
                uri: cluster_uri.to_string(),
                request_id: request_id.to_string(),
                source,
            })
    }

    /// Whether a watch is registered for `cluster_uri`.
    #[must_use]
    pub fn is_watching(&self, cluster_uri: &str) -> bool {
        self.inner.lock_watches().contains_key(cluster_uri)
    }

    /// URIs with a registered watch, sorted.
    #[must_use]
    pub fn active_watches(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.inner.lock_watches().keys().cloned().collect();
        uris.sort();
        uris
    }

    /// Whether the watch for `cluster_uri` has seen its pending stream's init.
    #[must_use]
    pub fn is_initialized(&self, cluster_uri: &str) -> bool {
        self.inner
            .lock_watches()
            .get(cluster_uri)
            .is_some_and(|handle| *handle.initialized.borrow())
    }

    /// Outstanding approver notifications for `cluster_uri`.
    #[must_use]
    pub fn pending_requests(&self, cluster_uri: &str) -> usize {
        self.inner
            .lock_watches()
            .get(cluster_uri)
            .map_or(0, |handle| handle.requests.len())
    }

    /// Stop every watch, cancel outstanding notifications and wait for all
    /// background tasks to finish.
    pub async fn shutdown(&self) {
        self.stop_all();
        self.inner.root.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("headless watcher shut down");
    }

    fn launch(
        &self,
        cluster: Arc<dyn ClusterClient>,
    ) -> HeadlessResult<(CancellationToken, watch::Receiver<bool>)> {
        if self.inner.root.is_cancelled() {
            return Err(HeadlessError::ShutDown);
        }
        let uri = cluster.uri().to_string();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.inner.root.child_token();
        let requests = Arc::new(RequestRegistry::new(self.inner.options.login_timeout));
        let (init_tx, init_rx) = watch::channel(false);

        let session = WatchSession {
            cluster,
            uri: uri.clone(),
            token: token.clone(),
            requests: Arc::clone(&requests),
            initialized: init_tx,
            pool: self.inner.pool.clone(),
            retry: LinearRetry::for_max_backoff(self.inner.options.max_backoff),
            login_timeout: self.inner.options.login_timeout,
            metrics: self.inner.metrics.clone(),
        };

        {
            let mut watches = self.inner.lock_watches();
            if let Some(previous) = watches.insert(
                uri.clone(),
                WatchHandle {
                    generation,
                    token: token.clone(),
                    requests,
                    initialized: init_rx.clone(),
                },
            ) {
                previous.token.cancel();
                debug!(cluster = %uri, "replaced existing headless watch");
            }
            self.inner.metrics.set_active_watches(watches.len());
        }

        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(async move {
            let exit = session.run().await;
            inner.on_session_exit(&uri, generation, exit);
        });
        Ok((token, init_rx))
    }
}

impl WatcherInner {
    fn lock_watches(&self) -> MutexGuard<'_, HashMap<String, WatchHandle>> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_session_exit(&self, uri: &str, generation: u64, exit: SessionExit) {
        if exit == SessionExit::Canceled {
            return;
        }
        let removed = {
            let mut watches = self.lock_watches();
            let owned = watches
                .get(uri)
                .is_some_and(|handle| handle.generation == generation);
            let removed = if owned { watches.remove(uri) } else { None };
            self.metrics.set_active_watches(watches.len());
            removed
        };
        if let Some(handle) = removed {
            handle.token.cancel();
            debug!(cluster = %uri, ?exit, "headless watch removed itself");
        }
    }
}
