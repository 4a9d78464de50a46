//! In-memory cluster backend built on [`EventFanout`].

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use vouch_events::{
    ClusterClient, ClusterError, ClusterResult, ClusterStore, HeadlessAuthentication,
    HeadlessState, Resource, ResourceWatcher, Watch, WatchError, WatchEvent, WatchKind,
    WatchResult,
};

use crate::bus::EventFanout;

const STREAM_BUFFER: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fake cluster whose watch streams are fed from a shared event fan-out.
///
/// Every stream opens with `init` (unless a different first event was
/// scripted) and then forwards published events its kind admits.
pub struct MemoryCluster {
    uri: String,
    pending_feed: EventFanout,
    resolution_feed: EventFanout,
    connected: AtomicBool,
    unsupported: AtomicBool,
    failing_opens: AtomicUsize,
    scripted_first: Mutex<VecDeque<WatchEvent>>,
    opened: Mutex<HashMap<WatchKind, usize>>,
    breaker: Mutex<CancellationToken>,
    requests: Mutex<HashMap<String, HeadlessAuthentication>>,
    updates: Mutex<Vec<(String, HeadlessState)>>,
}

impl MemoryCluster {
    /// Connected cluster at `uri`.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            uri: uri.into(),
            pending_feed: EventFanout::default(),
            resolution_feed: EventFanout::default(),
            connected: AtomicBool::new(true),
            unsupported: AtomicBool::new(false),
            failing_opens: AtomicUsize::new(0),
            scripted_first: Mutex::new(VecDeque::new()),
            opened: Mutex::new(HashMap::new()),
            breaker: Mutex::new(CancellationToken::new()),
            requests: Mutex::new(HashMap::new()),
            updates: Mutex::new(Vec::new()),
        })
    }

    /// Toggle the connection flag consulted by watch loops.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every subsequently opened stream fail with "not implemented".
    pub fn set_unsupported(&self, unsupported: bool) {
        self.unsupported.store(unsupported, Ordering::SeqCst);
    }

    /// Refuse the next `count` stream opens with a transport error.
    pub fn fail_next_opens(&self, count: usize) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Deliver `event` instead of `init` as the first event of the next
    /// pending stream.
    pub fn script_pending_first_event(&self, event: WatchEvent) {
        lock(&self.scripted_first).push_back(event);
    }

    /// End every currently open stream with a transport error.
    pub fn break_streams(&self) {
        let previous = std::mem::replace(&mut *lock(&self.breaker), CancellationToken::new());
        previous.cancel();
    }

    /// Number of streams opened for `kind`.
    #[must_use]
    pub fn opened(&self, kind: WatchKind) -> usize {
        lock(&self.opened).get(&kind).copied().unwrap_or(0)
    }

    /// Streams currently subscribed to the fan-out.
    #[must_use]
    pub fn live_streams(&self) -> usize {
        self.pending_feed.subscriber_count() + self.resolution_feed.subscriber_count()
    }

    /// Publish a raw event to every stream.
    pub fn publish(&self, event: WatchEvent) {
        self.pending_feed.publish(event.clone());
        self.resolution_feed.publish(event);
    }

    /// Publish `event` to streams of `kind` only, letting a test order the
    /// two streams against each other.
    pub fn publish_to(&self, kind: WatchKind, event: WatchEvent) {
        self.feed(kind).publish(event);
    }

    /// Start a headless login for `user` and publish it as pending.
    pub fn begin_headless_login(&self, user: &str, client_ip: &str) -> HeadlessAuthentication {
        let request = HeadlessAuthentication::pending(user, client_ip);
        lock(&self.requests).insert(request.name.clone(), request.clone());
        self.publish(WatchEvent::put(Resource::HeadlessAuthentication(
            request.clone(),
        )));
        request
    }

    /// Move `name` to `state` and publish the change.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Rejected`] for unknown requests.
    pub fn transition(&self, name: &str, state: HeadlessState) -> ClusterResult<()> {
        let updated = {
            let mut requests = lock(&self.requests);
            let request = requests.get_mut(name).ok_or_else(|| ClusterError::Rejected {
                operation: "headless.transition",
                message: format!("unknown headless authentication {name}"),
            })?;
            request.state = state;
            request.clone()
        };
        self.publish(WatchEvent::put(Resource::HeadlessAuthentication(updated)));
        Ok(())
    }

    /// Delete `name` and publish the removal.
    pub fn remove(&self, name: &str) {
        lock(&self.requests).remove(name);
        self.publish(WatchEvent::delete(Resource::headless_header(name)));
    }

    /// Decisions received through [`ClusterClient::update_headless_state`].
    #[must_use]
    pub fn updates(&self) -> Vec<(String, HeadlessState)> {
        lock(&self.updates).clone()
    }

    const fn feed(&self, kind: WatchKind) -> &EventFanout {
        match kind {
            WatchKind::PendingHeadless => &self.pending_feed,
            WatchKind::Headless => &self.resolution_feed,
        }
    }

    fn record_open(&self, kind: WatchKind) {
        *lock(&self.opened).entry(kind).or_insert(0) += 1;
    }

    fn take_failing_open(&self) -> bool {
        self.failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

#[async_trait]
impl ResourceWatcher for MemoryCluster {
    async fn watch(&self, kind: WatchKind, cancel: CancellationToken) -> WatchResult<Watch> {
        self.record_open(kind);
        if self.take_failing_open() {
            return Err(WatchError::stream(
                kind,
                io::Error::other("backend unavailable"),
            ));
        }

        let (sender, watch) = Watch::channel(kind, STREAM_BUFFER, &cancel);
        if self.unsupported.load(Ordering::SeqCst) {
            sender.fail(WatchError::NotImplemented { kind });
            return Ok(watch);
        }

        let first = match kind {
            WatchKind::PendingHeadless => lock(&self.scripted_first).pop_front(),
            WatchKind::Headless => None,
        }
        .unwrap_or_else(WatchEvent::init);
        let mut stream = self.feed(kind).subscribe();
        let breaker = lock(&self.breaker).clone();

        tokio::spawn(async move {
            if !sender.send(first).await {
                return;
            }
            loop {
                tokio::select! {
                    () = sender.closed() => return,
                    () = breaker.cancelled() => {
                        sender.fail(WatchError::stream(kind, io::Error::other("stream reset")));
                        return;
                    }
                    item = stream.next() => match item {
                        Some(Ok(event)) => {
                            if kind.admits(&event) && !sender.send(event).await {
                                return;
                            }
                        }
                        Some(Err(lagged)) => {
                            sender.fail(WatchError::stream(kind, lagged));
                            return;
                        }
                        None => return,
                    },
                }
            }
        });
        Ok(watch)
    }
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn update_headless_state(
        &self,
        request_id: &str,
        state: HeadlessState,
    ) -> ClusterResult<()> {
        self.transition(request_id, state)?;
        lock(&self.updates).push((request_id.to_string(), state));
        Ok(())
    }
}

/// Directory of [`MemoryCluster`]s.
#[derive(Default)]
pub struct MemoryClusterStore {
    clusters: Mutex<Vec<Arc<MemoryCluster>>>,
}

impl MemoryClusterStore {
    /// Directory holding `clusters`.
    #[must_use]
    pub fn with_clusters(clusters: &[Arc<MemoryCluster>]) -> Arc<Self> {
        Arc::new(Self {
            clusters: Mutex::new(clusters.to_vec()),
        })
    }

    /// Add `cluster` to the directory.
    pub fn insert(&self, cluster: Arc<MemoryCluster>) {
        lock(&self.clusters).push(cluster);
    }
}

impl ClusterStore for MemoryClusterStore {
    fn resolve(&self, uri: &str) -> ClusterResult<Arc<dyn ClusterClient>> {
        lock(&self.clusters)
            .iter()
            .find(|cluster| cluster.uri == uri)
            .map(|cluster| Arc::clone(cluster) as Arc<dyn ClusterClient>)
            .ok_or_else(|| ClusterError::NotFound {
                uri: uri.to_string(),
            })
    }

    fn read_all(&self) -> ClusterResult<Vec<Arc<dyn ClusterClient>>> {
        Ok(lock(&self.clusters)
            .iter()
            .map(|cluster| Arc::clone(cluster) as Arc<dyn ClusterClient>)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streams_start_with_init_and_filter_by_kind() {
        let cluster = MemoryCluster::new("cluster://root");
        let cancel = CancellationToken::new();
        let mut pending = cluster
            .watch(WatchKind::PendingHeadless, cancel.clone())
            .await
            .expect("pending watch");
        let mut all = cluster
            .watch(WatchKind::Headless, cancel.clone())
            .await
            .expect("resolution watch");

        assert_eq!(pending.next().await.expect("init"), WatchEvent::init());
        assert_eq!(all.next().await.expect("init"), WatchEvent::init());

        let request = cluster.begin_headless_login("alice", "198.51.100.4");
        cluster
            .transition(&request.name, HeadlessState::Approved)
            .expect("transition");

        let first = pending.next().await.expect("pending put");
        assert_eq!(first.resource.as_ref().map(Resource::name), Some(request.name.as_str()));
        let put = all.next().await.expect("pending put on resolution stream");
        assert_eq!(put.op, vouch_events::OpType::Put);
        let approved = all.next().await.expect("approved put");
        assert_eq!(
            approved
                .resource
                .as_ref()
                .and_then(Resource::as_headless)
                .map(|request| request.state),
            Some(HeadlessState::Approved)
        );
    }

    #[tokio::test]
    async fn unsupported_streams_report_not_implemented() {
        let cluster = MemoryCluster::new("cluster://old");
        cluster.set_unsupported(true);
        let mut watch = cluster
            .watch(WatchKind::PendingHeadless, CancellationToken::new())
            .await
            .expect("watch handle");
        let err = watch.next().await.expect_err("not implemented");
        assert!(err.is_not_implemented());
    }

    #[tokio::test]
    async fn failing_opens_are_counted_down() {
        let cluster = MemoryCluster::new("cluster://flaky");
        cluster.fail_next_opens(1);
        let cancel = CancellationToken::new();
        assert!(cluster.watch(WatchKind::Headless, cancel.clone()).await.is_err());
        assert!(cluster.watch(WatchKind::Headless, cancel).await.is_ok());
        assert_eq!(cluster.opened(WatchKind::Headless), 2);
    }

    #[tokio::test]
    async fn targeted_publish_reaches_one_kind() {
        let cluster = MemoryCluster::new("cluster://root");
        let cancel = CancellationToken::new();
        let mut pending = cluster
            .watch(WatchKind::PendingHeadless, cancel.clone())
            .await
            .expect("pending watch");
        let mut all = cluster
            .watch(WatchKind::Headless, cancel)
            .await
            .expect("resolution watch");
        assert_eq!(pending.next().await.expect("init"), WatchEvent::init());
        assert_eq!(all.next().await.expect("init"), WatchEvent::init());

        cluster.publish_to(
            WatchKind::Headless,
            WatchEvent::delete(Resource::headless_header("only-resolution")),
        );
        cluster.publish(WatchEvent::put(Resource::HeadlessAuthentication(
            HeadlessAuthentication::pending("bob", "198.51.100.5"),
        )));

        let first = all.next().await.expect("targeted delete");
        assert_eq!(first.resource.as_ref().map(Resource::name), Some("only-resolution"));
        let put = pending.next().await.expect("broadcast put");
        assert_eq!(put.op, vouch_events::OpType::Put);
        assert_eq!(cluster.live_streams(), 2);
    }

    #[test]
    fn store_resolves_known_clusters() {
        let store = MemoryClusterStore::with_clusters(&[MemoryCluster::new("cluster://a")]);
        assert!(store.resolve("cluster://a").is_ok());
        assert!(matches!(
            store.resolve("cluster://missing"),
            Err(ClusterError::NotFound { .. })
        ));
        assert_eq!(store.read_all().map(|all| all.len()).ok(), Some(1));
    }
}
