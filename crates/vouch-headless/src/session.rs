//! One cluster's watch loop.
//!
//! An iteration opens the pending and resolution streams, waits for the
//! pending stream's `init`, then multiplexes both streams until one fails or
//! the watch is canceled. Failed iterations are retried with linear backoff;
//! an unsupported backend or a disconnected cluster ends the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vouch_events::{ClusterClient, OpType, Resource, Watch, WatchEvent, WatchKind};
use vouch_telemetry::Metrics;

use crate::error::{HeadlessError, HeadlessResult};
use crate::notify::{NotificationJob, NotificationPool, PendingNotification};
use crate::registry::{RequestRegistry, instant_after};
use crate::retry::LinearRetry;

/// Why a watch loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionExit {
    /// The watch token fired.
    Canceled,
    /// The backend does not serve headless watches.
    NotImplemented,
    /// The cluster is no longer connected.
    Disconnected,
}

pub(crate) struct WatchSession {
    pub(crate) cluster: Arc<dyn ClusterClient>,
    pub(crate) uri: String,
    pub(crate) token: CancellationToken,
    pub(crate) requests: Arc<RequestRegistry>,
    pub(crate) initialized: watch::Sender<bool>,
    pub(crate) pool: NotificationPool,
    pub(crate) retry: LinearRetry,
    pub(crate) login_timeout: Duration,
    pub(crate) metrics: Metrics,
}

impl WatchSession {
    pub(crate) async fn run(mut self) -> SessionExit {
        debug!(cluster = %self.uri, "starting headless watch loop");
        let exit = loop {
            if !self.cluster.connected() {
                debug!(cluster = %self.uri, "cluster not connected; leaving headless watch loop");
                break SessionExit::Disconnected;
            }

            let err = match self.iterate().await {
                Ok(()) => break SessionExit::Canceled,
                Err(err) => err,
            };
            if err.is_not_implemented() {
                debug!(cluster = %self.uri, error = %err, "headless watch not supported by backend");
                break SessionExit::NotImplemented;
            }
            if self.token.is_cancelled() {
                break SessionExit::Canceled;
            }

            let delay = self.retry.delay();
            tokio::select! {
                biased;
                () = self.token.cancelled() => break SessionExit::Canceled,
                () = tokio::time::sleep(delay) => {
                    debug!(
                        cluster = %self.uri,
                        error = %err,
                        waited_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "restarting headless watch after error"
                    );
                    self.retry.inc();
                    self.metrics.inc_watch_restart();
                }
            }
        };
        self.requests.cancel_all();
        exit
    }

    /// One watch iteration. `Ok` means the watch was canceled.
    async fn iterate(&mut self) -> HeadlessResult<()> {
        let mut pending = self.open(WatchKind::PendingHeadless).await?;
        let mut resolution = self.open(WatchKind::Headless).await?;

        let first = tokio::select! {
            biased;
            () = self.token.cancelled() => return Ok(()),
            event = pending.next() => {
                event.map_err(|source| HeadlessError::stream(WatchKind::PendingHeadless, source))?
            }
        };
        if first.op != OpType::Init {
            return Err(HeadlessError::UnexpectedEvent {
                kind: WatchKind::PendingHeadless,
                expected: OpType::Init,
                got: first.op,
            });
        }
        self.initialized.send_replace(true);
        self.retry.reset();
        debug!(cluster = %self.uri, "headless watch initialised");

        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => return Ok(()),
                event = pending.next() => {
                    let event = event
                        .map_err(|source| HeadlessError::stream(WatchKind::PendingHeadless, source))?;
                    self.on_pending(event)?;
                }
                event = resolution.next() => {
                    let event = event
                        .map_err(|source| HeadlessError::stream(WatchKind::Headless, source))?;
                    self.on_resolution(event)?;
                }
            }
        }
    }

    async fn open(&self, kind: WatchKind) -> HeadlessResult<Watch> {
        self.cluster
            .watch(kind, self.token.clone())
            .await
            .map_err(|source| HeadlessError::stream(kind, source))
    }

    fn on_pending(&self, event: WatchEvent) -> HeadlessResult<()> {
        if event.op != OpType::Put {
            return Ok(());
        }
        let request = match event.resource {
            Some(Resource::HeadlessAuthentication(request)) => request,
            other => {
                return Err(HeadlessError::UnexpectedResource {
                    kind: WatchKind::PendingHeadless,
                    resource_kind: other.map(|resource| resource.kind().to_string()),
                });
            }
        };

        let token = self.token.child_token();
        let Some(entry) = self.requests.register(&request.name, token.clone()) else {
            debug!(
                cluster = %self.uri,
                request = %request.name,
                "request already resolved; not notifying approver"
            );
            return Ok(());
        };
        let job = NotificationJob {
            notification: PendingNotification {
                request_id: request.name,
                client_ip: request.client_ip,
                cluster_uri: self.uri.clone(),
            },
            token,
            deadline: instant_after(self.login_timeout),
            requests: Arc::clone(&self.requests),
            entry,
        };
        debug!(
            cluster = %self.uri,
            request = %job.notification.request_id,
            "queueing approver notification"
        );
        if let Err(job) = self.pool.submit(job) {
            warn!(
                cluster = %self.uri,
                request = %job.notification.request_id,
                "notification pool stopped; dropping approver notification"
            );
            self.requests
                .complete(&job.notification.request_id, job.entry);
        }
        Ok(())
    }

    fn on_resolution(&self, event: WatchEvent) -> HeadlessResult<()> {
        match event.op {
            OpType::Init => Ok(()),
            OpType::Delete => {
                if let Some(resource) = event.resource.as_ref() {
                    self.cancel_request(resource.name(), "deleted");
                }
                Ok(())
            }
            OpType::Put => match event.resource {
                Some(Resource::HeadlessAuthentication(request)) => {
                    if request.state.is_resolved() {
                        self.cancel_request(&request.name, request.state.as_str());
                    }
                    Ok(())
                }
                other => Err(HeadlessError::UnexpectedResource {
                    kind: WatchKind::Headless,
                    resource_kind: other.map(|resource| resource.kind().to_string()),
                }),
            },
        }
    }

    fn cancel_request(&self, name: &str, reason: &str) {
        if self.requests.resolve(name) {
            debug!(cluster = %self.uri, request = %name, reason, "canceled approver notification");
        }
    }
}
