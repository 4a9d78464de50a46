//! Approver notification contract and the bounded worker pool that drives it.
//!
//! # Design
//! - Watch loops enqueue jobs and never wait on the approver.
//! - A fixed number of workers share one queue, bounding how many approver
//!   prompts are in flight across every cluster.
//! - Each job races the notifier against its own cancellation and deadline,
//!   then removes its registry entry.

use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};
use vouch_telemetry::{Metrics, NotificationOutcome};

use crate::registry::RequestRegistry;

/// Pending request details forwarded to the approver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    /// Backend-assigned request name.
    pub request_id: String,
    /// Address the headless login originated from.
    pub client_ip: String,
    /// Cluster the request belongs to.
    pub cluster_uri: String,
}

/// Delivers pending-request notifications to the user who can approve them.
#[async_trait]
pub trait ApproverNotifier: Send + Sync {
    /// Notify the approver. The call may be abandoned at any await point once
    /// `cancel` fires or the login deadline passes.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails; the pool logs it.
    async fn notify(
        &self,
        notification: PendingNotification,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn StdError + Send + Sync>>;
}

pub(crate) struct NotificationJob {
    pub(crate) notification: PendingNotification,
    pub(crate) token: CancellationToken,
    pub(crate) deadline: Instant,
    pub(crate) requests: Arc<RequestRegistry>,
    pub(crate) entry: u64,
}

type JobQueue = Arc<Mutex<mpsc::UnboundedReceiver<NotificationJob>>>;

/// Handle for submitting notification jobs.
#[derive(Clone)]
pub(crate) struct NotificationPool {
    queue: mpsc::UnboundedSender<NotificationJob>,
}

impl NotificationPool {
    /// Spawn `workers` workers on `tracker`; they stop when `shutdown` fires.
    pub(crate) fn spawn(
        workers: usize,
        notifier: Arc<dyn ApproverNotifier>,
        metrics: Metrics,
        tracker: &TaskTracker,
        shutdown: CancellationToken,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let rx: JobQueue = Arc::new(Mutex::new(rx));
        for worker in 0..workers.max(1) {
            tracker.spawn(run_worker(
                worker,
                Arc::clone(&rx),
                Arc::clone(&notifier),
                metrics.clone(),
                shutdown.clone(),
            ));
        }
        Self { queue }
    }

    /// Queue `job`, returning it back when the pool has stopped.
    pub(crate) fn submit(&self, job: NotificationJob) -> Result<(), NotificationJob> {
        self.queue.send(job).map_err(|err| err.0)
    }
}

async fn run_worker(
    worker: usize,
    queue: JobQueue,
    notifier: Arc<dyn ApproverNotifier>,
    metrics: Metrics,
    shutdown: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                () = shutdown.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(job) = next else {
            debug!(worker, "notification worker stopped");
            return;
        };
        let outcome = deliver(notifier.as_ref(), &job).await;
        job.token.cancel();
        job.requests.complete(&job.notification.request_id, job.entry);
        metrics.inc_notification(outcome);
    }
}

async fn deliver(notifier: &dyn ApproverNotifier, job: &NotificationJob) -> NotificationOutcome {
    let request = job.notification.request_id.as_str();
    let cluster = job.notification.cluster_uri.as_str();
    if job.token.is_cancelled() || Instant::now() >= job.deadline {
        debug!(cluster, request, "dropping stale approver notification");
        return NotificationOutcome::Skipped;
    }

    tokio::select! {
        biased;
        () = job.token.cancelled() => {
            debug!(cluster, request, "approver notification canceled");
            NotificationOutcome::Canceled
        }
        () = sleep_until(job.deadline) => {
            debug!(cluster, request, "approver notification timed out");
            NotificationOutcome::TimedOut
        }
        result = notifier.notify(job.notification.clone(), job.token.clone()) => match result {
            Ok(()) => {
                debug!(cluster, request, "approver notified");
                NotificationOutcome::Delivered
            }
            Err(err) => {
                warn!(cluster, request, error = %err, "approver notification failed");
                NotificationOutcome::Failed
            }
        },
    }
}
