//! Fake approver used by watcher suites.

use std::error::Error as StdError;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vouch_headless::{ApproverNotifier, PendingNotification};

/// How [`RecordingNotifier`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproverBehaviour {
    /// Return success straight away.
    Acknowledge,
    /// Keep the prompt open until the notification is canceled.
    HoldUntilCanceled,
    /// Fail every call.
    Fail,
}

/// Approver double that records every notification it receives.
pub struct RecordingNotifier {
    behaviour: ApproverBehaviour,
    received: Mutex<Vec<PendingNotification>>,
    canceled: AtomicUsize,
    in_flight: AtomicUsize,
}

impl RecordingNotifier {
    /// Notifier with the given `behaviour`.
    #[must_use]
    pub fn new(behaviour: ApproverBehaviour) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            behaviour,
            received: Mutex::new(Vec::new()),
            canceled: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        })
    }

    /// Notifications received so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<PendingNotification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Request ids received so far.
    #[must_use]
    pub fn request_ids(&self) -> Vec<String> {
        self.received()
            .into_iter()
            .map(|notification| notification.request_id)
            .collect()
    }

    /// Prompts that were still open when their notification was canceled.
    #[must_use]
    pub fn cancellations(&self) -> usize {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Prompts currently open.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct OpenPrompt<'a> {
    notifier: &'a RecordingNotifier,
    cancel: CancellationToken,
}

impl Drop for OpenPrompt<'_> {
    fn drop(&mut self) {
        self.notifier.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.cancel.is_cancelled() {
            self.notifier.canceled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ApproverNotifier for RecordingNotifier {
    async fn notify(
        &self,
        notification: PendingNotification,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn StdError + Send + Sync>> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _open = OpenPrompt {
            notifier: self,
            cancel: cancel.clone(),
        };

        match self.behaviour {
            ApproverBehaviour::Acknowledge => Ok(()),
            ApproverBehaviour::Fail => Err(io::Error::other("approver unreachable").into()),
            ApproverBehaviour::HoldUntilCanceled => {
                cancel.cancelled().await;
                Ok(())
            }
        }
    }
}
