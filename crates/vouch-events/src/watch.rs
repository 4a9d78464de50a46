//! Consumer handle for a single resource watch stream.
//!
//! # Design
//! - A `Watch` pairs an ordered event channel with a one-shot liveness signal.
//! - Events already queued are always delivered before a liveness failure.
//! - Dropping the `Watch` cancels its close token, which tells the producer
//!   to stop pumping.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::{WatchError, WatchResult};
use crate::payloads::{WatchEvent, WatchKind};

/// Source of resource watch streams.
#[async_trait]
pub trait ResourceWatcher: Send + Sync {
    /// Open a stream of `kind` events that ends when `cancel` fires or the
    /// returned handle is dropped.
    async fn watch(&self, kind: WatchKind, cancel: CancellationToken) -> WatchResult<Watch>;
}

/// Read side of a watch stream.
pub struct Watch {
    kind: WatchKind,
    events: mpsc::Receiver<WatchEvent>,
    liveness: Option<oneshot::Receiver<WatchError>>,
    _close: DropGuard,
}

/// Write side of a watch stream, held by the producing backend.
pub struct WatchSender {
    kind: WatchKind,
    events: mpsc::Sender<WatchEvent>,
    liveness: Option<oneshot::Sender<WatchError>>,
    close: CancellationToken,
}

enum Step {
    Event(Option<WatchEvent>),
    Failed(Option<WatchError>),
}

impl Watch {
    /// Create a connected sender/receiver pair buffering up to `buffer` events.
    ///
    /// The close token is a child of `cancel`, so the owner's cancellation and
    /// dropping the `Watch` both stop the producer.
    #[must_use]
    pub fn channel(
        kind: WatchKind,
        buffer: usize,
        cancel: &CancellationToken,
    ) -> (WatchSender, Self) {
        let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
        let (liveness_tx, liveness_rx) = oneshot::channel();
        let close = cancel.child_token();
        let sender = WatchSender {
            kind,
            events: event_tx,
            liveness: Some(liveness_tx),
            close: close.clone(),
        };
        let watch = Self {
            kind,
            events: event_rx,
            liveness: Some(liveness_rx),
            _close: close.drop_guard(),
        };
        (sender, watch)
    }

    /// Kind this stream serves.
    #[must_use]
    pub const fn kind(&self) -> WatchKind {
        self.kind
    }

    /// Receive the next event, or the error that ended the stream.
    ///
    /// After an error has been returned every further call yields
    /// [`WatchError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns the producer's liveness failure, or `Closed` when the stream
    /// ended without one.
    pub async fn next(&mut self) -> WatchResult<WatchEvent> {
        let Some(liveness) = self.liveness.as_mut() else {
            return Err(WatchError::Closed);
        };

        let step = tokio::select! {
            biased;
            event = self.events.recv() => Step::Event(event),
            failure = liveness => Step::Failed(failure.ok()),
        };

        match step {
            Step::Event(Some(event)) => Ok(event),
            Step::Event(None) => {
                let failure = self
                    .liveness
                    .take()
                    .and_then(|mut liveness| liveness.try_recv().ok());
                Err(failure.unwrap_or(WatchError::Closed))
            }
            Step::Failed(failure) => {
                self.liveness = None;
                Err(failure.unwrap_or(WatchError::Closed))
            }
        }
    }
}

impl WatchSender {
    /// Kind this stream serves.
    #[must_use]
    pub const fn kind(&self) -> WatchKind {
        self.kind
    }

    /// Deliver `event`, returning `false` once the consumer has gone away.
    pub async fn send(&self, event: WatchEvent) -> bool {
        if self.close.is_cancelled() {
            return false;
        }
        tokio::select! {
            sent = self.events.send(event) => sent.is_ok(),
            () = self.close.cancelled() => false,
        }
    }

    /// End the stream with `error`; queued events are still delivered first.
    pub fn fail(mut self, error: WatchError) {
        if let Some(liveness) = self.liveness.take() {
            let _ = liveness.send(error);
        }
    }

    /// Resolves once the consumer dropped the watch or its owner canceled it.
    pub async fn closed(&self) {
        self.close.cancelled().await;
    }

    /// Whether the consumer side is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }
}
