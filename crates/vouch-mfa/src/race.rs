//! Concurrent modality race.
//!
//! Each enabled modality runs as its own task and reports one outcome on a
//! shared queue. The first success wins; an unregistered-key failure ends the
//! race at once; otherwise failures are collected until every task is done.
//! Losing tasks are canceled and awaited before the race returns.

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::challenge::MfaResponse;
use crate::error::{MfaError, MfaResult};

/// Outcome a modality task reports.
pub type ModalityOutcome = MfaResult<MfaResponse>;

const OUTCOME_BUFFER: usize = 2;

/// Run modality attempts spawned by `start` and settle on one outcome.
///
/// `start` receives a token derived from `cancel`, the task set to spawn
/// into, and a sender for the shared outcome queue.
///
/// # Errors
///
/// - [`MfaError::NonRegisteredDevice`] as soon as any task reports it.
/// - [`MfaError::Canceled`] when `cancel` fires before an outcome is chosen.
/// - The single failure when only one attempt failed, otherwise
///   [`MfaError::Aggregate`] holding every failure in completion order.
pub async fn race_modalities<F>(cancel: &CancellationToken, start: F) -> MfaResult<MfaResponse>
where
    F: FnOnce(CancellationToken, &mut JoinSet<()>, mpsc::Sender<ModalityOutcome>),
{
    let attempts = cancel.child_token();
    let (tx, mut rx) = mpsc::channel(OUTCOME_BUFFER);
    let mut tasks = JoinSet::new();

    start(attempts.clone(), &mut tasks, tx);

    let mut failures = Vec::new();
    let result = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break Err(MfaError::Canceled),
            outcome = rx.recv() => match outcome {
                Some(Ok(response)) => {
                    debug!(modality = %response.modality(), "mfa modality succeeded");
                    break Ok(response);
                }
                Some(Err(err)) if err.is_non_registered_device() => break Err(err),
                Some(Err(err)) => {
                    debug!(error = %err, "mfa modality failed; waiting on remaining attempts");
                    failures.push(err);
                }
                None => break Err(MfaError::aggregate(std::mem::take(&mut failures))),
            },
        }
    };

    attempts.cancel();
    rx.close();
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            warn!(error = %err, "mfa modality task did not complete cleanly");
        }
    }
    result
}
