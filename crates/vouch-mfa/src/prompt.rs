//! Prompt capabilities and the policy-driven challenge prompt.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vouch_telemetry::{Metrics, RaceOutcome};

use crate::challenge::{MfaChallenge, MfaResponse, Modality, SubChallenge};
use crate::config::{DeviceDescriptor, PromptConfig};
use crate::error::{MfaError, MfaResult};
use crate::race::race_modalities;

/// Per-attempt context handed to a [`ModalityPrompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptContext {
    /// Origin hardware key assertions are bound to.
    pub origin: String,
    /// Why the user is being prompted.
    pub reason: Option<String>,
    /// Device description to emphasise.
    pub device_type: Option<DeviceDescriptor>,
    /// Suppress user-facing prompt text.
    pub quiet: bool,
    /// Another modality is being attempted at the same time.
    pub concurrent: bool,
}

/// One modality's way of answering its sub-challenge.
#[async_trait]
pub trait ModalityPrompt: Send + Sync {
    /// Modality this prompt answers.
    fn modality(&self) -> Modality;

    /// Attempt the sub-challenge until it succeeds, fails or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the modality's failure; [`MfaError::NonRegisteredDevice`] ends
    /// the surrounding race immediately.
    async fn attempt(
        &self,
        challenge: SubChallenge,
        context: AttemptContext,
        cancel: CancellationToken,
    ) -> MfaResult<MfaResponse>;
}

/// Answers a whole multi-factor challenge.
#[async_trait]
pub trait MfaPrompt: Send + Sync {
    /// Prompt the user to complete `challenge`.
    ///
    /// # Errors
    ///
    /// Returns policy errors, the winning failure of the race, or
    /// [`MfaError::Canceled`].
    async fn run(
        &self,
        challenge: &MfaChallenge,
        cancel: &CancellationToken,
    ) -> MfaResult<MfaResponse>;
}

/// [`MfaPrompt`] that applies [`PromptConfig::run_options`] and races the
/// registered modality prompts.
pub struct ChallengePrompt {
    config: PromptConfig,
    totp: Option<Arc<dyn ModalityPrompt>>,
    webauthn: Option<Arc<dyn ModalityPrompt>>,
    metrics: Option<Metrics>,
}

impl ChallengePrompt {
    /// Prompt with no modality registered yet.
    #[must_use]
    pub const fn new(config: PromptConfig) -> Self {
        Self {
            config,
            totp: None,
            webauthn: None,
            metrics: None,
        }
    }

    /// Register `prompt` for the modality it reports, replacing any previous one.
    #[must_use]
    pub fn with_modality(mut self, prompt: Arc<dyn ModalityPrompt>) -> Self {
        match prompt.modality() {
            Modality::Totp => self.totp = Some(prompt),
            Modality::Webauthn => self.webauthn = Some(prompt),
        }
        self
    }

    /// Record race outcomes on `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &PromptConfig {
        &self.config
    }

    fn prompt_for(&self, modality: Modality) -> Option<&Arc<dyn ModalityPrompt>> {
        match modality {
            Modality::Totp => self.totp.as_ref(),
            Modality::Webauthn => self.webauthn.as_ref(),
        }
    }

    fn plan(
        &self,
        challenge: &MfaChallenge,
    ) -> MfaResult<Vec<(Arc<dyn ModalityPrompt>, SubChallenge)>> {
        let opts = self.config.run_options(challenge)?;
        let enabled = [
            (Modality::Totp, opts.totp),
            (Modality::Webauthn, opts.webauthn),
        ];

        let mut plan = Vec::with_capacity(2);
        for (modality, on) in enabled {
            if !on {
                continue;
            }
            let Some(sub) = challenge.sub_challenge(modality) else {
                continue;
            };
            let prompt = self
                .prompt_for(modality)
                .ok_or(MfaError::NoPrompt { modality })?;
            plan.push((Arc::clone(prompt), sub));
        }
        Ok(plan)
    }

    fn record(&self, result: &MfaResult<MfaResponse>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let outcome = match result {
            Ok(_) => RaceOutcome::Success,
            Err(MfaError::NonRegisteredDevice { .. }) => RaceOutcome::NonRegisteredDevice,
            Err(MfaError::Canceled) => RaceOutcome::Canceled,
            Err(_) => RaceOutcome::Failed,
        };
        metrics.inc_race(outcome);
    }
}

#[async_trait]
impl MfaPrompt for ChallengePrompt {
    async fn run(
        &self,
        challenge: &MfaChallenge,
        cancel: &CancellationToken,
    ) -> MfaResult<MfaResponse> {
        let plan = self.plan(challenge)?;
        if !self.config.quiet
            && let Some(reason) = &self.config.prompt_reason
        {
            info!(reason = %reason, "multi-factor authentication required");
        }

        let context = AttemptContext {
            origin: self.config.webauthn_origin(),
            reason: self.config.prompt_reason.clone(),
            device_type: self.config.device_type,
            quiet: self.config.quiet,
            concurrent: plan.len() > 1,
        };
        debug!(modalities = plan.len(), "starting mfa race");

        let result = race_modalities(cancel, move |token, tasks, tx| {
            for (prompt, sub) in plan {
                let context = context.clone();
                let token = token.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    let outcome = prompt.attempt(sub, context, token).await;
                    let _ = tx.send(outcome).await;
                });
            }
        })
        .await;

        self.record(&result);
        result
    }
}
