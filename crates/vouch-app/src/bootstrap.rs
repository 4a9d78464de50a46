use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vouch_config::VouchConfig;
use vouch_events::ClusterStore;
use vouch_headless::{ApproverNotifier, HeadlessWatcher, WatcherOptions};
use vouch_mfa::{ChallengePrompt, PromptConfig};
use vouch_telemetry::{LoggingConfig, Metrics, TelemetryError};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the Vouch services.
pub struct BootstrapDependencies {
    /// Validated configuration document.
    pub config: VouchConfig,
    /// Directory of known clusters.
    pub clusters: Arc<dyn ClusterStore>,
    /// Sink for approver notifications.
    pub notifier: Arc<dyn ApproverNotifier>,
}

impl BootstrapDependencies {
    /// Load configuration from `path` (if any) and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when loading or validation fails.
    pub fn load(
        path: Option<&Path>,
        clusters: Arc<dyn ClusterStore>,
        notifier: Arc<dyn ApproverNotifier>,
    ) -> AppResult<Self> {
        let config = vouch_config::load(path).map_err(|err| AppError::config("config.load", err))?;
        Ok(Self {
            config,
            clusters,
            notifier,
        })
    }
}

/// The constructed service graph.
pub struct VouchServices {
    watcher: HeadlessWatcher,
    metrics: Metrics,
    prompt_config: PromptConfig,
}

impl VouchServices {
    /// Build metrics, the headless watcher and the prompt configuration.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Telemetry`] when the metrics registry cannot be
    /// built.
    pub fn build(dependencies: BootstrapDependencies) -> AppResult<Self> {
        let BootstrapDependencies {
            config,
            clusters,
            notifier,
        } = dependencies;
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let watcher = HeadlessWatcher::new(
            clusters,
            notifier,
            WatcherOptions::from(&config.headless),
            metrics.clone(),
        );
        Ok(Self {
            watcher,
            metrics,
            prompt_config: PromptConfig::from_settings(&config.mfa),
        })
    }

    /// The headless watcher.
    #[must_use]
    pub const fn watcher(&self) -> &HeadlessWatcher {
        &self.watcher
    }

    /// Shared metrics registry.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// A challenge prompt carrying the configured MFA policy. Modality prompts
    /// are registered by the caller.
    #[must_use]
    pub fn challenge_prompt(&self) -> ChallengePrompt {
        ChallengePrompt::new(self.prompt_config.clone()).with_metrics(self.metrics.clone())
    }

    /// Stop every watch and wait for background work to drain.
    pub async fn shutdown(&self) {
        self.watcher.shutdown().await;
    }
}

/// Boot sequence driven entirely by injected dependencies.
///
/// Installs logging, starts a watch for every connected cluster and runs
/// until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error when service construction fails or the initial watches
/// cannot be started.
pub async fn run_with(
    dependencies: BootstrapDependencies,
    shutdown: CancellationToken,
) -> AppResult<()> {
    install_logging(&dependencies.config)?;
    info!(build = vouch_telemetry::build_sha(), "vouch bootstrap starting");

    let services = VouchServices::build(dependencies)?;
    if let Err(err) = services.watcher.start_all() {
        warn!(error = %err, "failed to start headless watches");
        services.shutdown().await;
        return Err(AppError::headless("headless.start_all", err));
    }
    info!(
        clusters = ?services.watcher.active_watches(),
        "headless watches started"
    );

    shutdown.cancelled().await;
    info!("shutdown requested");
    services.shutdown().await;
    info!("vouch services stopped");
    Ok(())
}

fn install_logging(config: &VouchConfig) -> AppResult<()> {
    let build_sha = option_env!("VOUCH_BUILD_SHA").unwrap_or("dev");
    let logging = LoggingConfig::from_settings(&config.logging, build_sha);
    match vouch_telemetry::init_logging(&logging) {
        Ok(()) => Ok(()),
        Err(TelemetryError::SubscriberInstall { .. }) => {
            debug!("tracing subscriber already installed");
            Ok(())
        }
        Err(err) => Err(AppError::telemetry("telemetry.init", err)),
    }
}
