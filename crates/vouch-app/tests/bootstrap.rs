use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use vouch_app::{AppError, BootstrapDependencies, VouchServices, run_with};
use vouch_config::VouchConfig;
use vouch_events::WatchKind;
use vouch_mfa::{MfaChallenge, MfaError, MfaPrompt};
use vouch_test_support::cluster::{MemoryCluster, MemoryClusterStore};
use vouch_test_support::fixtures::settle;
use vouch_test_support::mocks::{ApproverBehaviour, RecordingNotifier};

fn fast_config() -> VouchConfig {
    let mut config = VouchConfig::default();
    config.headless.max_watcher_backoff_secs = 1;
    config
}

#[tokio::test]
async fn run_watches_connected_clusters_until_shutdown() -> Result<()> {
    let root = MemoryCluster::new("cluster://root.example.com");
    let leaf = MemoryCluster::new("cluster://leaf.example.com");
    leaf.set_connected(false);
    let store = MemoryClusterStore::with_clusters(&[root.clone(), leaf.clone()]);
    let notifier = RecordingNotifier::new(ApproverBehaviour::HoldUntilCanceled);

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(run_with(
        BootstrapDependencies {
            config: fast_config(),
            clusters: store,
            notifier: notifier.clone(),
        },
        shutdown.clone(),
    ));

    assert!(settle(|| root.live_streams() == 2).await);
    assert_eq!(leaf.opened(WatchKind::PendingHeadless), 0);

    root.begin_headless_login("alice", "203.0.113.20");
    assert!(settle(|| notifier.in_flight() == 1).await);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), task).await???;
    assert_eq!(notifier.in_flight(), 0);
    assert_eq!(notifier.cancellations(), 1);
    assert!(settle(|| root.live_streams() == 0).await);
    Ok(())
}

#[tokio::test]
async fn services_expose_configured_prompt_policy() -> Result<()> {
    let store = MemoryClusterStore::with_clusters(&[]);
    let services = VouchServices::build(BootstrapDependencies {
        config: fast_config(),
        clusters: store,
        notifier: RecordingNotifier::new(ApproverBehaviour::Acknowledge),
    })?;

    let prompt = services.challenge_prompt();
    let result = prompt
        .run(&MfaChallenge::default(), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(MfaError::EmptyChallenge)));
    assert!(services.watcher().active_watches().is_empty());

    services.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn load_reads_the_configuration_document() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{"headless": {{"notify_concurrency": 3}}, "mfa": {{"prefer_otp": true}}}}"#
    )?;

    let store = MemoryClusterStore::with_clusters(&[]);
    let notifier = RecordingNotifier::new(ApproverBehaviour::Acknowledge);
    let dependencies = BootstrapDependencies::load(Some(file.path()), store, notifier)?;
    assert_eq!(dependencies.config.headless.notify_concurrency, 3);
    assert!(dependencies.config.mfa.prefer_otp);
    Ok(())
}

#[tokio::test]
async fn load_rejects_invalid_documents() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, r#"{{"headless": {{"max_watcher_backoff_secs": 0}}}}"#)?;

    let result = BootstrapDependencies::load(
        Some(file.path()),
        MemoryClusterStore::with_clusters(&[]),
        RecordingNotifier::new(ApproverBehaviour::Acknowledge),
    );
    assert!(matches!(
        result,
        Err(AppError::Config {
            operation: "config.load",
            ..
        })
    ));
    Ok(())
}
