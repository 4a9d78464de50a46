//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Labelled counters take closed enums so label values never drift.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// How an approver notification ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The notifier returned successfully.
    Delivered,
    /// The notifier returned an error.
    Failed,
    /// The request resolved or the watch stopped first.
    Canceled,
    /// The login timeout elapsed first.
    TimedOut,
    /// The job was already canceled or expired when dequeued.
    Skipped,
}

impl NotificationOutcome {
    /// Label value recorded on `headless_notifications_total`.
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::TimedOut => "timed_out",
            Self::Skipped => "skipped",
        }
    }
}

/// How a multi-factor challenge race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceOutcome {
    /// One modality succeeded.
    Success,
    /// A modality reported an unregistered credential.
    NonRegisteredDevice,
    /// Every enabled modality failed.
    Failed,
    /// The caller canceled the race.
    Canceled,
}

impl RaceOutcome {
    /// Label value recorded on `mfa_races_total`.
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonRegisteredDevice => "non_registered_device",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    headless_notifications_total: IntCounterVec,
    headless_watch_restarts_total: IntCounter,
    headless_active_watches: IntGauge,
    mfa_races_total: IntCounterVec,
    client_cache_builds_total: IntCounter,
    client_cache_retirements_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Watches currently running.
    pub headless_active_watches: i64,
    /// Watch iterations restarted after a failure.
    pub headless_watch_restarts_total: u64,
    /// Notifications that reached the approver.
    pub headless_notifications_delivered: u64,
    /// Notifications canceled before completion.
    pub headless_notifications_canceled: u64,
    /// Races won by a modality.
    pub mfa_races_succeeded: u64,
    /// Client handles built by the cache.
    pub client_cache_builds_total: u64,
    /// Client handles retired by the cache.
    pub client_cache_retirements_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let headless_notifications_total = IntCounterVec::new(
            Opts::new(
                "headless_notifications_total",
                "Approver notifications by outcome",
            ),
            &["outcome"],
        )
        .map_err(collector("headless_notifications_total"))?;
        let headless_watch_restarts_total = IntCounter::with_opts(Opts::new(
            "headless_watch_restarts_total",
            "Headless watch iterations restarted after a failure",
        ))
        .map_err(collector("headless_watch_restarts_total"))?;
        let headless_active_watches = IntGauge::with_opts(Opts::new(
            "headless_active_watches",
            "Headless watches currently running",
        ))
        .map_err(collector("headless_active_watches"))?;
        let mfa_races_total = IntCounterVec::new(
            Opts::new("mfa_races_total", "Multi-factor challenge races by outcome"),
            &["outcome"],
        )
        .map_err(collector("mfa_races_total"))?;
        let client_cache_builds_total = IntCounter::with_opts(Opts::new(
            "client_cache_builds_total",
            "Client handles built by the certificate-aware cache",
        ))
        .map_err(collector("client_cache_builds_total"))?;
        let client_cache_retirements_total = IntCounter::with_opts(Opts::new(
            "client_cache_retirements_total",
            "Superseded client handles closed by the cache",
        ))
        .map_err(collector("client_cache_retirements_total"))?;

        register(
            &registry,
            "headless_notifications_total",
            headless_notifications_total.clone(),
        )?;
        register(
            &registry,
            "headless_watch_restarts_total",
            headless_watch_restarts_total.clone(),
        )?;
        register(
            &registry,
            "headless_active_watches",
            headless_active_watches.clone(),
        )?;
        register(&registry, "mfa_races_total", mfa_races_total.clone())?;
        register(
            &registry,
            "client_cache_builds_total",
            client_cache_builds_total.clone(),
        )?;
        register(
            &registry,
            "client_cache_retirements_total",
            client_cache_retirements_total.clone(),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                headless_notifications_total,
                headless_watch_restarts_total,
                headless_active_watches,
                mfa_races_total,
                client_cache_builds_total,
                client_cache_retirements_total,
            }),
        })
    }

    /// Count one finished approver notification.
    pub fn inc_notification(&self, outcome: NotificationOutcome) {
        self.inner
            .headless_notifications_total
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    /// Count one watch iteration restarted after a failure.
    pub fn inc_watch_restart(&self) {
        self.inner.headless_watch_restarts_total.inc();
    }

    /// Set the active watch gauge.
    pub fn set_active_watches(&self, count: usize) {
        self.inner
            .headless_active_watches
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Count one finished challenge race.
    pub fn inc_race(&self, outcome: RaceOutcome) {
        self.inner
            .mfa_races_total
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    /// Count one client handle build.
    pub fn inc_cache_build(&self) {
        self.inner.client_cache_builds_total.inc();
    }

    /// Count one retired client handle.
    pub fn inc_cache_retirement(&self) {
        self.inner.client_cache_retirements_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let notifications = &self.inner.headless_notifications_total;
        MetricsSnapshot {
            headless_active_watches: self.inner.headless_active_watches.get(),
            headless_watch_restarts_total: self.inner.headless_watch_restarts_total.get(),
            headless_notifications_delivered: notifications
                .with_label_values(&[NotificationOutcome::Delivered.as_label()])
                .get(),
            headless_notifications_canceled: notifications
                .with_label_values(&[NotificationOutcome::Canceled.as_label()])
                .get(),
            mfa_races_succeeded: self
                .inner
                .mfa_races_total
                .with_label_values(&[RaceOutcome::Success.as_label()])
                .get(),
            client_cache_builds_total: self.inner.client_cache_builds_total.get(),
            client_cache_retirements_total: self.inner.client_cache_retirements_total.get(),
        }
    }
}

fn collector(name: &'static str) -> impl FnOnce(prometheus::Error) -> TelemetryError {
    move |source| TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_notification(NotificationOutcome::Delivered);
        metrics.inc_notification(NotificationOutcome::Canceled);
        metrics.inc_notification(NotificationOutcome::Canceled);
        metrics.inc_watch_restart();
        metrics.set_active_watches(3);
        metrics.inc_race(RaceOutcome::Success);
        metrics.inc_race(RaceOutcome::Failed);
        metrics.inc_cache_build();
        metrics.inc_cache_build();
        metrics.inc_cache_retirement();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.headless_active_watches, 3);
        assert_eq!(snapshot.headless_watch_restarts_total, 1);
        assert_eq!(snapshot.headless_notifications_delivered, 1);
        assert_eq!(snapshot.headless_notifications_canceled, 2);
        assert_eq!(snapshot.mfa_races_succeeded, 1);
        assert_eq!(snapshot.client_cache_builds_total, 2);
        assert_eq!(snapshot.client_cache_retirements_total, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("headless_notifications_total"));
        assert!(rendered.contains("outcome=\"canceled\""));
        assert!(rendered.contains("mfa_races_total"));
        assert!(rendered.contains("client_cache_retirements_total"));
        Ok(())
    }

    #[test]
    fn clones_share_one_registry() -> Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.inc_cache_build();
        assert_eq!(metrics.snapshot().client_cache_builds_total, 1);
        Ok(())
    }

    #[test]
    fn snapshot_serialises() -> Result<()> {
        let metrics = Metrics::new()?;
        let value = serde_json::to_value(metrics.snapshot()).expect("serialise");
        assert_eq!(value["headless_active_watches"], 0);
        Ok(())
    }
}
