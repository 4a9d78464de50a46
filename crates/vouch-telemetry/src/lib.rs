#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the Vouch workspace.
//!
//! Logging installation and the Prometheus registry live here so the watcher,
//! the challenge coordinator and the client cache report through one surface.

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot, NotificationOutcome, RaceOutcome};
