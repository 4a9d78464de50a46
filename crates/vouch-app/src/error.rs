//! # Design
//!
//! - Centralize application-level errors for bootstrap.
//! - Keep error messages constant while carrying the failing operation.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: vouch_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: vouch_telemetry::TelemetryError,
    },
    /// Headless watcher operations failed.
    #[error("headless watcher operation failed")]
    Headless {
        /// Operation identifier.
        operation: &'static str,
        /// Source watcher error.
        source: vouch_headless::HeadlessError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: vouch_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: vouch_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn headless(
        operation: &'static str,
        source: vouch_headless::HeadlessError,
    ) -> Self {
        Self::Headless { operation, source }
    }
}
