//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers deserialised from the configuration document.
//! - Every section defaults field-by-field so partial documents are valid.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ConfigError;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VouchConfig {
    /// Logging output settings.
    pub logging: LoggingSettings,
    /// Headless authentication watcher settings.
    pub headless: HeadlessSettings,
    /// Multi-factor prompt settings.
    pub mfa: MfaSettings,
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format; inferred from the build profile when absent.
    pub format: Option<LogFormatSetting>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

/// Log output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Structured JSON objects.
    Json,
    /// Human-readable output.
    Pretty,
}

impl FromStr for LogFormatSetting {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(ConfigError::invalid(
                "logging",
                "format",
                value.to_string(),
                "expected json or pretty",
            )),
        }
    }
}

/// Headless authentication watcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeadlessSettings {
    /// Ceiling for reconnect backoff, in seconds.
    pub max_watcher_backoff_secs: u64,
    /// Server-side lifetime of a headless login, in seconds.
    pub headless_login_timeout_secs: u64,
    /// Simultaneous approver notifications allowed process-wide.
    pub notify_concurrency: usize,
}

impl Default for HeadlessSettings {
    fn default() -> Self {
        Self {
            max_watcher_backoff_secs: defaults::MAX_WATCHER_BACKOFF_SECS,
            headless_login_timeout_secs: defaults::HEADLESS_LOGIN_TIMEOUT_SECS,
            notify_concurrency: defaults::NOTIFY_CONCURRENCY,
        }
    }
}

impl HeadlessSettings {
    /// Reconnect backoff ceiling.
    #[must_use]
    pub const fn max_watcher_backoff(&self) -> Duration {
        Duration::from_secs(self.max_watcher_backoff_secs)
    }

    /// Lifetime applied to each approver notification.
    #[must_use]
    pub const fn headless_login_timeout(&self) -> Duration {
        Duration::from_secs(self.headless_login_timeout_secs)
    }
}

/// Requested authenticator attachment for hardware-key assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticatorAttachment {
    /// Let the platform decide.
    #[default]
    Auto,
    /// Roaming keys only (USB/NFC/BLE).
    CrossPlatform,
    /// Built-in platform authenticators only.
    Platform,
}

impl AuthenticatorAttachment {
    /// Render as the lowercase document representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::CrossPlatform => "cross_platform",
            Self::Platform => "platform",
        }
    }
}

impl Display for AuthenticatorAttachment {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for AuthenticatorAttachment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(Self::Auto),
            "cross_platform" => Ok(Self::CrossPlatform),
            "platform" => Ok(Self::Platform),
            _ => Err(ConfigError::invalid(
                "mfa",
                "authenticator_attachment",
                value.to_string(),
                "expected auto, cross_platform or platform",
            )),
        }
    }
}

/// Multi-factor prompt settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MfaSettings {
    /// Address of the authenticating proxy.
    pub proxy_address: String,
    /// Favour one-time codes over hardware keys when both are offered.
    pub prefer_otp: bool,
    /// Requested authenticator attachment.
    pub authenticator_attachment: AuthenticatorAttachment,
    /// Allow prompting for codes while a hardware-key prompt is active.
    pub allow_input_capture: bool,
    /// Override platform hardware-key detection.
    pub webauthn_supported: Option<bool>,
    /// Suppress user-facing prompt text.
    pub quiet: bool,
}
