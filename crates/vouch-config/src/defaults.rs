//! Default values and environment keys for configuration documents.
//!
//! # Design
//! - Keep every default in one place so the model, loader and docs agree.
//! - Durations are stored as whole seconds in documents and the environment.

/// Default log level when neither the document nor `RUST_LOG` sets one.
pub const LOG_LEVEL: &str = "info";
/// Ceiling for the headless watcher's reconnect backoff, in seconds.
pub const MAX_WATCHER_BACKOFF_SECS: u64 = 90;
/// Server-side lifetime of a headless login request, in seconds.
pub const HEADLESS_LOGIN_TIMEOUT_SECS: u64 = 180;
/// Simultaneous approver notifications allowed process-wide.
pub const NOTIFY_CONCURRENCY: usize = 1;
/// Upper bound accepted for `max_watcher_backoff_secs` (one hour).
pub const MAX_WATCHER_BACKOFF_LIMIT_SECS: u64 = 3_600;
/// Upper bound accepted for `headless_login_timeout_secs` (one day).
pub const HEADLESS_LOGIN_TIMEOUT_LIMIT_SECS: u64 = 86_400;
/// Upper bound accepted for `notify_concurrency`.
pub const MAX_NOTIFY_CONCURRENCY: usize = 64;

/// Environment key overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "VOUCH_LOG_LEVEL";
/// Environment key overriding `logging.format`.
pub const ENV_LOG_FORMAT: &str = "VOUCH_LOG_FORMAT";
/// Environment key overriding `mfa.proxy_address`.
pub const ENV_PROXY_ADDR: &str = "VOUCH_PROXY_ADDR";
/// Environment key overriding `headless.max_watcher_backoff_secs`.
pub const ENV_MAX_WATCHER_BACKOFF_SECS: &str = "VOUCH_MAX_WATCHER_BACKOFF_SECS";
/// Environment key overriding `headless.headless_login_timeout_secs`.
pub const ENV_HEADLESS_LOGIN_TIMEOUT_SECS: &str = "VOUCH_HEADLESS_LOGIN_TIMEOUT_SECS";
/// Environment key overriding `headless.notify_concurrency`.
pub const ENV_NOTIFY_CONCURRENCY: &str = "VOUCH_NOTIFY_CONCURRENCY";
/// Environment key overriding `mfa.prefer_otp`.
pub const ENV_PREFER_OTP: &str = "VOUCH_PREFER_OTP";
/// Environment key overriding `mfa.allow_input_capture`.
pub const ENV_ALLOW_INPUT_CAPTURE: &str = "VOUCH_ALLOW_INPUT_CAPTURE";
/// Environment key overriding `mfa.webauthn_supported`.
pub const ENV_WEBAUTHN_SUPPORTED: &str = "VOUCH_WEBAUTHN_SUPPORTED";
/// Environment key overriding `mfa.authenticator_attachment`.
pub const ENV_AUTHENTICATOR_ATTACHMENT: &str = "VOUCH_AUTHENTICATOR_ATTACHMENT";
