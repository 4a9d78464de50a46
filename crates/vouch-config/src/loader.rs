//! Configuration loading from a JSON document and `VOUCH_*` overrides.
//!
//! # Design
//! - The document is optional; absent files and empty sections fall back to
//!   defaults.
//! - Environment overrides are read through an injectable lookup so tests
//!   never mutate the process environment.
//! - Validation always runs last, on the merged result.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{AuthenticatorAttachment, LogFormatSetting, VouchConfig};
use crate::validate::validate;

/// Load configuration from `path` (if any) and the process environment.
///
/// # Errors
///
/// Returns an error when the document cannot be read or parsed, when an
/// override is malformed, or when the merged result fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<VouchConfig> {
    load_with(path, |key| std::env::var(key).ok())
}

/// Load configuration using `lookup` in place of the process environment.
///
/// # Errors
///
/// See [`load`].
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> ConfigResult<VouchConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_document(path)?,
        None => VouchConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    validate(&config)?;
    Ok(config)
}

/// Parse a JSON document, filling omitted fields with defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when the document is malformed.
pub fn from_json_str(document: &str) -> ConfigResult<VouchConfig> {
    serde_json::from_str(document).map_err(|source| ConfigError::Parse { path: None, source })
}

/// Apply `VOUCH_*` overrides found through `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when an override cannot be parsed.
pub fn apply_env_overrides<F>(config: &mut VouchConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup(defaults::ENV_LOG_LEVEL) {
        config.logging.level = level;
    }
    if let Some(format) = lookup(defaults::ENV_LOG_FORMAT) {
        config.logging.format = Some(format.parse::<LogFormatSetting>()?);
    }
    if let Some(proxy) = lookup(defaults::ENV_PROXY_ADDR) {
        config.mfa.proxy_address = proxy.trim().to_string();
    }
    if let Some(value) = lookup(defaults::ENV_MAX_WATCHER_BACKOFF_SECS) {
        config.headless.max_watcher_backoff_secs =
            parse_number("headless", "max_watcher_backoff_secs", &value)?;
    }
    if let Some(value) = lookup(defaults::ENV_HEADLESS_LOGIN_TIMEOUT_SECS) {
        config.headless.headless_login_timeout_secs =
            parse_number("headless", "headless_login_timeout_secs", &value)?;
    }
    if let Some(value) = lookup(defaults::ENV_NOTIFY_CONCURRENCY) {
        config.headless.notify_concurrency =
            parse_number("headless", "notify_concurrency", &value)?;
    }
    if let Some(value) = lookup(defaults::ENV_PREFER_OTP) {
        config.mfa.prefer_otp = parse_flag("mfa", "prefer_otp", &value)?;
    }
    if let Some(value) = lookup(defaults::ENV_ALLOW_INPUT_CAPTURE) {
        config.mfa.allow_input_capture = parse_flag("mfa", "allow_input_capture", &value)?;
    }
    if let Some(value) = lookup(defaults::ENV_WEBAUTHN_SUPPORTED) {
        config.mfa.webauthn_supported = Some(parse_flag("mfa", "webauthn_supported", &value)?);
    }
    if let Some(value) = lookup(defaults::ENV_AUTHENTICATOR_ATTACHMENT) {
        config.mfa.authenticator_attachment = value.parse::<AuthenticatorAttachment>()?;
    }
    Ok(())
}

fn read_document(path: &Path) -> ConfigResult<VouchConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration document");
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: Some(path.to_path_buf()),
        source,
    })
}

fn parse_number<T: std::str::FromStr>(
    section: &'static str,
    field: &'static str,
    value: &str,
) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::invalid(section, field, value.to_string(), "must be an integer"))
}

fn parse_flag(section: &'static str, field: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(
            section,
            field,
            value.to_string(),
            "must be a boolean",
        )),
    }
}
