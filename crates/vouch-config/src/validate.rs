//! Validation guard rails for configuration documents.

use crate::defaults::{
    HEADLESS_LOGIN_TIMEOUT_LIMIT_SECS, MAX_NOTIFY_CONCURRENCY, MAX_WATCHER_BACKOFF_LIMIT_SECS,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::VouchConfig;

/// Validate a loaded document.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first field that violates a
/// guard rail.
pub fn validate(config: &VouchConfig) -> ConfigResult<()> {
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::invalid(
            "logging",
            "level",
            config.logging.level.clone(),
            "must not be empty",
        ));
    }

    let headless = &config.headless;
    if !(1..=MAX_WATCHER_BACKOFF_LIMIT_SECS).contains(&headless.max_watcher_backoff_secs) {
        return Err(ConfigError::invalid(
            "headless",
            "max_watcher_backoff_secs",
            headless.max_watcher_backoff_secs.to_string(),
            "must be between 1 and 3600",
        ));
    }
    if !(1..=HEADLESS_LOGIN_TIMEOUT_LIMIT_SECS).contains(&headless.headless_login_timeout_secs) {
        return Err(ConfigError::invalid(
            "headless",
            "headless_login_timeout_secs",
            headless.headless_login_timeout_secs.to_string(),
            "must be between 1 and 86400",
        ));
    }
    if !(1..=MAX_NOTIFY_CONCURRENCY).contains(&headless.notify_concurrency) {
        return Err(ConfigError::invalid(
            "headless",
            "notify_concurrency",
            headless.notify_concurrency.to_string(),
            "must be between 1 and 64",
        ));
    }

    let proxy = &config.mfa.proxy_address;
    if proxy.chars().any(char::is_whitespace) {
        return Err(ConfigError::invalid(
            "mfa",
            "proxy_address",
            proxy.clone(),
            "must not contain whitespace",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: &ConfigError) -> &'static str {
        match err {
            ConfigError::InvalidField { field, .. } => *field,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&VouchConfig::default()).is_ok());
    }

    #[test]
    fn zero_backoff_rejected() {
        let mut config = VouchConfig::default();
        config.headless.max_watcher_backoff_secs = 0;
        let err = validate(&config).expect_err("zero backoff");
        assert_eq!(field_of(&err), "max_watcher_backoff_secs");
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = VouchConfig::default();
        config.headless.headless_login_timeout_secs = 0;
        let err = validate(&config).expect_err("zero timeout");
        assert_eq!(field_of(&err), "headless_login_timeout_secs");
    }

    #[test]
    fn oversized_durations_rejected() {
        let mut config = VouchConfig::default();
        config.headless.headless_login_timeout_secs = u64::MAX;
        assert_eq!(
            field_of(&validate(&config).expect_err("huge timeout")),
            "headless_login_timeout_secs"
        );
        config.headless.headless_login_timeout_secs = HEADLESS_LOGIN_TIMEOUT_LIMIT_SECS;
        assert!(validate(&config).is_ok());

        config.headless.max_watcher_backoff_secs = MAX_WATCHER_BACKOFF_LIMIT_SECS + 1;
        assert_eq!(
            field_of(&validate(&config).expect_err("huge backoff")),
            "max_watcher_backoff_secs"
        );
    }

    #[test]
    fn concurrency_bounds_enforced() {
        let mut config = VouchConfig::default();
        config.headless.notify_concurrency = 0;
        assert_eq!(
            field_of(&validate(&config).expect_err("zero")),
            "notify_concurrency"
        );
        config.headless.notify_concurrency = 65;
        assert_eq!(
            field_of(&validate(&config).expect_err("too many")),
            "notify_concurrency"
        );
        config.headless.notify_concurrency = 4;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn proxy_with_whitespace_rejected() {
        let mut config = VouchConfig::default();
        config.mfa.proxy_address = "proxy example.com".into();
        assert_eq!(
            field_of(&validate(&config).expect_err("whitespace")),
            "proxy_address"
        );
    }
}
