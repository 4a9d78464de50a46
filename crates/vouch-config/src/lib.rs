#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! File- and environment-backed configuration for the Vouch daemon.
//!
//! Layout: `model.rs` (typed settings), `defaults.rs` (default values and
//! environment keys), `validate.rs` (guard rails), `loader.rs` (JSON document
//! plus `VOUCH_*` overrides), `error.rs` (`ConfigError`).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, from_json_str, load, load_with};
pub use model::{
    AuthenticatorAttachment, HeadlessSettings, LogFormatSetting, LoggingSettings, MfaSettings,
    VouchConfig,
};
pub use validate::validate;
