#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Multi-factor challenge handling.
//!
//! A challenge may offer several modalities at once (one-time codes, hardware
//! keys). [`PromptConfig::run_options`] decides which of them to attempt,
//! [`race_modalities`] runs the attempts concurrently and settles on the first
//! success, and [`ChallengePrompt`] ties both together behind [`MfaPrompt`].

pub mod challenge;
pub mod config;
pub mod error;
pub mod prompt;
pub mod race;

pub use challenge::{
    MfaChallenge, MfaResponse, Modality, SubChallenge, TotpChallenge, WebauthnChallenge,
};
pub use config::{DeviceDescriptor, PromptConfig, RunOpts, platform_webauthn_support};
pub use error::{BoxError, MfaError, MfaResult};
pub use prompt::{AttemptContext, ChallengePrompt, MfaPrompt, ModalityPrompt};
pub use race::{ModalityOutcome, race_modalities};
