#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Vouch application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (service wiring and the shutdown-driven run loop),
//! `error.rs` (application error type).

/// Service construction and the run loop.
pub mod bootstrap;
/// Application-level errors.
pub mod error;

pub use bootstrap::{BootstrapDependencies, VouchServices, run_with};
pub use error::{AppError, AppResult};
