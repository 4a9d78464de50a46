//! Error types for multi-factor prompts.

use std::error::Error as StdError;

use thiserror::Error;

use crate::challenge::Modality;

/// Boxed error returned by modality prompts.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors surfaced while answering a challenge.
#[derive(Debug, Error)]
pub enum MfaError {
    /// The challenge offered no modality.
    #[error("mfa challenge is empty")]
    EmptyChallenge,
    /// Only hardware keys were offered and the platform cannot use them.
    #[error("hardware device MFA not supported by your platform, please register an OTP device")]
    WebauthnUnsupported,
    /// The user presented a hardware key that is not registered.
    #[error("the security key used is not registered")]
    NonRegisteredDevice {
        /// Modality that observed the key.
        modality: Modality,
    },
    /// A policy-enabled modality has no prompt to drive it.
    #[error("no prompt available for enabled modality")]
    NoPrompt {
        /// Modality lacking a prompt.
        modality: Modality,
    },
    /// A single modality attempt failed.
    #[error("mfa modality attempt failed")]
    Modality {
        /// Modality that failed.
        modality: Modality,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// Every enabled modality failed.
    #[error("failed to authenticate using available MFA devices")]
    Aggregate {
        /// Failures in the order the attempts completed.
        errors: Vec<MfaError>,
    },
    /// The caller canceled before any modality settled.
    #[error("mfa prompt canceled")]
    Canceled,
}

impl MfaError {
    /// Wrap a modality-specific failure.
    pub fn modality(modality: Modality, source: impl Into<BoxError>) -> Self {
        Self::Modality {
            modality,
            source: source.into(),
        }
    }

    /// True for the unregistered-key failure that ends a race immediately.
    #[must_use]
    pub const fn is_non_registered_device(&self) -> bool {
        matches!(self, Self::NonRegisteredDevice { .. })
    }

    /// Collapse collected failures: one failure is returned as-is, several
    /// are wrapped in [`MfaError::Aggregate`].
    #[must_use]
    pub fn aggregate(mut errors: Vec<Self>) -> Self {
        if errors.len() == 1
            && let Some(single) = errors.pop()
        {
            return single;
        }
        Self::Aggregate { errors }
    }
}

/// Convenience alias for prompt results.
pub type MfaResult<T> = Result<T, MfaError>;
