//! Challenge and response payloads.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Authentication modality offered by a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Time-based one-time code.
    Totp,
    /// Hardware security key or platform authenticator.
    Webauthn,
}

impl Modality {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::Webauthn => "webauthn",
        }
    }
}

impl Display for Modality {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One-time code challenge. Carries no data: the presence of the challenge is
/// what signals that a code is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpChallenge {}

/// Hardware key assertion request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebauthnChallenge {
    /// Relying party the assertion is scoped to.
    pub rp_id: String,
    /// Server-issued random challenge.
    pub challenge: Vec<u8>,
    /// Credential ids registered for the user.
    pub allowed_credentials: Vec<Vec<u8>>,
}

/// A challenge containing zero or more modality sub-challenges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaChallenge {
    /// One-time code sub-challenge.
    pub totp: Option<TotpChallenge>,
    /// Hardware key sub-challenge.
    pub webauthn: Option<WebauthnChallenge>,
}

impl MfaChallenge {
    /// True when no modality is offered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.totp.is_none() && self.webauthn.is_none()
    }

    /// Extract the sub-challenge for `modality`, if offered.
    #[must_use]
    pub fn sub_challenge(&self, modality: Modality) -> Option<SubChallenge> {
        match modality {
            Modality::Totp => self.totp.clone().map(SubChallenge::Totp),
            Modality::Webauthn => self.webauthn.clone().map(SubChallenge::Webauthn),
        }
    }
}

/// A single modality's share of a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubChallenge {
    /// One-time code request.
    Totp(TotpChallenge),
    /// Hardware key assertion request.
    Webauthn(WebauthnChallenge),
}

impl SubChallenge {
    /// Modality this sub-challenge belongs to.
    #[must_use]
    pub const fn modality(&self) -> Modality {
        match self {
            Self::Totp(_) => Modality::Totp,
            Self::Webauthn(_) => Modality::Webauthn,
        }
    }
}

/// Successful answer to a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MfaResponse {
    /// One-time code entered by the user.
    Totp {
        /// The code.
        code: String,
    },
    /// Signed hardware key assertion.
    Webauthn {
        /// Credential that produced the assertion.
        credential_id: Vec<u8>,
        /// Client data the signature covers.
        client_data_json: Vec<u8>,
        /// Authenticator data the signature covers.
        authenticator_data: Vec<u8>,
        /// Assertion signature.
        signature: Vec<u8>,
    },
}

impl MfaResponse {
    /// Modality that produced this response.
    #[must_use]
    pub const fn modality(&self) -> Modality {
        match self {
            Self::Totp { .. } => Modality::Totp,
            Self::Webauthn { .. } => Modality::Webauthn,
        }
    }
}
