//! Prompt configuration and the modality enablement policy.

use std::fmt::{self, Display, Formatter};

use vouch_config::{AuthenticatorAttachment, MfaSettings};

use crate::challenge::MfaChallenge;
use crate::error::{MfaError, MfaResult};

const ADMIN_ACTION_REASON: &str = "MFA is required for admin-level API request.";

/// Whether this build targets a platform with a hardware key stack.
#[must_use]
pub const fn platform_webauthn_support() -> bool {
    cfg!(any(target_os = "linux", target_os = "macos", target_os = "windows"))
}

/// Device description emphasised while prompting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDescriptor {
    /// A device already registered with the account.
    Registered,
}

impl Display for DeviceDescriptor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => formatter.write_str("registered"),
        }
    }
}

/// Modalities a prompt run should attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOpts {
    /// Ask for a one-time code.
    pub totp: bool,
    /// Ask for a hardware key assertion.
    pub webauthn: bool,
}

/// Options shared by every prompt run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// Address of the authenticating proxy.
    pub proxy_address: String,
    /// Context shown before prompting, e.g. why MFA is required.
    pub prompt_reason: Option<String>,
    /// Device description to emphasise.
    pub device_type: Option<DeviceDescriptor>,
    /// Suppress user-facing prompt text.
    pub quiet: bool,
    /// Prompt for codes while a hardware key prompt is active. When false only
    /// the strongest available modality is attempted.
    pub allow_input_capture: bool,
    /// Requested authenticator attachment.
    pub authenticator_attachment: AuthenticatorAttachment,
    /// Favour one-time codes; takes precedence over the attachment.
    pub prefer_otp: bool,
    /// Whether hardware keys can be used here.
    pub webauthn_supported: bool,
}

impl PromptConfig {
    /// Default behaviour for `proxy_address`.
    #[must_use]
    pub fn new(proxy_address: impl Into<String>) -> Self {
        Self {
            proxy_address: proxy_address.into(),
            prompt_reason: None,
            device_type: None,
            quiet: false,
            allow_input_capture: false,
            authenticator_attachment: AuthenticatorAttachment::Auto,
            prefer_otp: false,
            webauthn_supported: platform_webauthn_support(),
        }
    }

    /// Build from loaded settings, detecting hardware key support when the
    /// settings leave it unspecified.
    #[must_use]
    pub fn from_settings(settings: &MfaSettings) -> Self {
        Self {
            quiet: settings.quiet,
            allow_input_capture: settings.allow_input_capture,
            authenticator_attachment: settings.authenticator_attachment,
            prefer_otp: settings.prefer_otp,
            webauthn_supported: settings
                .webauthn_supported
                .unwrap_or_else(platform_webauthn_support),
            ..Self::new(settings.proxy_address.clone())
        }
    }

    /// Suppress user-facing prompt text.
    #[must_use]
    pub fn with_quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Explain why the user is being prompted.
    #[must_use]
    pub fn with_prompt_reason(mut self, reason: impl Into<String>) -> Self {
        self.prompt_reason = Some(reason.into());
        self
    }

    /// Standard reason for admin-level requests.
    #[must_use]
    pub fn with_admin_action_reason(self) -> Self {
        self.with_prompt_reason(ADMIN_ACTION_REASON)
    }

    /// Standard reason for per-session MFA.
    #[must_use]
    pub fn with_session_reason(self, service_type: &str, service_name: &str) -> Self {
        self.with_prompt_reason(format!(
            "MFA is required to access {service_type} {service_name:?}"
        ))
    }

    /// Emphasise a device description while prompting.
    #[must_use]
    pub fn with_device_type(mut self, device_type: DeviceDescriptor) -> Self {
        self.device_type = Some(device_type);
        self
    }

    /// Decide which modalities to attempt for `challenge`.
    ///
    /// Platform support is applied first; then the first matching preference
    /// wins: `prefer_otp`, a specific attachment, then the input-capture rule.
    ///
    /// # Errors
    ///
    /// - [`MfaError::EmptyChallenge`] when nothing is offered.
    /// - [`MfaError::WebauthnUnsupported`] when only hardware keys are offered
    ///   and this platform cannot use them.
    pub fn run_options(&self, challenge: &MfaChallenge) -> MfaResult<RunOpts> {
        let mut totp = challenge.totp.is_some();
        let mut webauthn = challenge.webauthn.is_some();

        if !totp && !webauthn {
            return Err(MfaError::EmptyChallenge);
        }

        if !self.webauthn_supported {
            if !totp {
                return Err(MfaError::WebauthnUnsupported);
            }
            webauthn = false;
        }

        if totp && self.prefer_otp {
            webauthn = false;
        } else if webauthn
            && (self.authenticator_attachment != AuthenticatorAttachment::Auto
                || !self.allow_input_capture)
        {
            totp = false;
        }

        Ok(RunOpts { totp, webauthn })
    }

    /// Origin used for hardware key assertions.
    #[must_use]
    pub fn webauthn_origin(&self) -> String {
        if self.proxy_address.starts_with("https://") {
            self.proxy_address.clone()
        } else {
            format!("https://{}", self.proxy_address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{TotpChallenge, WebauthnChallenge};

    fn challenge(totp: bool, webauthn: bool) -> MfaChallenge {
        MfaChallenge {
            totp: totp.then(TotpChallenge::default),
            webauthn: webauthn.then(WebauthnChallenge::default),
        }
    }

    fn config() -> PromptConfig {
        PromptConfig {
            webauthn_supported: true,
            ..PromptConfig::new("proxy.example.com:3080")
        }
    }

    #[test]
    fn enablement_policy_table() {
        struct Case {
            name: &'static str,
            config: PromptConfig,
            challenge: MfaChallenge,
            expect: Option<RunOpts>,
        }

        let both = RunOpts {
            totp: true,
            webauthn: true,
        };
        let totp_only = RunOpts {
            totp: true,
            webauthn: false,
        };
        let webauthn_only = RunOpts {
            totp: false,
            webauthn: true,
        };

        let cases = vec![
            Case {
                name: "empty challenge",
                config: config(),
                challenge: challenge(false, false),
                expect: None,
            },
            Case {
                name: "hardware keys unsupported, totp available",
                config: PromptConfig {
                    webauthn_supported: false,
                    ..config()
                },
                challenge: challenge(true, true),
                expect: Some(totp_only),
            },
            Case {
                name: "hardware keys unsupported, webauthn only",
                config: PromptConfig {
                    webauthn_supported: false,
                    ..config()
                },
                challenge: challenge(false, true),
                expect: None,
            },
            Case {
                name: "prefer otp",
                config: PromptConfig {
                    prefer_otp: true,
                    allow_input_capture: true,
                    ..config()
                },
                challenge: challenge(true, true),
                expect: Some(totp_only),
            },
            Case {
                name: "prefer otp beats attachment",
                config: PromptConfig {
                    prefer_otp: true,
                    authenticator_attachment: AuthenticatorAttachment::Platform,
                    ..config()
                },
                challenge: challenge(true, true),
                expect: Some(totp_only),
            },
            Case {
                name: "specific attachment",
                config: PromptConfig {
                    authenticator_attachment: AuthenticatorAttachment::CrossPlatform,
                    allow_input_capture: true,
                    ..config()
                },
                challenge: challenge(true, true),
                expect: Some(webauthn_only),
            },
            Case {
                name: "input capture disallowed",
                config: config(),
                challenge: challenge(true, true),
                expect: Some(webauthn_only),
            },
            Case {
                name: "input capture allowed",
                config: PromptConfig {
                    allow_input_capture: true,
                    ..config()
                },
                challenge: challenge(true, true),
                expect: Some(both),
            },
            Case {
                name: "totp only challenge",
                config: config(),
                challenge: challenge(true, false),
                expect: Some(totp_only),
            },
        ];

        for case in cases {
            let result = case.config.run_options(&case.challenge);
            match case.expect {
                Some(expected) => {
                    assert_eq!(result.ok(), Some(expected), "{}", case.name);
                }
                None => assert!(result.is_err(), "{}", case.name),
            }
        }
    }

    #[test]
    fn policy_errors_are_distinguished() {
        assert!(matches!(
            config().run_options(&challenge(false, false)),
            Err(MfaError::EmptyChallenge)
        ));
        let unsupported = PromptConfig {
            webauthn_supported: false,
            ..config()
        };
        assert!(matches!(
            unsupported.run_options(&challenge(false, true)),
            Err(MfaError::WebauthnUnsupported)
        ));
    }

    #[test]
    fn origin_gains_scheme_once() {
        assert_eq!(
            config().webauthn_origin(),
            "https://proxy.example.com:3080"
        );
        assert_eq!(
            PromptConfig::new("https://proxy.example.com").webauthn_origin(),
            "https://proxy.example.com"
        );
    }

    #[test]
    fn reasons_and_settings() {
        let admin = config().with_admin_action_reason();
        assert_eq!(admin.prompt_reason.as_deref(), Some(ADMIN_ACTION_REASON));

        let session = config().with_session_reason("node", "db-01");
        assert_eq!(
            session.prompt_reason.as_deref(),
            Some("MFA is required to access node \"db-01\"")
        );

        let settings = MfaSettings {
            proxy_address: "proxy:443".into(),
            prefer_otp: true,
            webauthn_supported: Some(false),
            quiet: true,
            ..MfaSettings::default()
        };
        let from = PromptConfig::from_settings(&settings)
            .with_device_type(DeviceDescriptor::Registered);
        assert_eq!(from.proxy_address, "proxy:443");
        assert!(from.prefer_otp);
        assert!(!from.webauthn_supported);
        assert!(from.quiet);
        assert_eq!(from.device_type.map(|d| d.to_string()).as_deref(), Some("registered"));
    }
}
