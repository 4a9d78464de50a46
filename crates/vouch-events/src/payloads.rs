//! Resource payloads carried by the backend's watch streams.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resource kind string used for headless authentication records.
pub const KIND_HEADLESS_AUTHENTICATION: &str = "headless_authentication";

/// Lifecycle states of a headless authentication request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadlessState {
    /// State was never set by the backend.
    #[default]
    Unspecified,
    /// Waiting for a remote approver.
    Pending,
    /// Approved from an authenticated session.
    Approved,
    /// Denied from an authenticated session.
    Denied,
    /// Server-side timeout elapsed before a decision was made.
    Expired,
}

impl HeadlessState {
    /// Whether the request left `pending` for good. `Expired` counts as
    /// resolved so a timed-out request withdraws its notification too.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Approved | Self::Denied | Self::Expired)
    }

    /// Stable lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Expired => "expired",
        }
    }
}

impl Display for HeadlessState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One headless login awaiting approval from a separate session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadlessAuthentication {
    /// Opaque request name, unique per cluster.
    pub name: String,
    /// User the headless login is performed for.
    pub user: String,
    /// IP address of the device that requested the login.
    pub client_ip: String,
    /// Creation timestamp recorded by the backend.
    pub created_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub state: HeadlessState,
}

impl HeadlessAuthentication {
    /// Build a freshly created pending request with a random name.
    #[must_use]
    pub fn pending(user: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            name: Uuid::new_v4().to_string(),
            user: user.into(),
            client_ip: client_ip.into(),
            created_at: Utc::now(),
            state: HeadlessState::Pending,
        }
    }

    /// Return a copy of the request carrying `state`.
    #[must_use]
    pub fn with_state(mut self, state: HeadlessState) -> Self {
        self.state = state;
        self
    }
}

/// Resource carried by a watch event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    /// Full headless authentication record.
    HeadlessAuthentication(HeadlessAuthentication),
    /// Kind and name only; deletes and foreign kinds arrive in this shape.
    Header {
        /// Resource kind string.
        kind: String,
        /// Resource name.
        name: String,
    },
}

impl Resource {
    /// Name of the underlying resource.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::HeadlessAuthentication(request) => &request.name,
            Self::Header { name, .. } => name,
        }
    }

    /// Kind string of the underlying resource.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::HeadlessAuthentication(_) => KIND_HEADLESS_AUTHENTICATION,
            Self::Header { kind, .. } => kind,
        }
    }

    /// Borrow the headless record when the resource carries one.
    #[must_use]
    pub const fn as_headless(&self) -> Option<&HeadlessAuthentication> {
        match self {
            Self::HeadlessAuthentication(request) => Some(request),
            Self::Header { .. } => None,
        }
    }

    /// Header describing a headless authentication by name only.
    #[must_use]
    pub fn headless_header(name: impl Into<String>) -> Self {
        Self::Header {
            kind: KIND_HEADLESS_AUTHENTICATION.to_string(),
            name: name.into(),
        }
    }
}

/// Operation type attached to every watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    /// Stream finished its initial synchronisation.
    Init,
    /// Resource was created or updated.
    Put,
    /// Resource was removed.
    Delete,
}

impl OpType {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }
}

impl Display for OpType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Single change observed on a watch stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// Operation that produced the event.
    pub op: OpType,
    /// Affected resource; absent on `init`.
    pub resource: Option<Resource>,
}

impl WatchEvent {
    /// Initial synchronisation marker.
    #[must_use]
    pub const fn init() -> Self {
        Self {
            op: OpType::Init,
            resource: None,
        }
    }

    /// Create or update of `resource`.
    #[must_use]
    pub const fn put(resource: Resource) -> Self {
        Self {
            op: OpType::Put,
            resource: Some(resource),
        }
    }

    /// Removal of `resource`.
    #[must_use]
    pub const fn delete(resource: Resource) -> Self {
        Self {
            op: OpType::Delete,
            resource: Some(resource),
        }
    }
}

/// Sub-stream selector for headless authentication watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchKind {
    /// Only requests entering the `pending` state.
    PendingHeadless,
    /// Every headless authentication transition, including deletes.
    Headless,
}

impl WatchKind {
    /// Whether a backend serving this kind forwards `event`.
    ///
    /// `init` is always forwarded; it is emitted once per stream by the
    /// backend rather than derived from a resource change.
    #[must_use]
    pub fn admits(self, event: &WatchEvent) -> bool {
        let Some(resource) = event.resource.as_ref() else {
            return event.op == OpType::Init;
        };
        if resource.kind() != KIND_HEADLESS_AUTHENTICATION {
            return false;
        }
        match self {
            Self::PendingHeadless => {
                event.op == OpType::Put
                    && resource
                        .as_headless()
                        .is_some_and(|request| request.state == HeadlessState::Pending)
            }
            Self::Headless => true,
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingHeadless => "pending_headless",
            Self::Headless => "headless",
        }
    }
}

impl Display for WatchKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
