#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Headless authentication watcher.
//!
//! A headless login started on a remote machine waits for the user to
//! approve it from a trusted device. For every connected cluster,
//! [`HeadlessWatcher`] keeps a watch on the backend's headless authentication
//! streams, notifies the approver once per pending request through a bounded
//! worker pool, and withdraws the notification as soon as the request is
//! approved, denied, expired or removed.

pub mod error;
pub mod notify;
mod registry;
pub mod retry;
mod session;
pub mod watcher;

pub use error::{HeadlessError, HeadlessResult};
pub use notify::{ApproverNotifier, PendingNotification};
pub use retry::{LinearRetry, full_jitter, half_jitter};
pub use watcher::{HeadlessWatcher, WatcherOptions};
