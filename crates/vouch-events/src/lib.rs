#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Resource watch contracts shared by the Vouch workspace.
//!
//! The backend exposes ordered streams of resource changes. This crate
//! describes what those streams carry (`payloads.rs`), the handle a consumer
//! reads them through (`watch.rs`) and the cluster-facing client contracts
//! (`cluster.rs`).

pub mod cluster;
pub mod error;
pub mod payloads;
pub mod watch;

pub use cluster::{ClusterClient, ClusterStore};
pub use error::{ClusterError, ClusterResult, WatchError, WatchResult};
pub use payloads::{
    HeadlessAuthentication, HeadlessState, KIND_HEADLESS_AUTHENTICATION, OpType, Resource,
    WatchEvent, WatchKind,
};
pub use watch::{ResourceWatcher, Watch, WatchSender};
