#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared test helpers used across integration suites.
//! Layout: bus.rs (broadcast fan-out), cluster.rs (in-memory backend), mocks.rs (fake approver), fixtures.rs (polling helpers).

pub mod bus;
pub mod cluster;
pub mod fixtures;
pub mod mocks;
