#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Certificate-rotation-aware client cache.
//!
//! A long-lived process holds one authenticated client per credential. When
//! the certificate on disk rotates, the next acquisition rebuilds the client
//! and the previous handle is closed in the background once every caller
//! still using it has let go.

pub mod cache;
pub mod error;
pub mod source;

pub use cache::{ClientCache, Lease};
pub use error::{BoxError, CacheError, CacheResult};
pub use source::{CertificateSource, ClientBuilder, RetireClient};
