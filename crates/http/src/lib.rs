//! NatureIn HTTP client
//!
//! Thin wrapper around the NatureIn REST API. The interesting part is the
//! credential handling: bearer credentials are attached to every request and
//! an expired access credential is renewed once, no matter how many requests
//! notice it at the same time.

pub mod client;
pub mod types;

pub use client::error::{ClientError, RefreshError};
pub use client::refresh::RefreshCoordinator;
pub use client::{ApiClient, ApiClientBuilder};
