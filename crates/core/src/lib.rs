//! NatureIn core types and utilities
//!
//! Credential storage shared by the API client and the CLI, plus the error,
//! state directory and tracing conventions used across crates.

pub mod credentials;
pub mod error;
pub mod state_dir;
pub mod tracing;

#[cfg(test)]
mod tests;

pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use error::{CoreError, CoreResult};
pub use state_dir::StateDir;
