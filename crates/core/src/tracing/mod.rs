//! Shared tracing setup
//!
//! Libraries only emit events through the `tracing` macros; binaries call
//! [`init_tracing`] once at startup.

pub mod config;
pub mod init;

pub use config::InstrumentationConfig;
pub use init::init_tracing;
