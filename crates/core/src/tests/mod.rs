//! Reusable test harnesses for core traits

mod credentials;

pub use credentials::CredentialStoreTestSuite;
