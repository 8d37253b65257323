//! Test harness for CredentialStore implementations
//!
//! Any store plugged into the API client must behave like these tests
//! describe.

use crate::{CoreResult, CredentialStore, Credentials};

/// Test suite for CredentialStore implementations
pub struct CredentialStoreTestSuite<S: CredentialStore> {
    store: S,
}

impl<S: CredentialStore> CredentialStoreTestSuite<S> {
    /// Create a new test suite with the given store
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Run all tests
    pub async fn run_all_tests(&self) -> CoreResult<()> {
        self.test_starts_empty().await?;
        self.test_login_lifecycle().await?;
        self.test_refresh_replaces_access().await?;
        self.test_clear_is_idempotent().await?;
        Ok(())
    }

    /// A fresh store holds nothing
    pub async fn test_starts_empty(&self) -> CoreResult<()> {
        self.store.clear().await?;
        let creds = self.store.get().await?;
        assert!(creds.is_empty(), "Store should be empty before login");
        Ok(())
    }

    /// Login stores a pair, logout removes it
    pub async fn test_login_lifecycle(&self) -> CoreResult<()> {
        let pair = Credentials::new("access-1", "refresh-1");
        self.store.set(&pair).await?;
        assert_eq!(self.store.get().await?, pair);

        self.store.clear().await?;
        assert!(self.store.get().await?.is_empty());

        // Access-only logins are kept as-is
        let access_only = Credentials::access_only("access-only");
        self.store.set(&access_only).await?;
        let stored = self.store.get().await?;
        assert_eq!(stored.access.as_deref(), Some("access-only"));
        assert!(stored.refresh.is_none());

        self.store.clear().await?;
        Ok(())
    }

    /// Writing a renewed access credential keeps the refresh credential
    pub async fn test_refresh_replaces_access(&self) -> CoreResult<()> {
        self.store.set(&Credentials::new("A1", "R1")).await?;

        let renewed = self.store.get().await?.with_access("A2");
        self.store.set(&renewed).await?;

        assert_eq!(self.store.get().await?, Credentials::new("A2", "R1"));

        self.store.clear().await?;
        Ok(())
    }

    /// Clearing an already empty store is not an error
    pub async fn test_clear_is_idempotent(&self) -> CoreResult<()> {
        self.store.clear().await?;
        self.store.clear().await?;
        assert!(self.store.get().await?.is_empty());
        Ok(())
    }
}
