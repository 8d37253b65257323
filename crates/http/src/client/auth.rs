//! Authentication API client methods

use super::{ApiClient, ClientError};
use crate::types::{
    LoginRequest, RegisterRequest, RegisterResponse, TokenPairResponse, UserProfile,
};
use naturein_core::Credentials;
use reqwest::Method;
use tracing::info;

impl ApiClient {
    /// Obtain a credential pair with a username and password and store it.
    ///
    /// Login is sent without credential handling: a rejected password is an
    /// error, never a reason to refresh.
    pub async fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Credentials, ClientError> {
        let body = LoginRequest {
            username: username.into(),
            password: password.into(),
        };
        let request = self.request(Method::POST, "/auth/token/").json(&body);
        let pair: TokenPairResponse = self.execute_public(request).await?;

        if pair.access.is_empty() {
            return Err(ClientError::AuthenticationFailed(
                "login response carried no access credential".into(),
            ));
        }

        let credentials = Credentials {
            access: Some(pair.access),
            refresh: pair.refresh,
        };
        self.credentials().set(&credentials).await?;

        info!(refreshable = credentials.refresh.is_some(), "Logged in");
        Ok(credentials)
    }

    /// Register a new account, storing credentials if the server issues them
    pub async fn register(
        &self,
        form: RegisterRequest,
    ) -> Result<RegisterResponse, ClientError> {
        let request = self.request(Method::POST, "/user/register/").json(&form);
        let response: RegisterResponse = self.execute_public(request).await?;

        if let Some(access) = response.access.as_deref().filter(|a| !a.is_empty()) {
            let credentials = Credentials {
                access: Some(access.to_string()),
                refresh: response.refresh.clone(),
            };
            self.credentials().set(&credentials).await?;
            info!("Registered and logged in");
        }

        Ok(response)
    }

    /// Get the current user (requires authentication)
    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        let request = self.request(Method::GET, "/user/me/");
        self.execute(request).await
    }

    /// Forget both credentials. Purely local; the server is not contacted.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.credentials().clear().await?;
        info!("Logged out");
        Ok(())
    }
}
