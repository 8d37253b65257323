//! NatureIn API client
//!
//! Every request goes through [`ApiClient::send`], which attaches the stored
//! access credential and recovers from an expired one by refreshing it once
//! and replaying the request. Callers only ever see the final outcome.

pub mod auth;
pub mod error;
pub mod refresh;

use error::{ClientError, RefreshError};
use naturein_core::{CredentialStore, MemoryCredentialStore};
use refresh::RefreshCoordinator;
use reqwest::{Client, ClientBuilder, Request, RequestBuilder, Response, StatusCode, header};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{RefreshRequest, RefreshResponse};

/// Default request timeout, applied to the refresh call as well
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Default path of the refresh endpoint, relative to the base URL
pub const DEFAULT_REFRESH_PATH: &str = "/auth/token/refresh/";

/// NatureIn API client
///
/// Cloning is cheap; clones share the credential store and the refresh
/// coordinator.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    refresh_path: String,
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a new client with default configuration and an in-memory store
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credential store this client reads from and writes to
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Refresh coordinator shared by this client and its clones
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a request builder. Authentication is added by [`Self::send`].
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Send a request with the stored access credential.
    ///
    /// A 401 is answered by renewing the credential and replaying the request
    /// once. If renewal is impossible, or the replay is rejected again, the
    /// 401 is returned as [`ClientError::AuthenticationFailed`]. Transport
    /// errors and every other status are returned as they are.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let request = request.build()?;
        let replay = request.try_clone();

        let sent_with = self.store.get().await?.access;
        let response = self.dispatch(request, sent_with.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_status(response).await;
        }

        let unauthorized = Self::into_error(response).await;

        let Some(replay) = replay else {
            debug!("Request body cannot be replayed, returning 401");
            return Err(unauthorized);
        };

        let access = match self
            .coordinator
            .renew(self.store.as_ref(), sent_with.as_deref(), |refresh| {
                self.refresh_access(refresh)
            })
            .await
        {
            Ok(access) => access,
            Err(err) => {
                debug!(reason = %err, "Could not renew access credential");
                return Err(unauthorized);
            }
        };

        // Second and last attempt; a repeated 401 is surfaced as-is
        let response = self.dispatch(replay, Some(&access)).await?;
        Self::check_status(response).await
    }

    /// Execute a request and decode the JSON body
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Execute a request that is not subject to credential handling
    pub(crate) async fn execute_public<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn dispatch(
        &self,
        mut request: Request,
        access: Option<&str>,
    ) -> Result<Response, ClientError> {
        if let Some(access) = access {
            let value = header::HeaderValue::from_str(&format!("Bearer {access}"))
                .map_err(|_| ClientError::Configuration("invalid access credential".into()))?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }

        debug!(
            method = %request.method(),
            url = %request.url(),
            authenticated = access.is_some(),
            "Sending request"
        );
        Ok(self.client.execute(request).await?)
    }

    /// Call the refresh endpoint directly, bypassing credential handling
    async fn refresh_access(&self, refresh: String) -> Result<RefreshResponse, RefreshError> {
        let response = self
            .client
            .post(self.url(&self.refresh_path))
            .json(&RefreshRequest { refresh })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                "Refresh endpoint rejected the refresh credential"
            );
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|err| RefreshError::Malformed(err.to_string()))
    }

    async fn check_status(response: Response) -> Result<Response, ClientError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::into_error(response).await)
        }
    }

    async fn into_error(response: Response) -> ClientError {
        let status = response.status();
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        ClientError::from_status(status, message)
    }
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    refresh_path: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the refresh endpoint path, relative to the base URL
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Set the credential store shared with login/logout flows
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is empty".into()));
        }

        let refresh_path = self
            .refresh_path
            .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string());
        if !refresh_path.starts_with('/') {
            return Err(ClientError::Configuration(
                "refresh_path must start with '/'".into(),
            ));
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("naturein-client/{}", env!("CARGO_PKG_VERSION")));

        let client = ClientBuilder::new()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(user_agent)
            .build()?;

        Ok(ApiClient {
            client,
            base_url,
            refresh_path,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new())),
            coordinator: Arc::new(RefreshCoordinator::new()),
        })
    }
}
