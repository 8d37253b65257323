//! Wire types for the NatureIn API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Token obtain request (`POST /auth/token/`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token obtain response
///
/// Older deployments answer with `token` instead of `access`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairResponse {
    #[serde(alias = "token")]
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Token refresh request (`POST /auth/token/refresh/`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Token refresh response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// Newly minted access credential
    pub access: String,
    /// Present when the server rotates refresh credentials
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Account registration request (`POST /user/register/`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    /// `student`, `teacher` or `expert`
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_area: Option<String>,
}

/// Account registration response
///
/// The credential fields are only present when the server logs the new
/// account in straight away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Current user (`GET /user/me/`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl UserProfile {
    /// Role used when the server does not report one
    pub const DEFAULT_ROLE: &'static str = "student";

    /// Reported role, falling back to [`Self::DEFAULT_ROLE`]
    pub fn role_or_default(&self) -> &str {
        self.role.as_deref().unwrap_or(Self::DEFAULT_ROLE)
    }
}
