//! Configuration management for the NatureIn CLI

use anyhow::Result;
use naturein_core::StateDir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment overrides, e.g. `NATUREIN_API__BASE_URL`
pub const ENV_PREFIX: &str = "NATUREIN";

/// Main CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// API connection settings
    pub api: ApiConfig,

    /// Where the credential pair is persisted
    pub credentials_file: PathBuf,

    /// Logging settings
    pub log: LogConfig,
}

/// API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every API path is appended to
    pub base_url: String,

    /// Request timeout in milliseconds, refresh calls included
    pub timeout_ms: u64,

    /// Refresh endpoint path relative to the base URL
    pub refresh_path: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Emit JSON lines
    pub json: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_ms: 8000,
            refresh_path: naturein_http::client::DEFAULT_REFRESH_PATH.to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ApiConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CliConfig {
    /// Defaults rooted at the given state directory
    pub fn defaults(state_dir: &StateDir) -> Self {
        Self {
            api: ApiConfig::default(),
            credentials_file: state_dir.credentials_path(),
            log: LogConfig::default(),
        }
    }

    /// Load configuration: defaults, then the TOML file, then environment.
    ///
    /// An explicit `path` must exist; otherwise `<config dir>/config.toml`
    /// is read if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value fails to parse
    pub fn load(path: Option<&Path>, state_dir: &StateDir) -> Result<Self> {
        let defaults = Self::defaults(state_dir);

        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::from(state_dir.config_path()).required(false),
        };

        let settings = config::Config::builder()
            // Set default values
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.timeout_ms", defaults.api.timeout_ms)?
            .set_default("api.refresh_path", defaults.api.refresh_path)?
            .set_default(
                "credentials_file",
                defaults.credentials_file.to_string_lossy().to_string(),
            )?
            .set_default("log.level", defaults.log.level)?
            .set_default("log.json", defaults.log.json)?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn missing_default_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp.path());

        let config = CliConfig::load(None, &state_dir).unwrap();

        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.timeout(), Duration::from_secs(8));
        assert_eq!(config.api.refresh_path, "/auth/token/refresh/");
        assert_eq!(config.credentials_file, state_dir.credentials_path());
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
    }

    #[test]
    fn file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp.path());

        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
credentials_file = "/tmp/naturein-creds.json"

[api]
base_url = "https://naturein.example/api"
refresh_path = "/refresh/"

[log]
json = true
"#
        )
        .unwrap();

        let config = CliConfig::load(Some(file.path()), &state_dir).unwrap();

        assert_eq!(config.api.base_url, "https://naturein.example/api");
        assert_eq!(config.api.refresh_path, "/refresh/");
        assert_eq!(config.api.timeout_ms, 8000);
        assert_eq!(
            config.credentials_file,
            PathBuf::from("/tmp/naturein-creds.json")
        );
        assert!(config.log.json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp.path());

        let result = CliConfig::load(Some(&temp.path().join("nope.toml")), &state_dir);
        assert!(result.is_err());
    }
}
