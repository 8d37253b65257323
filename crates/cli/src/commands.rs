//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use naturein_http::ApiClient;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::info;

use crate::config::CliConfig;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the issued credentials
    Login {
        /// Account name
        username: String,

        /// Account password
        #[arg(long, env = "NATUREIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored credentials
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Show the configured API and whether credentials are stored
    Status,

    /// Send an authenticated request and print the response
    Request {
        /// HTTP method, e.g. GET or POST
        method: String,

        /// Path relative to the base URL, e.g. /species/
        path: String,

        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
}

impl Commands {
    pub async fn execute(self, client: &ApiClient, config: &CliConfig) -> Result<()> {
        match self {
            Self::Login { username, password } => login(client, username, password).await,
            Self::Logout => {
                client.logout().await?;
                print_json(&json!({ "logged_in": false }))
            }
            Self::Whoami => {
                let me = client.me().await?;
                print_json(&json!({
                    "username": me.username,
                    "role": me.role_or_default(),
                }))
            }
            Self::Status => status(client, config).await,
            Self::Request { method, path, data } => {
                request(client, &method, &path, data.as_deref()).await
            }
        }
    }
}

async fn login(client: &ApiClient, username: String, password: Option<String>) -> Result<()> {
    let Some(password) = password else {
        bail!("a password is required (--password or NATUREIN_PASSWORD)");
    };

    let credentials = client.login(username.as_str(), password).await?;
    info!(%username, "Stored credentials");

    print_json(&json!({
        "username": username,
        "logged_in": true,
        "refreshable": credentials.refresh.is_some(),
    }))
}

async fn status(client: &ApiClient, config: &CliConfig) -> Result<()> {
    let credentials = client.credentials().get().await?;
    print_json(&json!({
        "base_url": client.base_url(),
        "credentials_file": config.credentials_file.display().to_string(),
        "logged_in": credentials.access.is_some(),
        "refreshable": credentials.refresh.is_some(),
    }))
}

async fn request(client: &ApiClient, method: &str, path: &str, data: Option<&str>) -> Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method: {method}"))?;

    let mut builder = client.request(method, path);
    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
        builder = builder.json(&body);
    }

    let response = client.send(builder).await?;
    let status = response.status();
    let text = response.text().await?;
    info!(status = status.as_u16(), "Request completed");

    match serde_json::from_str::<Value>(&text) {
        Ok(body) => print_json(&body),
        Err(_) => {
            if !text.is_empty() {
                println!("{text}");
            }
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
