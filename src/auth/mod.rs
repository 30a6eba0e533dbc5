//! Bearer token handling.
//!
//! The token is read once per run from a file. A refresh token can be
//! exchanged for a fresh id token, which is written back to that file.

use crate::config::{AuthConfig, ConfigError};
use anyhow::{Context, Result};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Read the bearer token from `path`.
pub fn load_bearer_token(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::MissingToken(path.to_path_buf()))?;

    let token = content.trim();
    if token.is_empty() {
        return Err(ConfigError::EmptyToken(path.to_path_buf()));
    }
    Ok(token.to_string())
}

/// Write a bearer token to `path`.
pub fn store_bearer_token(path: &Path, token: &str) -> Result<()> {
    std::fs::write(path, token)
        .with_context(|| format!("Failed to write token file: {}", path.display()))
}

/// Response of the secure token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedToken {
    pub id_token: String,
    /// A rotated refresh token, when one is issued.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the id token in seconds.
    #[serde(default)]
    pub expires_in: Option<String>,
}

impl RefreshedToken {
    /// Whether the endpoint issued a refresh token other than `previous`.
    pub fn rotated(&self, previous: &str) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| token != previous)
    }
}

/// Secure token endpoint URL, with the API key when configured.
pub fn token_endpoint(auth: &AuthConfig) -> Result<Url> {
    let mut url = Url::parse(&auth.token_url)
        .with_context(|| format!("Invalid token URL: {}", auth.token_url))?;
    if let Some(ref key) = auth.api_key {
        url.query_pairs_mut().append_pair("key", key);
    }
    Ok(url)
}

/// The token endpoint answers a successful exchange with 200 only.
fn is_token_issued(status: StatusCode) -> bool {
    status == StatusCode::OK
}

/// Exchange a refresh token for a new id token.
pub async fn refresh_id_token(
    client: &reqwest::Client,
    auth: &AuthConfig,
    refresh_token: &str,
) -> Result<RefreshedToken> {
    let url = token_endpoint(auth)?;

    let response = client
        .post(url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await
        .context("Failed to reach the token endpoint")?;

    if !is_token_issued(response.status()) {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("Error refreshing id token {}: {}", status, body));
    }

    let token: RefreshedToken = response
        .json()
        .await
        .context("Failed to parse token response")?;

    info!(
        "Refreshed id token (expires in {}s)",
        token.expires_in.as_deref().unwrap_or("?")
    );
    Ok(token)
}
