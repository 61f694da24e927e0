//! Platform authentication
//!
//! Credentials are exchanged for a token on first use and the token is cached
//! for the lifetime of the client. A 401/403 drops the cached token so the
//! next call logs in again.

use crate::endpoints;
use crate::error::{PlatformError, Result};
use gridform_config::Credentials;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// How a token is attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthToken {
    /// Legacy session key, sent as the `authkey` form parameter
    SessionKey(String),
    /// JWT, sent as `Authorization: bearer <jwt>`
    Bearer(String),
}

pub(crate) struct Session {
    controller_url: String,
    credentials: Credentials,
    token: RwLock<Option<AuthToken>>,
}

impl Session {
    pub(crate) fn new(controller_url: &str, credentials: Credentials) -> Self {
        // A pre-issued JWT needs no exchange
        let token = match &credentials {
            Credentials::Jwt { token } => Some(AuthToken::Bearer(token.clone())),
            _ => None,
        };
        Self {
            controller_url: controller_url.to_string(),
            credentials,
            token: RwLock::new(token),
        }
    }

    /// Current token, logging in if none is cached
    pub(crate) async fn token(&self, http: &Client) -> Result<AuthToken> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let token = self.login(http).await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Forget the cached token. A pre-issued JWT is kept since it cannot be
    /// renewed.
    pub(crate) async fn invalidate(&self) {
        if !matches!(self.credentials, Credentials::Jwt { .. }) {
            *self.token.write().await = None;
        }
    }

    async fn login(&self, http: &Client) -> Result<AuthToken> {
        match &self.credentials {
            Credentials::Legacy { user, password } => {
                info!(user = %user, "Authenticating against Platform (legacy)");
                let url = format!(
                    "{}{}/{}",
                    self.controller_url,
                    endpoints::API_PREFIX,
                    endpoints::USER_AUTHENTICATE
                );
                let form = [("username", user.as_str()), ("password", password.as_str())];
                let key = post_for_token(http, &url, &form).await?;
                Ok(AuthToken::SessionKey(key))
            }
            Credentials::Oauth2 {
                app_id,
                app_secret,
                oauth2_url,
            } => {
                info!(app_id = %app_id, "Requesting OAuth2 token");
                let url = format!("{}/v1/oauth/access_token", oauth2_url);
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", app_id.as_str()),
                    ("client_secret", app_secret.as_str()),
                    ("response_type", "id_token"),
                    ("validity", "3600"),
                ];
                let jwt = post_for_token(http, &url, &form).await?;
                Ok(AuthToken::Bearer(jwt))
            }
            Credentials::Jwt { token } => Ok(AuthToken::Bearer(token.clone())),
        }
    }
}

async fn post_for_token(http: &Client, url: &str, form: &[(&str, &str)]) -> Result<String> {
    let response = http
        .post(url)
        .form(form)
        .send()
        .await
        .map_err(|e| PlatformError::Auth(format!("{}: {}", url, e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PlatformError::Auth(format!("{}: {}", url, e)))?;

    if !status.is_success() {
        return Err(PlatformError::Auth(format!(
            "{} returned HTTP {}: {}",
            url,
            status.as_u16(),
            body.trim()
        )));
    }

    let token = parse_token(&body)
        .ok_or_else(|| PlatformError::Auth(format!("{} returned an empty token", url)))?;
    debug!("Obtained Platform token");
    Ok(token)
}

/// Tokens come back either bare or as a JSON string
pub(crate) fn parse_token(body: &str) -> Option<String> {
    let trimmed = body.trim();
    let token = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::String(s)) => s,
        _ => trimmed.to_string(),
    };
    if token.is_empty() { None } else { Some(token) }
}
