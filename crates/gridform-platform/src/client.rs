//! Platform HTTP client

use crate::auth::{AuthToken, Session};
use crate::endpoints;
use crate::error::{PlatformError, Result};
use crate::params::Params;
use async_trait::async_trait;
use gridform_config::ProviderConfig;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::{debug, warn};

/// Connection to the Platform API
///
/// Every call is a form-encoded request to a named endpoint; the raw response
/// body is returned untouched for the decoders. Implementations never retry.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn call(&self, method: Method, endpoint: &str, params: &Params) -> Result<String>;

    /// POST, which is what every reconciler uses
    async fn post(&self, endpoint: &str, params: &Params) -> Result<String> {
        self.call(Method::POST, endpoint, params).await
    }
}

/// Client settings beyond the provider config
#[derive(Debug, Clone)]
pub struct HttpPlatformOptions {
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpPlatformOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("gridform/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// `reqwest` implementation of [`PlatformClient`]
///
/// No request timeout is configured here; the caller's per-operation deadline
/// drops the in-flight future instead.
pub struct HttpPlatform {
    base_url: String,
    http: Client,
    session: Session,
}

impl HttpPlatform {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Self::with_options(config, HttpPlatformOptions::default())
    }

    pub fn with_options(config: &ProviderConfig, options: HttpPlatformOptions) -> Result<Self> {
        if config.allow_unverified_ssl {
            warn!("TLS certificate verification is disabled for the Platform client");
        }

        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .user_agent(options.user_agent)
            .danger_accept_invalid_certs(config.allow_unverified_ssl)
            .build()
            .map_err(|e| PlatformError::Client(e.to_string()))?;

        Ok(Self {
            base_url: config.controller_url.trim_end_matches('/').to_string(),
            session: Session::new(&config.controller_url, config.credentials.clone()),
            http,
        })
    }

    /// Full URL for an endpoint name
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            endpoints::API_PREFIX,
            endpoint.trim_start_matches('/')
        )
    }

    /// Log in eagerly so credential problems surface at configure time
    pub async fn authenticate(&self) -> Result<()> {
        self.session.token(&self.http).await.map(|_| ())
    }
}

#[async_trait]
impl PlatformClient for HttpPlatform {
    async fn call(&self, method: Method, endpoint: &str, params: &Params) -> Result<String> {
        let url = self.endpoint_url(endpoint);
        let token = self.session.token(&self.http).await?;

        debug!(%method, endpoint, params = %params, "Platform call");

        let mut form: Vec<(String, String)> = params.as_slice().to_vec();
        let mut request = self.http.request(method, &url);
        match token {
            AuthToken::SessionKey(key) => form.push(("authkey".to_string(), key)),
            AuthToken::Bearer(jwt) => {
                request = request.header(reqwest::header::AUTHORIZATION, format!("bearer {}", jwt))
            }
        }

        let transport = |source| PlatformError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = request.form(&form).send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if status.is_success() {
            debug!(endpoint, bytes = body.len(), "Platform call succeeded");
            return Ok(body);
        }

        let err = PlatformError::from_status(endpoint, status.as_u16(), &body);
        match &err {
            PlatformError::NotFound { .. } => {
                debug!(endpoint, params = %params, "Platform reported entity not found")
            }
            PlatformError::Auth(_) => {
                warn!(endpoint, "Platform rejected credentials, dropping cached token");
                self.session.invalidate().await;
            }
            _ => warn!(
                endpoint,
                params = %params,
                status = status.as_u16(),
                error = %err,
                "Platform call failed"
            ),
        }
        Err(err)
    }
}
