//! Provider context shared by every reconciler

use crate::error::{ProviderError, Result};
use gridform_config::ProviderConfig;
use gridform_platform::models::decode_list;
use gridform_platform::{HttpPlatform, LocationEntry, Params, PlatformClient, endpoints};
use std::sync::Arc;
use tracing::info;

/// Platform client plus values discovered once at configure time
#[derive(Clone)]
pub struct ProviderContext {
    client: Arc<dyn PlatformClient>,
    default_grid_id: u64,
}

impl ProviderContext {
    pub fn new(client: Arc<dyn PlatformClient>, default_grid_id: u64) -> Self {
        Self {
            client,
            default_grid_id,
        }
    }

    /// Log in to the controller and discover the default grid
    pub async fn connect(config: &ProviderConfig) -> Result<Self> {
        let platform = HttpPlatform::new(config)?;
        platform.authenticate().await?;
        info!(
            controller = %config.controller_url,
            authenticator = %config.authenticator(),
            "Authenticated with Platform"
        );
        Self::configure(Arc::new(platform)).await
    }

    /// Build a context around an existing client. The default grid is the
    /// first location the controller reports.
    pub async fn configure(client: Arc<dyn PlatformClient>) -> Result<Self> {
        let body = client
            .post(endpoints::LOCATIONS_LIST, &Params::new())
            .await?;
        let locations: Vec<LocationEntry> = decode_list(endpoints::LOCATIONS_LIST, &body)?;
        let grid = locations.first().ok_or_else(|| {
            ProviderError::validation("controller reported no locations; cannot pick a grid")
        })?;

        info!(gid = grid.gid, location = %grid.name, "Using default grid");
        Ok(Self::new(client, grid.gid))
    }

    pub fn client(&self) -> &dyn PlatformClient {
        self.client.as_ref()
    }

    pub fn default_grid_id(&self) -> u64 {
        self.default_grid_id
    }

    /// POST to an endpoint
    pub(crate) async fn post(&self, endpoint: &str, params: &Params) -> Result<String> {
        Ok(self.client.post(endpoint, params).await?)
    }
}
