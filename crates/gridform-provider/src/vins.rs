//! ViNS reconciler
//!
//! `ext_net_id` selects the external connection: -1 keeps the ViNS isolated,
//! 0 connects it to the grid's default external network and a positive id
//! connects it to that network. Only the external connection can change
//! after creation.

use crate::context::ProviderContext;
use crate::error::{ProviderError, Result};
use crate::flatten::flatten_vins;
use crate::resolver::{resolve_account_id, resolve_vins, search_vins};
use crate::resource::{Resource, numeric_id, sync_unchanged};
use crate::schema::{MAX_VINS_PER_RG, vins_schema};
use async_trait::async_trait;
use gridform_cloud::{ResourceData, Schema};
use gridform_platform::models::{decode, decode_id};
use gridform_platform::{Params, VinsRecord, endpoints};
use serde_json::Value;
use tracing::{info, warn};

const ISOLATED: i64 = -1;
const DEFAULT_EXT_NET: i64 = 0;

/// External connection change between two `ext_net_id` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtNetChange {
    None,
    Connect(i64),
    Disconnect,
    Reconnect(i64),
}

impl ExtNetChange {
    pub fn between(old: i64, new: i64) -> Self {
        if old == new {
            return ExtNetChange::None;
        }
        match (old, new) {
            (old, new) if old > 0 && new > 0 => ExtNetChange::Reconnect(new),
            (old, _) if old > 0 => ExtNetChange::Disconnect,
            (_, new) if new > 0 => ExtNetChange::Connect(new),
            (old, DEFAULT_EXT_NET) if old < 0 => ExtNetChange::Connect(DEFAULT_EXT_NET),
            (DEFAULT_EXT_NET, new) if new < 0 => ExtNetChange::Disconnect,
            _ => ExtNetChange::None,
        }
    }
}

fn ext_net_id(value: &Value) -> i64 {
    value.as_i64().unwrap_or(ISOLATED)
}

pub struct VinsResource;

impl VinsResource {
    async fn connect(ctx: &ProviderContext, vins_id: u64, net_id: i64) -> Result<()> {
        let params = Params::new().with("vinsId", vins_id).with("netId", net_id);
        ctx.post(endpoints::VINS_EXTNET_CONNECT, &params).await?;
        info!(vins_id, net_id, "Connected ViNS to external network");
        Ok(())
    }

    async fn disconnect(ctx: &ProviderContext, vins_id: u64) -> Result<()> {
        let params = Params::new().with("vinsId", vins_id);
        ctx.post(endpoints::VINS_EXTNET_DISCONNECT, &params).await?;
        info!(vins_id, "Disconnected ViNS from external network");
        Ok(())
    }

    /// Refuse to create past the per-group ViNS limit
    async fn check_rg_capacity(ctx: &ProviderContext, rg_id: u64) -> Result<()> {
        let live = search_vins(ctx, None, 0, rg_id).await?;
        if live.len() >= MAX_VINS_PER_RG {
            return Err(ProviderError::validation(format!(
                "resource group {} already has {} ViNS (limit {})",
                rg_id,
                live.len(),
                MAX_VINS_PER_RG
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for VinsResource {
    fn kind(&self) -> &'static str {
        "vins"
    }

    fn schema(&self) -> Schema {
        vins_schema()
    }

    async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        if name.is_empty() {
            return Err(ProviderError::validation("ViNS create requires name"));
        }
        let ext_net = d.get("ext_net_id").map(ext_net_id).unwrap_or(ISOLATED);
        let ipcidr = d.get_ok("ipcidr").and_then(|v| v.as_str()).map(str::to_string);
        let desc = d.get_ok("description").and_then(|v| v.as_str()).map(str::to_string);

        let rg_id = d.get_u64("rg_id");
        let (endpoint, mut params) = if rg_id > 0 {
            Self::check_rg_capacity(ctx, rg_id).await?;
            (
                endpoints::VINS_CREATE_IN_RG,
                Params::new().with("rgId", rg_id).with("name", &name),
            )
        } else {
            let account_id = resolve_account_id(ctx, d).await?.ok_or_else(|| {
                ProviderError::validation("ViNS create requires rg_id or account_id")
            })?;
            (
                endpoints::VINS_CREATE_IN_ACCOUNT,
                Params::new()
                    .with("accountId", account_id)
                    .with("gid", ctx.default_grid_id())
                    .with("name", &name),
            )
        };
        params.set_opt("ipcidr", ipcidr);
        params.set("extNetId", ext_net);
        params.set_opt("desc", desc);

        let body = ctx.post(endpoint, &params).await?;
        let id = decode_id(endpoint, &body)?;
        d.set_id(id.to_string());
        info!(vins_id = id, name = %name, ext_net_id = ext_net, "Created ViNS");

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        match resolve_vins(ctx, d).await? {
            Some(body) => {
                let record: VinsRecord = decode(endpoints::VINS_GET, &body)?;
                flatten_vins(&record, d);
            }
            None => {
                warn!(id = d.id(), name = d.get_str("name"), "ViNS no longer exists");
                d.set_id("");
            }
        }
        Ok(())
    }

    async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        if d.has_change("ipcidr") && d.get_ok("ipcidr").is_some() {
            return Err(ProviderError::Immutable("ipcidr".to_string()));
        }
        let id = match numeric_id(d) {
            0 => return Err(ProviderError::validation("ViNS has no id")),
            id => id,
        };
        d.partial(true);
        sync_unchanged(d);

        let (old, new) = d.get_change("ext_net_id");
        match ExtNetChange::between(ext_net_id(&old), ext_net_id(&new)) {
            ExtNetChange::None => {}
            ExtNetChange::Connect(net_id) => Self::connect(ctx, id, net_id).await?,
            ExtNetChange::Disconnect => Self::disconnect(ctx, id).await?,
            ExtNetChange::Reconnect(net_id) => {
                Self::disconnect(ctx, id).await?;
                Self::connect(ctx, id, net_id).await?;
            }
        }
        d.set_partial("ext_net_id");
        d.partial(false);

        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let Some(body) = resolve_vins(ctx, d).await? else {
            info!(id = d.id(), "ViNS already absent");
            d.set_id("");
            return Ok(());
        };

        let record: VinsRecord = decode(endpoints::VINS_GET, &body)?;
        let params = Params::new()
            .with("vinsId", record.id)
            .with("force", true)
            .with("permanently", true);
        ctx.post(endpoints::VINS_DELETE, &params).await?;
        info!(vins_id = record.id, "Deleted ViNS");
        d.set_id("");
        Ok(())
    }

    async fn exists(&self, ctx: &ProviderContext, d: &ResourceData) -> Result<bool> {
        Ok(resolve_vins(ctx, d).await?.is_some())
    }
}
