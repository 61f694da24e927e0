//! Resource group reconciler

use crate::context::ProviderContext;
use crate::error::{ProviderError, Result};
use crate::flatten::flatten_rg;
use crate::resolver::{resolve_account_id, resolve_rg};
use crate::resource::{Resource, numeric_id, sync_unchanged};
use crate::schema::rg_schema;
use async_trait::async_trait;
use gridform_cloud::{ResourceData, Schema};
use gridform_platform::models::{decode, decode_id};
use gridform_platform::{Params, RgRecord, endpoints};
use tracing::{info, warn};

/// Schema key and Platform parameter for each quota
const QUOTAS: [(&str, &str); 4] = [
    ("quota_cpu", "maxCPUCapacity"),
    ("quota_ram", "maxMemoryCapacity"),
    ("quota_disk", "maxVDiskCapacity"),
    ("quota_ext_ips", "maxNumPublicIP"),
];

/// Quota value, -1 (unlimited) when not declared
fn quota(d: &ResourceData, key: &str) -> i64 {
    d.get(key).and_then(|v| v.as_i64()).unwrap_or(-1)
}

pub struct RgResource;

#[async_trait]
impl Resource for RgResource {
    fn kind(&self) -> &'static str {
        "resgroup"
    }

    fn schema(&self) -> Schema {
        rg_schema()
    }

    async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        if name.is_empty() {
            return Err(ProviderError::validation("resource group create requires name"));
        }
        let account_id = resolve_account_id(ctx, d).await?.ok_or_else(|| {
            ProviderError::validation("resource group create requires account_id or account_name")
        })?;
        let gid = match d.get_u64("gid") {
            0 => ctx.default_grid_id(),
            gid => gid,
        };

        let mut params = Params::new()
            .with("accountId", account_id)
            .with("gid", gid)
            .with("name", &name);
        for (key, param) in QUOTAS {
            params.set(param, quota(d, key));
        }
        let def_net = match d.get_str("def_net_type") {
            "" => "PRIVATE",
            other => other,
        };
        params.set("def_net", def_net);
        params.set_opt("ipcidr", d.get_ok("ipcidr").and_then(|v| v.as_str()));
        params.set_opt("extNetId", d.get_ok("ext_net_id").and_then(|v| v.as_i64()));
        params.set_opt("desc", d.get_ok("description").and_then(|v| v.as_str()));

        let body = ctx.post(endpoints::RG_CREATE, &params).await?;
        let id = decode_id(endpoints::RG_CREATE, &body)?;
        d.set_id(id.to_string());
        info!(rg_id = id, name = %name, account_id, "Created resource group");

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        match resolve_rg(ctx, d).await? {
            Some(body) => {
                let record: RgRecord = decode(endpoints::RG_GET, &body)?;
                flatten_rg(&record, d);
            }
            None => {
                warn!(id = d.id(), name = d.get_str("name"), "Resource group no longer exists");
                d.set_id("");
            }
        }
        Ok(())
    }

    /// Sends only the changed values; no call when nothing changed
    async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let id = match numeric_id(d) {
            0 => return Err(ProviderError::validation("resource group has no id")),
            id => id,
        };
        d.partial(true);
        sync_unchanged(d);

        let mut params = Params::new().with("rgId", id);
        let mut changed = Vec::new();
        if d.has_change("name") {
            params.set("name", d.get_str("name"));
            changed.push("name");
        }
        if d.has_change("description") && d.get_ok("description").is_some() {
            params.set("desc", d.get_str("description"));
            changed.push("description");
        }
        for (key, param) in QUOTAS {
            if d.has_change(key) {
                params.set(param, quota(d, key));
                changed.push(key);
            }
        }

        if !changed.is_empty() {
            ctx.post(endpoints::RG_UPDATE, &params).await?;
            info!(rg_id = id, changed = ?changed, "Updated resource group");
            for key in changed {
                d.set_partial(key);
            }
        }
        d.partial(false);

        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let Some(body) = resolve_rg(ctx, d).await? else {
            info!(id = d.id(), "Resource group already absent");
            d.set_id("");
            return Ok(());
        };

        let record: RgRecord = decode(endpoints::RG_GET, &body)?;
        let params = Params::new()
            .with("rgId", record.id)
            .with("force", true)
            .with("permanently", true);
        ctx.post(endpoints::RG_DELETE, &params).await?;
        info!(rg_id = record.id, "Deleted resource group");
        d.set_id("");
        Ok(())
    }

    async fn exists(&self, ctx: &ProviderContext, d: &ResourceData) -> Result<bool> {
        Ok(resolve_rg(ctx, d).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridform_cloud::ResourceState;
    use gridform_platform::mock::MockPlatform;
    use serde_json::json;
    use std::sync::Arc;

    const RG: &str = r#"{"id": 42, "name": "prod", "accountId": 7, "gid": 212,
        "defNetType": "PRIVATE", "status": "CREATED",
        "resourceLimits": {"CU_C": 16, "CU_M": 32768}, "vins": [77], "vms": [9001]}"#;

    fn ctx(mock: &Arc<MockPlatform>) -> ProviderContext {
        ProviderContext::new(mock.clone(), 212)
    }

    #[tokio::test]
    async fn test_create_sends_quotas_and_defaults() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(endpoints::RG_CREATE, "42").on(endpoints::RG_GET, RG);

        let config = json!({"name": "prod", "account_id": 7, "quota_cpu": 16, "quota_ram": 32768});
        let mut d = ResourceData::new(config.as_object().cloned().unwrap());
        RgResource.create(&ctx(&mock), &mut d).await.unwrap();

        let call = mock.calls_to(endpoints::RG_CREATE).remove(0);
        assert_eq!(call.param("maxCPUCapacity"), Some("16"));
        assert_eq!(call.param("maxMemoryCapacity"), Some("32768"));
        assert_eq!(call.param("maxVDiskCapacity"), Some("-1"));
        assert_eq!(call.param("def_net"), Some("PRIVATE"));
        assert_eq!(call.param("gid"), Some("212"));
        assert_eq!(call.param("extNetId"), None);

        assert_eq!(d.id(), "42");
        assert_eq!(d.get_i64("quota_disk"), -1);
        assert_eq!(d.get("computes"), Some(&json!([9001])));
    }

    #[tokio::test]
    async fn test_update_sends_only_changes() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(endpoints::RG_UPDATE, "true").on(endpoints::RG_GET, RG);

        let state = ResourceState::new("42", "resgroup")
            .with_attribute("name", json!("prod"))
            .with_attribute("quota_cpu", json!(8))
            .with_attribute("quota_ram", json!(32768));
        let config = json!({"name": "prod", "quota_cpu": 16, "quota_ram": 32768});
        let mut d = ResourceData::from_state(&state, config.as_object().cloned().unwrap());
        RgResource.update(&ctx(&mock), &mut d).await.unwrap();

        let call = mock.calls_to(endpoints::RG_UPDATE).remove(0);
        assert_eq!(call.param("maxCPUCapacity"), Some("16"));
        assert!(!call.params.contains("maxMemoryCapacity"));
        assert!(!call.params.contains("name"));
    }

    #[tokio::test]
    async fn test_update_without_changes_makes_no_call() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(endpoints::RG_GET, RG);

        let state = ResourceState::new("42", "resgroup").with_attribute("name", json!("prod"));
        let config = json!({"name": "prod"});
        let mut d = ResourceData::from_state(&state, config.as_object().cloned().unwrap());
        RgResource.update(&ctx(&mock), &mut d).await.unwrap();
        assert_eq!(mock.endpoints(), vec![endpoints::RG_GET]);
    }
}
