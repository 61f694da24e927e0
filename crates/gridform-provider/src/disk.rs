//! Disk reconciler

use crate::context::ProviderContext;
use crate::error::{ProviderError, Result};
use crate::flatten::flatten_disk;
use crate::resolver::{resolve_account_id, resolve_disk};
use crate::resource::{Resource, numeric_id, sync_unchanged};
use crate::schema::disk_schema;
use async_trait::async_trait;
use gridform_cloud::{ResourceData, Schema};
use gridform_platform::models::{decode, decode_id};
use gridform_platform::{DiskRecord, Params, endpoints};
use tracing::{info, warn};

/// Platform code for data disks
const DATA_DISK: &str = "D";

pub struct DiskResource;

impl DiskResource {
    fn disk_id(d: &ResourceData) -> Result<u64> {
        match numeric_id(d) {
            0 => Err(ProviderError::validation("disk has no id")),
            id => Ok(id),
        }
    }
}

#[async_trait]
impl Resource for DiskResource {
    fn kind(&self) -> &'static str {
        "disk"
    }

    fn schema(&self) -> Schema {
        disk_schema()
    }

    async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        if name.is_empty() {
            return Err(ProviderError::validation("disk create requires name"));
        }
        let account_id = resolve_account_id(ctx, d).await?.ok_or_else(|| {
            ProviderError::validation("disk create requires account_id or account_name")
        })?;
        let gid = match d.get_u64("gid") {
            0 => ctx.default_grid_id(),
            gid => gid,
        };
        let size = d.get_u64("size");
        if size == 0 {
            return Err(ProviderError::validation("disk size must be at least 1 GB"));
        }

        let mut params = Params::new()
            .with("accountId", account_id)
            .with("gid", gid)
            .with("name", &name)
            .with("size", size)
            .with("type", DATA_DISK);
        params.set_opt("sep_id", d.get_ok("sep_id").and_then(|v| v.as_u64()));
        params.set_opt("pool", d.get_ok("pool").and_then(|v| v.as_str()));
        params.set_opt("desc", d.get_ok("description").and_then(|v| v.as_str()));

        let body = ctx.post(endpoints::DISKS_CREATE, &params).await?;
        let id = decode_id(endpoints::DISKS_CREATE, &body)?;
        d.set_id(id.to_string());
        info!(disk_id = id, name = %name, size, "Created disk");

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        match resolve_disk(ctx, d).await? {
            Some(body) => {
                let record: DiskRecord = decode(endpoints::DISKS_GET, &body)?;
                flatten_disk(&record, d);
            }
            None => {
                warn!(id = d.id(), name = d.get_str("name"), "Disk no longer exists");
                d.set_id("");
            }
        }
        Ok(())
    }

    async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        for key in ["sep_id", "pool"] {
            if d.has_change(key) && d.get_ok(key).is_some() {
                return Err(ProviderError::Immutable(key.to_string()));
            }
        }
        let id = Self::disk_id(d)?;
        d.partial(true);
        sync_unchanged(d);

        if d.has_change("size") {
            let (old, new): (u64, u64) = d.get_change_as("size")?;
            if new > old {
                let params = Params::new().with("diskId", id).with("size", new);
                ctx.post(endpoints::DISKS_RESIZE, &params).await?;
                info!(disk_id = id, old, new, "Grew disk");
            } else {
                warn!(disk_id = id, current = old, requested = new, "Disk cannot shrink; keeping current size");
            }
            d.set_partial("size");
        }

        if d.has_change("name") {
            let params = Params::new()
                .with("diskId", id)
                .with("name", d.get_str("name"));
            ctx.post(endpoints::DISKS_RENAME, &params).await?;
            info!(disk_id = id, name = d.get_str("name"), "Renamed disk");
            d.set_partial("name");
        }

        d.partial(false);
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let Some(body) = resolve_disk(ctx, d).await? else {
            info!(id = d.id(), "Disk already absent");
            d.set_id("");
            return Ok(());
        };

        let record: DiskRecord = decode(endpoints::DISKS_GET, &body)?;
        let params = Params::new()
            .with("diskId", record.id)
            .with("detach", true)
            .with("permanently", true);
        ctx.post(endpoints::DISKS_DELETE, &params).await?;
        info!(disk_id = record.id, "Deleted disk");
        d.set_id("");
        Ok(())
    }

    async fn exists(&self, ctx: &ProviderContext, d: &ResourceData) -> Result<bool> {
        Ok(resolve_disk(ctx, d).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridform_cloud::{Attributes, ResourceState};
    use gridform_platform::mock::{MockPlatform, MockReply};
    use serde_json::json;
    use std::sync::Arc;

    const DISK: &str = r#"{"id": 100, "name": "data", "accountId": 7, "gid": 212,
        "sizeMax": 50, "type": "D", "sepId": 1, "pool": "ssd", "status": "CREATED"}"#;

    fn ctx(mock: &Arc<MockPlatform>) -> ProviderContext {
        ProviderContext::new(mock.clone(), 212)
    }

    fn existing(config: serde_json::Value) -> ResourceData {
        let state = ResourceState::new("100", "disk")
            .with_attribute("name", json!("data"))
            .with_attribute("size", json!(50))
            .with_attribute("sep_id", json!(1))
            .with_attribute("pool", json!("ssd"));
        ResourceData::from_state(&state, config.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_create_uses_default_grid() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(endpoints::DISKS_CREATE, "100")
            .on(endpoints::DISKS_GET, DISK);

        let config = json!({"name": "data", "account_id": 7, "size": 50, "pool": "ssd"});
        let mut d = ResourceData::new(config.as_object().cloned().unwrap());
        DiskResource.create(&ctx(&mock), &mut d).await.unwrap();

        let call = mock.calls_to(endpoints::DISKS_CREATE).remove(0);
        assert_eq!(call.param("gid"), Some("212"));
        assert_eq!(call.param("type"), Some("D"));
        assert_eq!(call.param("pool"), Some("ssd"));
        assert_eq!(call.param("sep_id"), None);
        assert_eq!(d.id(), "100");
        assert_eq!(d.get_u64("size"), 50);
    }

    #[tokio::test]
    async fn test_update_grows_and_never_shrinks() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(endpoints::DISKS_RESIZE, "true")
            .on(endpoints::DISKS_GET, DISK);

        let mut d = existing(json!({"name": "data", "size": 80}));
        DiskResource.update(&ctx(&mock), &mut d).await.unwrap();
        let resize = mock.calls_to(endpoints::DISKS_RESIZE).remove(0);
        assert_eq!(resize.param("size"), Some("80"));

        mock.clear_calls();
        let mut d = existing(json!({"name": "data", "size": 20}));
        DiskResource.update(&ctx(&mock), &mut d).await.unwrap();
        assert!(mock.calls_to(endpoints::DISKS_RESIZE).is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_pool_change() {
        let mock = Arc::new(MockPlatform::new());
        let mut d = existing(json!({"name": "data", "size": 50, "pool": "hdd"}));
        let err = DiskResource.update(&ctx(&mock), &mut d).await.unwrap_err();
        assert!(matches!(err, ProviderError::Immutable(ref k) if k == "pool"));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_absent_then_again() {
        let mock = Arc::new(MockPlatform::new());
        mock.on_reply(endpoints::DISKS_GET, MockReply::NotFound)
            .on(endpoints::DISKS_LIST, "[]");

        let mut d = existing(json!({"name": "data", "account_id": 7}));
        DiskResource.delete(&ctx(&mock), &mut d).await.unwrap();
        assert_eq!(d.id(), "");

        // id cleared: falls back to the name lookup
        DiskResource.delete(&ctx(&mock), &mut d).await.unwrap();
        assert_eq!(mock.calls_to(endpoints::DISKS_LIST).len(), 1);
        assert!(mock.calls_to(endpoints::DISKS_DELETE).is_empty());
    }

    #[tokio::test]
    async fn test_delete_detaches_permanently() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(endpoints::DISKS_GET, DISK)
            .on(endpoints::DISKS_DELETE, "true");

        let mut d = ResourceData::with_id("100", Attributes::new());
        DiskResource.delete(&ctx(&mock), &mut d).await.unwrap();

        let call = mock.calls_to(endpoints::DISKS_DELETE).remove(0);
        assert_eq!(call.param("detach"), Some("true"));
        assert_eq!(call.param("permanently"), Some("true"));
        assert_eq!(d.id(), "");
    }
}
