//! Presence resolution
//!
//! Locates the Platform entity a bag refers to, first by id and otherwise by
//! name within a scope. Resolution never mutates the bag. The result is the
//! raw detail body, or `None` when the entity does not exist.
//!
//! Name lookups skip DESTROYED entries. When several live entries share the
//! name, the first in server order wins and a warning names every candidate.

use crate::context::ProviderContext;
use crate::error::{ProviderError, Result};
use crate::resource::numeric_id;
use gridform_cloud::ResourceData;
use gridform_platform::models::{STATUS_DESTROYED, decode_list, is_absent};
use gridform_platform::{
    AccountEntry, DiskRecord, Params, RgComputeEntry, RgRecord, VinsSearchEntry, endpoints,
};
use tracing::{debug, warn};

/// Fetch a detail endpoint, mapping not-found to `None`
async fn get_by_id(
    ctx: &ProviderContext,
    endpoint: &str,
    id_key: &str,
    id: u64,
) -> Result<Option<String>> {
    match ctx.post(endpoint, &Params::new().with(id_key, id)).await {
        Ok(body) if is_absent(&body) => Ok(None),
        Ok(body) => Ok(Some(body)),
        Err(ProviderError::Platform(e)) if e.is_not_found() => {
            debug!(endpoint, id, "Entity not found");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Whether a detail body describes a DESTROYED entity
fn is_destroyed(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("status").and_then(|s| s.as_str().map(|s| s == STATUS_DESTROYED)))
        .unwrap_or(false)
}

/// Id to look up: the declared id key, else the id persisted in the bag
fn lookup_id(d: &ResourceData, id_key: &str) -> u64 {
    match d.get_ok(id_key).and_then(|v| v.as_u64()) {
        Some(id) => id,
        None => numeric_id(d),
    }
}

/// Pick the first match, warning when the name is ambiguous
fn first_match(kind: &str, name: &str, ids: &[u64]) -> Option<u64> {
    if ids.len() > 1 {
        warn!(
            kind,
            name,
            candidates = ?ids,
            "Several live entities share this name; using the first. Reference it by id to be explicit"
        );
    }
    ids.first().copied()
}

async fn get_live(
    ctx: &ProviderContext,
    endpoint: &str,
    id_key: &str,
    id: u64,
) -> Result<Option<String>> {
    match get_by_id(ctx, endpoint, id_key, id).await? {
        Some(body) if is_destroyed(&body) => {
            debug!(endpoint, id, "Entity is DESTROYED, treating as absent");
            Ok(None)
        }
        other => Ok(other),
    }
}

/// Account id from `account_id`, or by name through `accounts/list`
pub async fn resolve_account_id(ctx: &ProviderContext, d: &ResourceData) -> Result<Option<u64>> {
    let id = d.get_u64("account_id");
    if id > 0 {
        return Ok(Some(id));
    }
    let name = d.get_str("account_name");
    if name.is_empty() {
        return Ok(None);
    }

    let body = ctx
        .post(endpoints::ACCOUNTS_LIST, &Params::new())
        .await?;
    let accounts: Vec<AccountEntry> = decode_list(endpoints::ACCOUNTS_LIST, &body)?;
    let ids: Vec<u64> = accounts
        .iter()
        .filter(|a| a.name == name && a.status != STATUS_DESTROYED)
        .map(|a| a.id)
        .collect();
    match first_match("account", name, &ids) {
        Some(id) => Ok(Some(id)),
        None => Err(ProviderError::validation(format!(
            "account '{}' not found",
            name
        ))),
    }
}

pub async fn resolve_compute(ctx: &ProviderContext, d: &ResourceData) -> Result<Option<String>> {
    let id = lookup_id(d, "compute_id");
    if id > 0 {
        return get_live(ctx, endpoints::COMPUTE_GET, "computeId", id).await;
    }

    let name = d.get_str("name");
    let rg_id = d.get_u64("rg_id");
    if name.is_empty() || rg_id == 0 {
        return Err(ProviderError::validation(
            "cannot locate compute without id or (name, rg_id)",
        ));
    }

    let params = Params::new().with("rgId", rg_id);
    let body = ctx.post(endpoints::RG_LIST_COMPUTES, &params).await?;
    let entries: Vec<RgComputeEntry> = decode_list(endpoints::RG_LIST_COMPUTES, &body)?;
    let ids: Vec<u64> = entries
        .iter()
        .filter(|e| e.name == name && e.status != STATUS_DESTROYED)
        .map(|e| e.id)
        .collect();

    match first_match("compute", name, &ids) {
        Some(id) => get_live(ctx, endpoints::COMPUTE_GET, "computeId", id).await,
        None => {
            debug!(name, rg_id, "No live compute with this name");
            Ok(None)
        }
    }
}

pub async fn resolve_disk(ctx: &ProviderContext, d: &ResourceData) -> Result<Option<String>> {
    let id = lookup_id(d, "disk_id");
    if id > 0 {
        return get_live(ctx, endpoints::DISKS_GET, "diskId", id).await;
    }

    let name = d.get_str("name");
    let account_id = resolve_account_id(ctx, d).await?;
    let account_id = match account_id {
        Some(id) if !name.is_empty() => id,
        _ => {
            return Err(ProviderError::validation(
                "cannot locate disk without id or (name, account)",
            ));
        }
    };

    let params = Params::new().with("accountId", account_id);
    let body = ctx.post(endpoints::DISKS_LIST, &params).await?;
    let disks: Vec<DiskRecord> = decode_list(endpoints::DISKS_LIST, &body)?;
    let ids: Vec<u64> = disks
        .iter()
        .filter(|disk| disk.name == name && !disk.is_destroyed())
        .map(|disk| disk.id)
        .collect();

    match first_match("disk", name, &ids) {
        Some(id) => get_live(ctx, endpoints::DISKS_GET, "diskId", id).await,
        None => Ok(None),
    }
}

/// ViNS lookup by name accepts only entries in exactly the requested scope;
/// an unset scope id is not compared.
pub async fn resolve_vins(ctx: &ProviderContext, d: &ResourceData) -> Result<Option<String>> {
    let id = lookup_id(d, "vins_id");
    if id > 0 {
        return get_live(ctx, endpoints::VINS_GET, "vinsId", id).await;
    }

    let name = d.get_str("name");
    let rg_id = d.get_u64("rg_id");
    let account_id = resolve_account_id(ctx, d).await?.unwrap_or(0);
    if name.is_empty() || (rg_id == 0 && account_id == 0) {
        return Err(ProviderError::validation(
            "cannot locate ViNS without id or (name, rg_id or account)",
        ));
    }

    let entries = search_vins(ctx, Some(name), account_id, rg_id).await?;
    let ids: Vec<u64> = entries
        .iter()
        .filter(|e| e.name == name)
        .map(|e| e.id)
        .collect();

    match first_match("vins", name, &ids) {
        Some(id) => get_live(ctx, endpoints::VINS_GET, "vinsId", id).await,
        None => Ok(None),
    }
}

/// Live ViNSes in a scope, optionally filtered by name on the Platform side
pub async fn search_vins(
    ctx: &ProviderContext,
    name: Option<&str>,
    account_id: u64,
    rg_id: u64,
) -> Result<Vec<VinsSearchEntry>> {
    let mut params = Params::new();
    params.set_opt("name", name);
    params.set_opt("accountId", (account_id > 0).then_some(account_id));
    params.set_opt("rgId", (rg_id > 0).then_some(rg_id));

    let body = ctx.post(endpoints::VINS_SEARCH, &params).await?;
    let entries: Vec<VinsSearchEntry> = decode_list(endpoints::VINS_SEARCH, &body)?;
    Ok(entries
        .into_iter()
        .filter(|e| e.status != STATUS_DESTROYED)
        .filter(|e| account_id == 0 || e.account_id == account_id)
        .filter(|e| rg_id == 0 || e.rg_id == rg_id)
        .collect())
}

pub async fn resolve_rg(ctx: &ProviderContext, d: &ResourceData) -> Result<Option<String>> {
    let id = lookup_id(d, "rg_id");
    if id > 0 {
        return get_live(ctx, endpoints::RG_GET, "rgId", id).await;
    }

    let name = d.get_str("name");
    let account_id = match resolve_account_id(ctx, d).await? {
        Some(id) if !name.is_empty() => id,
        _ => {
            return Err(ProviderError::validation(
                "cannot locate resource group without id or (name, account)",
            ));
        }
    };

    let body = ctx.post(endpoints::RG_LIST, &Params::new()).await?;
    let groups: Vec<RgRecord> = decode_list(endpoints::RG_LIST, &body)?;
    let ids: Vec<u64> = groups
        .iter()
        .filter(|rg| rg.name == name && rg.account_id == account_id)
        .filter(|rg| rg.status != STATUS_DESTROYED)
        .map(|rg| rg.id)
        .collect();

    match first_match("resgroup", name, &ids) {
        Some(id) => get_live(ctx, endpoints::RG_GET, "rgId", id).await,
        None => Ok(None),
    }
}

/// `true` when the error is the Platform reporting a missing entity
pub(crate) fn is_not_found(err: &ProviderError) -> bool {
    matches!(err, ProviderError::Platform(e) if e.is_not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridform_cloud::{Attributes, ResourceState};
    use gridform_platform::mock::{MockPlatform, MockReply};
    use serde_json::json;
    use std::sync::Arc;

    fn ctx(mock: &Arc<MockPlatform>) -> ProviderContext {
        ProviderContext::new(mock.clone(), 212)
    }

    fn bag(config: serde_json::Value) -> ResourceData {
        ResourceData::new(config.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_compute_by_id_not_found_is_absent() {
        let mock = Arc::new(MockPlatform::new());
        mock.on_reply(endpoints::COMPUTE_GET, MockReply::NotFound);

        let d = bag(json!({"compute_id": 9001}));
        assert!(resolve_compute(&ctx(&mock), &d).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compute_by_id_transport_error_propagates() {
        let mock = Arc::new(MockPlatform::new());
        mock.on_reply(endpoints::COMPUTE_GET, MockReply::fail(500, "boom"));

        let d = bag(json!({"compute_id": 9001}));
        assert!(resolve_compute(&ctx(&mock), &d).await.is_err());
    }

    #[tokio::test]
    async fn test_compute_by_persisted_id() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(endpoints::COMPUTE_GET, r#"{"id": 9001, "status": "ENABLED"}"#);

        let state = ResourceState::new("9001", "compute");
        let d = ResourceData::from_state(&state, Attributes::new());
        assert!(resolve_compute(&ctx(&mock), &d).await.unwrap().is_some());
        assert_eq!(mock.calls()[0].param("computeId"), Some("9001"));
    }

    #[tokio::test]
    async fn test_compute_by_name_skips_destroyed() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(
            endpoints::RG_LIST_COMPUTES,
            r#"[{"id": 1, "name": "web-1", "status": "DESTROYED"},
                {"id": 2, "name": "Web-1", "status": "ENABLED"},
                {"id": 3, "name": "web-1", "status": "ENABLED"},
                {"id": 4, "name": "web-1", "status": "ENABLED"}]"#,
        )
        .on(endpoints::COMPUTE_GET, r#"{"id": 3, "name": "web-1", "status": "ENABLED"}"#);

        let d = bag(json!({"name": "web-1", "rg_id": 42}));
        let body = resolve_compute(&ctx(&mock), &d).await.unwrap().unwrap();
        assert!(body.contains("\"id\": 3"));
        assert_eq!(mock.calls_to(endpoints::COMPUTE_GET)[0].param("computeId"), Some("3"));
    }

    #[tokio::test]
    async fn test_compute_by_name_only_destroyed_is_absent() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(
            endpoints::RG_LIST_COMPUTES,
            r#"[{"id": 1, "name": "web-1", "status": "DESTROYED"}]"#,
        );

        let d = bag(json!({"name": "web-1", "rg_id": 42}));
        assert!(resolve_compute(&ctx(&mock), &d).await.unwrap().is_none());
        assert!(mock.calls_to(endpoints::COMPUTE_GET).is_empty());
    }

    #[tokio::test]
    async fn test_compute_without_locator_is_error() {
        let mock = Arc::new(MockPlatform::new());
        let d = bag(json!({"name": "web-1"}));
        let err = resolve_compute(&ctx(&mock), &d).await.unwrap_err();
        assert!(err.to_string().contains("cannot locate compute"));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_vins_scope_exclusivity() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(
            endpoints::VINS_SEARCH,
            r#"[{"id": 10, "name": "net", "accountId": 7, "rgId": 0, "status": "ENABLED"},
                {"id": 11, "name": "net", "accountId": 7, "rgId": 99, "status": "ENABLED"},
                {"id": 12, "name": "net", "accountId": 7, "rgId": 42, "status": "ENABLED"}]"#,
        )
        .on(endpoints::VINS_GET, r#"{"id": 12, "name": "net", "rgId": 42}"#);

        let d = bag(json!({"name": "net", "rg_id": 42}));
        resolve_vins(&ctx(&mock), &d).await.unwrap().unwrap();
        assert_eq!(mock.calls_to(endpoints::VINS_GET)[0].param("vinsId"), Some("12"));
        assert_eq!(mock.calls_to(endpoints::VINS_SEARCH)[0].param("rgId"), Some("42"));
    }

    #[tokio::test]
    async fn test_vins_wrong_scope_is_absent() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(
            endpoints::VINS_SEARCH,
            r#"[{"id": 11, "name": "net", "accountId": 8, "rgId": 0, "status": "ENABLED"}]"#,
        );

        let d = bag(json!({"name": "net", "account_id": 7}));
        assert!(resolve_vins(&ctx(&mock), &d).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_by_account_name() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(
            endpoints::ACCOUNTS_LIST,
            r#"[{"id": 7, "name": "acme", "status": "CONFIRMED"}]"#,
        )
        .on(
            endpoints::DISKS_LIST,
            r#"[{"id": 100, "name": "data", "status": "DESTROYED"},
                {"id": 101, "name": "data", "status": "CREATED"}]"#,
        )
        .on(endpoints::DISKS_GET, r#"{"id": 101, "name": "data"}"#);

        let d = bag(json!({"name": "data", "account_name": "acme"}));
        resolve_disk(&ctx(&mock), &d).await.unwrap().unwrap();
        assert_eq!(mock.calls_to(endpoints::DISKS_LIST)[0].param("accountId"), Some("7"));
        assert_eq!(mock.calls_to(endpoints::DISKS_GET)[0].param("diskId"), Some("101"));
    }
}
