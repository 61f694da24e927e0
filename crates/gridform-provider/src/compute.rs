//! Compute reconciler
//!
//! Create is not atomic. The bare compute is created first and its id kept;
//! extra disks and networks follow as best-effort steps. Steps that fail
//! leave their keys pending in the persisted state so the next update picks
//! them up.
//!
//! Update runs in a fixed order, each phase calling the Platform only when
//! its keys changed:
//!
//! ```text
//! immutables ─► resize ─► rename ─► boot disk grow ─► extra disks ─► networks ─► read
//!   (reject)      (abort on failure)                   (best effort, independent)
//! ```
//!
//! `compute/resize` is issued against the compute in whatever power state it
//! is in; the Platform rejects the call when the change needs the compute
//! stopped and that error is returned unchanged.

use crate::context::ProviderContext;
use crate::error::{ProviderError, Result};
use crate::flatten::flatten_compute;
use crate::resolver::resolve_compute;
use crate::resource::{Resource, numeric_id, sync_unchanged};
use crate::schema::compute_schema;
use crate::userdata::{self, SshKey};
use async_trait::async_trait;
use gridform_cloud::{BestEffort, ListDelta, ResourceData, Schema};
use gridform_platform::models::{decode, decode_id};
use gridform_platform::{ComputeRecord, Params, endpoints};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Keys consumed by the bare create call
const CREATE_KEYS: [&str; 9] = [
    "name",
    "rg_id",
    "arch",
    "description",
    "cpu",
    "ram",
    "image_id",
    "boot_disk_size",
    "ssh_keys",
];

const IMMUTABLE_KEYS: [&str; 3] = ["arch", "image_id", "rg_id"];

/// One `network` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub net_type: String,
    pub net_id: i64,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub mac: String,
}

impl NetworkSpec {
    /// Whether an observed interface satisfies a declared one. A declared
    /// address must match; an undeclared one matches any.
    pub fn satisfied_by(&self, observed: &NetworkSpec) -> bool {
        self.net_type == observed.net_type
            && self.net_id == observed.net_id
            && (self.ip_address.is_empty() || self.ip_address == observed.ip_address)
    }
}

impl fmt::Display for NetworkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.net_type, self.net_id)?;
        if !self.ip_address.is_empty() {
            write!(f, "@{}", self.ip_address)?;
        }
        Ok(())
    }
}

/// Plan a network delta. Elements are matched on `(net_type, net_id)` plus
/// the declared address, if any.
pub fn plan_networks(old: &[NetworkSpec], new: &[NetworkSpec]) -> ListDelta<NetworkSpec> {
    ListDelta::plan_by(old, new, |o, n| n.satisfied_by(o))
}

pub struct ComputeResource;

fn create_endpoint(arch: &str) -> Result<&'static str> {
    match arch {
        "KVM_X86" => Ok(endpoints::COMPUTE_CREATE_X86),
        "KVM_PPC" => Ok(endpoints::COMPUTE_CREATE_PPC),
        other => Err(ProviderError::validation(format!(
            "unsupported arch '{}', expected KVM_X86 or KVM_PPC",
            other
        ))),
    }
}

/// Detach then attach extra disks
async fn apply_disk_delta(
    ctx: &ProviderContext,
    compute_id: u64,
    delta: &ListDelta<u64>,
) -> Result<()> {
    let mut run = BestEffort::new("extra_disks");
    for disk_id in &delta.detach {
        let params = Params::new()
            .with("computeId", compute_id)
            .with("diskId", disk_id);
        let result = ctx.post(endpoints::COMPUTE_DISK_DETACH, &params).await;
        if run.record(disk_id, result.map(|_| ())) {
            info!(compute_id, disk_id, "Detached disk");
        }
    }
    for disk_id in &delta.attach {
        let params = Params::new()
            .with("computeId", compute_id)
            .with("diskId", disk_id);
        let result = ctx.post(endpoints::COMPUTE_DISK_ATTACH, &params).await;
        if run.record(disk_id, result.map(|_| ())) {
            info!(compute_id, disk_id, "Attached disk");
        }
    }
    run.finish()
}

/// Detach then attach network interfaces
async fn apply_network_delta(
    ctx: &ProviderContext,
    compute_id: u64,
    delta: &ListDelta<NetworkSpec>,
) -> Result<()> {
    let mut run = BestEffort::new("network");
    for net in &delta.detach {
        let params = Params::new()
            .with("computeId", compute_id)
            .with("ipAddr", &net.ip_address)
            .with("mac", &net.mac);
        let result = ctx.post(endpoints::COMPUTE_NET_DETACH, &params).await;
        if run.record(net, result.map(|_| ())) {
            info!(compute_id, network = %net, "Detached network");
        }
    }
    for net in &delta.attach {
        let mut params = Params::new()
            .with("computeId", compute_id)
            .with("netType", &net.net_type)
            .with("netId", net.net_id);
        params.set_opt(
            "ipAddr",
            Some(net.ip_address.as_str()).filter(|ip| !ip.is_empty()),
        );
        let result = ctx.post(endpoints::COMPUTE_NET_ATTACH, &params).await;
        if run.record(net, result.map(|_| ())) {
            info!(compute_id, network = %net, "Attached network");
        }
    }
    run.finish()
}

/// Keep the later of two outcomes' errors
fn last_error(errors: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    errors
        .into_iter()
        .fold(Ok(()), |acc, r| if r.is_err() { r } else { acc })
}

impl ComputeResource {
    fn compute_id(d: &ResourceData) -> Result<u64> {
        match numeric_id(d) {
            0 => Err(ProviderError::validation("compute has no id")),
            id => Ok(id),
        }
    }

    async fn fetch(ctx: &ProviderContext, id: u64) -> Result<ComputeRecord> {
        let params = Params::new().with("computeId", id);
        let body = ctx.post(endpoints::COMPUTE_GET, &params).await?;
        Ok(decode(endpoints::COMPUTE_GET, &body)?)
    }

    async fn resize(ctx: &ProviderContext, d: &mut ResourceData, id: u64) -> Result<()> {
        let cpu_changed = d.has_change("cpu");
        let ram_changed = d.has_change("ram");
        if !cpu_changed && !ram_changed {
            return Ok(());
        }

        // 0 leaves a dimension unchanged
        let cpu = if cpu_changed { d.get_u64("cpu") } else { 0 };
        let ram = if ram_changed { d.get_u64("ram") } else { 0 };
        let params = Params::new()
            .with("computeId", id)
            .with("cpu", cpu)
            .with("ram", ram);
        ctx.post(endpoints::COMPUTE_RESIZE, &params).await?;
        info!(compute_id = id, cpu, ram, "Resized compute");

        d.set_partial("cpu");
        d.set_partial("ram");
        Ok(())
    }

    async fn rename(ctx: &ProviderContext, d: &mut ResourceData, id: u64) -> Result<()> {
        let name_changed = d.has_change("name");
        let desc_changed = d.has_change("description") && d.get_ok("description").is_some();
        if !name_changed && !desc_changed {
            return Ok(());
        }

        let mut params = Params::new().with("computeId", id);
        if name_changed {
            params.set("name", d.get_str("name"));
        }
        if desc_changed {
            params.set("desc", d.get_str("description"));
        }
        ctx.post(endpoints::COMPUTE_UPDATE, &params).await?;
        info!(compute_id = id, "Updated compute name/description");

        d.set_partial("name");
        d.set_partial("description");
        Ok(())
    }

    async fn grow_boot_disk(ctx: &ProviderContext, d: &mut ResourceData, id: u64) -> Result<()> {
        if !d.has_change("boot_disk_size") {
            return Ok(());
        }
        let (old, new): (u64, u64) = d.get_change_as("boot_disk_size")?;
        if new <= old {
            if new > 0 {
                warn!(
                    compute_id = id,
                    current = old,
                    requested = new,
                    "Boot disk cannot shrink; keeping current size"
                );
            }
            d.set_partial("boot_disk_size");
            return Ok(());
        }

        // Without a recorded boot disk the live one is fetched, and its size
        // bounds the request too
        let (boot_id, current) = match d.prior().get("boot_disk_id").and_then(|v| v.as_u64()) {
            Some(boot_id) if boot_id > 0 => (boot_id, old),
            _ => {
                let record = Self::fetch(ctx, id).await?;
                let disk = record
                    .boot_disk()
                    .ok_or_else(|| ProviderError::validation("compute has no boot disk"))?;
                (disk.id, disk.size_max.max(old))
            }
        };

        if new > current {
            let params = Params::new().with("diskId", boot_id).with("size", new);
            ctx.post(endpoints::DISKS_RESIZE, &params).await?;
            info!(compute_id = id, disk_id = boot_id, old = current, new, "Grew boot disk");
        } else {
            warn!(
                compute_id = id,
                current,
                requested = new,
                "Boot disk already at or above requested size"
            );
        }
        d.set_partial("boot_disk_size");
        Ok(())
    }

    async fn update_extra_disks(ctx: &ProviderContext, d: &mut ResourceData, id: u64) -> Result<()> {
        if !d.has_change("extra_disks") {
            return Ok(());
        }
        let (old, new): (Vec<u64>, Vec<u64>) = d.get_change_as("extra_disks")?;
        apply_disk_delta(ctx, id, &ListDelta::plan(&old, &new)).await?;
        d.set_partial("extra_disks");
        Ok(())
    }

    async fn update_networks(ctx: &ProviderContext, d: &mut ResourceData, id: u64) -> Result<()> {
        if !d.has_change("network") {
            return Ok(());
        }
        let (old, new): (Vec<NetworkSpec>, Vec<NetworkSpec>) = d.get_change_as("network")?;
        apply_network_delta(ctx, id, &plan_networks(&old, &new)).await?;
        d.set_partial("network");
        Ok(())
    }
}

#[async_trait]
impl Resource for ComputeResource {
    fn kind(&self) -> &'static str {
        "compute"
    }

    fn schema(&self) -> Schema {
        compute_schema()
    }

    async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        d.partial(true);

        let name = d.get_str("name").to_string();
        let rg_id = d.get_u64("rg_id");
        if name.is_empty() || rg_id == 0 {
            return Err(ProviderError::validation(
                "compute create requires name and rg_id",
            ));
        }
        let endpoint = create_endpoint(d.get_str("arch"))?;

        let mut params = Params::new()
            .with("rgId", rg_id)
            .with("name", &name)
            .with("cpu", d.get_u64("cpu"))
            .with("ram", d.get_u64("ram"))
            .with("imageId", d.get_u64("image_id"))
            .with("bootDisk", d.get_u64("boot_disk_size"))
            .with("netType", "NONE");
        params.set_opt("desc", d.get_ok("description").and_then(|v| v.as_str()));

        let keys: Vec<SshKey> = d.get_as("ssh_keys")?.unwrap_or_default();
        let encoded = userdata::encode(&keys)?;
        if !encoded.is_empty() {
            params.set("userdata", encoded);
        }

        let body = ctx.post(endpoint, &params).await?;
        let id = decode_id(endpoint, &body)?;
        d.set_id(id.to_string());
        info!(compute_id = id, name = %name, rg_id, "Created compute");
        for key in CREATE_KEYS {
            d.set_partial(key);
        }

        let disks: Vec<u64> = d.get_as("extra_disks")?.unwrap_or_default();
        let disk_result = apply_disk_delta(ctx, id, &ListDelta::plan(&[], &disks)).await;
        if disk_result.is_ok() {
            d.set_partial("extra_disks");
        }

        let networks: Vec<NetworkSpec> = d.get_as("network")?.unwrap_or_default();
        let network_result = apply_network_delta(ctx, id, &plan_networks(&[], &networks)).await;
        if network_result.is_ok() {
            d.set_partial("network");
        }

        if disk_result.is_ok() && network_result.is_ok() {
            d.partial(false);
        } else {
            warn!(compute_id = id, pending = ?d.pending(), "Compute created with pending changes");
        }

        let read = self.read(ctx, d).await;
        last_error([disk_result, network_result])?;
        read
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        match resolve_compute(ctx, d).await? {
            Some(body) => {
                let record: ComputeRecord = decode(endpoints::COMPUTE_GET, &body)?;
                flatten_compute(&record, d);
            }
            None => {
                warn!(id = d.id(), name = d.get_str("name"), "Compute no longer exists");
                d.set_id("");
            }
        }
        Ok(())
    }

    async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        for key in IMMUTABLE_KEYS {
            if d.has_change(key) {
                return Err(ProviderError::Immutable(key.to_string()));
            }
        }
        let id = Self::compute_id(d)?;

        d.partial(true);
        sync_unchanged(d);
        if d.has_change("ssh_keys") {
            warn!(compute_id = id, "ssh_keys only apply at creation; ignoring change");
            d.set_partial("ssh_keys");
        }

        Self::resize(ctx, d, id).await?;
        Self::rename(ctx, d, id).await?;
        Self::grow_boot_disk(ctx, d, id).await?;

        let disk_result = Self::update_extra_disks(ctx, d, id).await;
        let network_result = Self::update_networks(ctx, d, id).await;
        if disk_result.is_ok() && network_result.is_ok() {
            d.partial(false);
        }

        let read = self.read(ctx, d).await;
        last_error([disk_result, network_result])?;
        read
    }

    async fn delete(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let Some(body) = resolve_compute(ctx, d).await? else {
            info!(id = d.id(), "Compute already absent");
            d.set_id("");
            return Ok(());
        };

        let record: ComputeRecord = decode(endpoints::COMPUTE_GET, &body)?;
        let params = Params::new()
            .with("computeId", record.id)
            .with("permanently", true);
        ctx.post(endpoints::COMPUTE_DELETE, &params).await?;
        info!(compute_id = record.id, "Deleted compute");
        d.set_id("");
        Ok(())
    }

    async fn exists(&self, ctx: &ProviderContext, d: &ResourceData) -> Result<bool> {
        Ok(resolve_compute(ctx, d).await?.is_some())
    }
}
