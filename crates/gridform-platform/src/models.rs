//! Platform response records and decoders
//!
//! Decoding ignores fields it does not know about, so Platform upgrades that
//! add fields keep working. Only entity ids are mandatory.

use crate::error::{PlatformError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model status of an entity that no longer exists
pub const STATUS_DESTROYED: &str = "DESTROYED";

/// Whether a response body carries no record at all
pub fn is_absent(body: &str) -> bool {
    matches!(body.trim(), "" | "null" | "{}")
}

/// Decode a response body into a record
pub fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|source| PlatformError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Decode a list endpoint. An absent body is an empty list.
pub fn decode_list<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<Vec<T>> {
    if is_absent(body) {
        return Ok(Vec::new());
    }
    decode(endpoint, body)
}

/// Decode the numeric id returned by create endpoints, bare (`9001`) or
/// quoted (`"9001"`)
pub fn decode_id(endpoint: &str, body: &str) -> Result<u64> {
    let trimmed = body.trim().trim_matches('"');
    trimmed.parse::<u64>().map_err(|_| PlatformError::Unexpected {
        endpoint: endpoint.to_string(),
        message: format!("expected a numeric id, got '{}'", body.trim()),
    })
}

/// Kind of a disk as reported by the Platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskKind {
    Boot,
    Data,
    Tmp,
    Other,
}

impl DiskKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "B" => DiskKind::Boot,
            "D" => DiskKind::Data,
            "T" => DiskKind::Tmp,
            _ => DiskKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiskKind::Boot => "boot",
            DiskKind::Data => "data",
            DiskKind::Tmp => "tmp",
            DiskKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub account_id: u64,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub gid: u64,
    #[serde(default)]
    pub size_max: u64,
    #[serde(default, rename = "type")]
    pub disk_type: String,
    #[serde(default)]
    pub image_id: u64,
    #[serde(default)]
    pub sep_id: u64,
    #[serde(default)]
    pub sep_type: String,
    #[serde(default)]
    pub pool: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tech_status: String,
    /// Attached computes, keyed by compute id
    #[serde(default)]
    pub computes: BTreeMap<String, String>,
}

impl DiskRecord {
    pub fn kind(&self) -> DiskKind {
        DiskKind::from_code(&self.disk_type)
    }

    /// Compute the disk is attached to, 0 when unattached
    pub fn attached_compute(&self) -> u64 {
        self.computes
            .keys()
            .find_map(|k| k.parse::<u64>().ok())
            .unwrap_or(0)
    }

    pub fn is_destroyed(&self) -> bool {
        self.status == STATUS_DESTROYED
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub net_type: String,
    #[serde(default)]
    pub net_id: i64,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub net_mask: u32,
    #[serde(default)]
    pub def_gw: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub conn_id: u64,
    #[serde(default)]
    pub conn_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestLogin {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rg_id: u64,
    #[serde(default)]
    pub rg_name: String,
    #[serde(default)]
    pub account_id: u64,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub cpus: u64,
    #[serde(default)]
    pub ram: u64,
    #[serde(default)]
    pub image_id: u64,
    #[serde(default)]
    pub image_name: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tech_status: String,
    #[serde(default)]
    pub disks: Vec<DiskRecord>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceRecord>,
    #[serde(default, rename = "osUsers")]
    pub guest_logins: Vec<GuestLogin>,
}

impl ComputeRecord {
    pub fn boot_disk(&self) -> Option<&DiskRecord> {
        self.disks.iter().find(|d| d.kind() == DiskKind::Boot)
    }

    /// Data disks in server order
    pub fn data_disks(&self) -> impl Iterator<Item = &DiskRecord> {
        self.disks.iter().filter(|d| d.kind() == DiskKind::Data)
    }
}

/// Entry of `rg/listComputes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RgComputeEntry {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tech_status: String,
    #[serde(default)]
    pub rg_id: u64,
    #[serde(default)]
    pub account_id: u64,
}

/// Gateway VNF configuration inside a ViNS record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub ext_net_id: i64,
    #[serde(default)]
    pub ext_net_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayVnf {
    #[serde(default)]
    pub config: GatewayConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VinsVnfs {
    #[serde(default, rename = "GW")]
    pub gw: Option<GatewayVnf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VinsRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub account_id: u64,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub rg_id: u64,
    #[serde(default)]
    pub rg_name: String,
    #[serde(default)]
    pub gid: u64,
    /// IP CIDR of the ViNS
    #[serde(default)]
    pub network: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub vnfs: VinsVnfs,
}

impl VinsRecord {
    /// External network id, -1 when the ViNS is isolated
    pub fn ext_net_id(&self) -> i64 {
        match &self.vnfs.gw {
            Some(gw) if gw.config.ext_net_id >= 0 && !gw.config.ext_net_ip.is_empty() => {
                gw.config.ext_net_id
            }
            _ => -1,
        }
    }

    /// External address, empty when the ViNS is isolated
    pub fn ext_ip_addr(&self) -> &str {
        match &self.vnfs.gw {
            Some(gw) => gw.config.ext_net_ip.as_str(),
            None => "",
        }
    }
}

/// Entry of `vins/search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VinsSearchEntry {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub account_id: u64,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub rg_id: u64,
    #[serde(default)]
    pub rg_name: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default = "unlimited", rename = "CU_C")]
    pub cpu: i64,
    #[serde(default = "unlimited", rename = "CU_M")]
    pub ram: i64,
    #[serde(default = "unlimited", rename = "CU_D")]
    pub disk: i64,
    #[serde(default = "unlimited", rename = "CU_I")]
    pub ext_ips: i64,
}

fn unlimited() -> i64 {
    -1
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu: -1,
            ram: -1,
            disk: -1,
            ext_ips: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RgRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub account_id: u64,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub gid: u64,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub def_net_type: String,
    #[serde(default)]
    pub def_net_id: i64,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
    #[serde(default)]
    pub vins: Vec<u64>,
    #[serde(default)]
    pub vms: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationEntry {
    pub gid: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location_code: String,
}

/// Port-forwarding rule as listed by `compute/pfwList`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfwRuleRecord {
    pub id: u64,
    #[serde(default)]
    pub public_port_start: u32,
    #[serde(default)]
    pub public_port_end: u32,
    #[serde(default)]
    pub local_port: u32,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub local_ip: String,
    #[serde(default)]
    pub vm_id: u64,
}
