//! Projection of Platform records into state bags
//!
//! Each `flatten_*` writes the schema key names of its kind. The bag id is the
//! decimal entity id. Keys only the operator supplies (`ssh_keys`, and
//! `description` when the Platform reports none) are left untouched.

use gridform_cloud::ResourceData;
use gridform_platform::{
    ComputeRecord, DiskRecord, InterfaceRecord, PfwRuleRecord, RgRecord, VinsRecord,
};
use serde_json::{Value, json};

fn set_description(d: &mut ResourceData, description: &str) {
    if !description.is_empty() {
        d.set("description", description);
    }
}

/// Declarative view of an interface
fn network_entry(iface: &InterfaceRecord) -> Value {
    json!({
        "net_type": iface.net_type,
        "net_id": iface.net_id,
        "ip_address": iface.ip_address,
        "mac": iface.mac,
    })
}

/// Full computed view of an interface
fn interface_entry(iface: &InterfaceRecord) -> Value {
    json!({
        "name": iface.name,
        "net_type": iface.net_type,
        "net_id": iface.net_id,
        "ip_address": iface.ip_address,
        "netmask": iface.net_mask,
        "default_gw": iface.def_gw,
        "mac": iface.mac,
        "conn_id": iface.conn_id,
        "conn_type": iface.conn_type,
    })
}

fn attached_disk_entry(disk: &DiskRecord) -> Value {
    json!({
        "disk_id": disk.id,
        "name": disk.name,
        "kind": disk.kind().as_str(),
        "size": disk.size_max,
        "sep_id": disk.sep_id,
        "pool": disk.pool,
        "status": disk.status,
    })
}

pub fn flatten_compute(record: &ComputeRecord, d: &mut ResourceData) {
    d.set_id(record.id.to_string());
    d.set("compute_id", record.id);
    d.set("name", record.name.as_str());
    d.set("rg_id", record.rg_id);
    d.set("rg_name", record.rg_name.as_str());
    d.set("account_id", record.account_id);
    d.set("account_name", record.account_name.as_str());
    d.set("arch", record.arch.as_str());
    d.set("cpu", record.cpus);
    d.set("ram", record.ram);
    d.set("image_id", record.image_id);
    d.set("image_name", record.image_name.as_str());
    set_description(d, &record.description);
    d.set("status", record.status.as_str());
    d.set("tech_status", record.tech_status.as_str());

    if let Some(boot) = record.boot_disk() {
        d.set("boot_disk_id", boot.id);
        d.set("boot_disk_size", boot.size_max);
    }

    let extra: Vec<Value> = record.data_disks().map(|disk| json!(disk.id)).collect();
    d.set("extra_disks", extra);
    let disks: Vec<Value> = record.disks.iter().map(attached_disk_entry).collect();
    d.set("disks", disks);

    let network: Vec<Value> = record.interfaces.iter().map(network_entry).collect();
    d.set("network", network);
    let interfaces: Vec<Value> = record.interfaces.iter().map(interface_entry).collect();
    d.set("interfaces", interfaces);

    let logins: Vec<Value> = record
        .guest_logins
        .iter()
        .map(|l| json!({"guid": l.guid, "login": l.login, "password": l.password}))
        .collect();
    d.set("guest_logins", logins);
}

pub fn flatten_disk(record: &DiskRecord, d: &mut ResourceData) {
    d.set_id(record.id.to_string());
    d.set("disk_id", record.id);
    d.set("name", record.name.as_str());
    d.set("account_id", record.account_id);
    d.set("account_name", record.account_name.as_str());
    d.set("gid", record.gid);
    d.set("size", record.size_max);
    d.set("type", record.kind().as_str());
    d.set("image_id", record.image_id);
    d.set("sep_id", record.sep_id);
    d.set("sep_type", record.sep_type.as_str());
    d.set("pool", record.pool.as_str());
    set_description(d, &record.description);
    d.set("compute_id", record.attached_compute());
    d.set("status", record.status.as_str());
    d.set("tech_status", record.tech_status.as_str());
}

/// A ViNS declared with `ext_net_id = 0` stays 0 once connected, since the
/// Platform reports the concrete default network id instead.
pub fn flatten_vins(record: &VinsRecord, d: &mut ResourceData) {
    let observed_ext = record.ext_net_id();
    let declared_default = d.config().get("ext_net_id").and_then(Value::as_i64) == Some(0);
    let ext_net_id = if declared_default && observed_ext >= 0 {
        0
    } else {
        observed_ext
    };

    d.set_id(record.id.to_string());
    d.set("vins_id", record.id);
    d.set("name", record.name.as_str());
    d.set("account_id", record.account_id);
    d.set("account_name", record.account_name.as_str());
    d.set("rg_id", record.rg_id);
    d.set("rg_name", record.rg_name.as_str());
    d.set("ipcidr", record.network.as_str());
    d.set("ext_net_id", ext_net_id);
    d.set("ext_ip_addr", record.ext_ip_addr());
    set_description(d, &record.description);
    d.set("status", record.status.as_str());
}

pub fn flatten_rg(record: &RgRecord, d: &mut ResourceData) {
    d.set_id(record.id.to_string());
    d.set("rg_id", record.id);
    d.set("name", record.name.as_str());
    d.set("account_id", record.account_id);
    d.set("account_name", record.account_name.as_str());
    d.set("gid", record.gid);
    set_description(d, &record.description);
    d.set("quota_cpu", record.resource_limits.cpu);
    d.set("quota_ram", record.resource_limits.ram);
    d.set("quota_disk", record.resource_limits.disk);
    d.set("quota_ext_ips", record.resource_limits.ext_ips);
    if !record.def_net_type.is_empty() {
        d.set("def_net_type", record.def_net_type.as_str());
    }
    d.set("def_net_id", record.def_net_id);
    d.set("vins", record.vins.clone());
    d.set("computes", record.vms.clone());
    d.set("status", record.status.as_str());
}

pub fn flatten_pfw(compute_id: u64, rules: &[PfwRuleRecord], d: &mut ResourceData) {
    d.set_id(compute_id.to_string());
    d.set("compute_id", compute_id);
    let rules: Vec<Value> = rules
        .iter()
        .map(|r| {
            json!({
                "rule_id": r.id,
                "public_port_start": r.public_port_start,
                "public_port_end": r.public_port_end,
                "local_port": r.local_port,
                "proto": r.protocol,
                "local_ip": r.local_ip,
            })
        })
        .collect();
    d.set("rules", rules);
}
