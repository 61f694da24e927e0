//! Declared attributes per resource kind

use gridform_cloud::{Attribute, Schema, Validator, ValueType};

pub const MAX_CPUS: i64 = 128;
pub const MIN_RAM_MB: i64 = 128;
pub const MAX_EXTRA_DISKS: usize = 12;
pub const MAX_NETS: usize = 8;
pub const MAX_SSH_KEYS: usize = 12;
pub const MAX_VINS_PER_RG: usize = 4;

pub const ARCHES: &[&str] = &["KVM_X86", "KVM_PPC"];
pub const NET_TYPES: &[&str] = &["EXTNET", "VINS"];
pub const DEF_NET_TYPES: &[&str] = &["PRIVATE", "PUBLIC", "NONE"];
pub const PROTOCOLS: &[&str] = &["tcp", "udp"];

fn int() -> ValueType {
    ValueType::Int
}

fn string() -> ValueType {
    ValueType::String
}

fn list_of(inner: ValueType) -> ValueType {
    ValueType::List(Box::new(inner))
}

fn set_of(inner: ValueType) -> ValueType {
    ValueType::Set(Box::new(inner))
}

fn port() -> Validator {
    Validator::IntRange(1, 65535)
}

pub fn network_schema() -> Schema {
    Schema::new()
        .attr(
            "net_type",
            Attribute::required(string()).validate_with(Validator::OneOf(NET_TYPES)),
        )
        .attr("net_id", Attribute::required(int()))
        .attr(
            "ip_address",
            Attribute::optional_computed(string()).describe("Pin the interface address"),
        )
        .attr("mac", Attribute::computed(string()))
}

fn interface_schema() -> Schema {
    Schema::new()
        .attr("name", Attribute::computed(string()))
        .attr("net_type", Attribute::computed(string()))
        .attr("net_id", Attribute::computed(int()))
        .attr("ip_address", Attribute::computed(string()))
        .attr("netmask", Attribute::computed(int()))
        .attr("default_gw", Attribute::computed(string()))
        .attr("mac", Attribute::computed(string()))
        .attr("conn_id", Attribute::computed(int()))
        .attr("conn_type", Attribute::computed(string()))
}

fn ssh_key_schema() -> Schema {
    Schema::new()
        .attr("user", Attribute::required(string()))
        .attr("public_key", Attribute::required(string()))
        .attr("shell", Attribute::optional(string()))
}

fn attached_disk_schema() -> Schema {
    Schema::new()
        .attr("disk_id", Attribute::computed(int()))
        .attr("name", Attribute::computed(string()))
        .attr("kind", Attribute::computed(string()))
        .attr("size", Attribute::computed(int()))
        .attr("sep_id", Attribute::computed(int()))
        .attr("pool", Attribute::computed(string()))
        .attr("status", Attribute::computed(string()))
}

fn guest_login_schema() -> Schema {
    Schema::new()
        .attr("guid", Attribute::computed(string()))
        .attr("login", Attribute::computed(string()))
        .attr("password", Attribute::computed(string()).sensitive())
}

pub fn compute_schema() -> Schema {
    Schema::new()
        .attr("name", Attribute::required(string()))
        .attr("rg_id", Attribute::required(int()).force_new())
        .attr(
            "compute_id",
            Attribute::optional_computed(int()).describe("Adopt an existing compute by id"),
        )
        .attr(
            "arch",
            Attribute::required(string())
                .force_new()
                .validate_with(Validator::OneOf(ARCHES)),
        )
        .attr(
            "cpu",
            Attribute::required(int()).validate_with(Validator::IntRange(1, MAX_CPUS)),
        )
        .attr(
            "ram",
            Attribute::required(int()).validate_with(Validator::IntAtLeast(MIN_RAM_MB)),
        )
        .attr("image_id", Attribute::required(int()).force_new())
        .attr(
            "boot_disk_size",
            Attribute::optional_computed(int())
                .grow_only()
                .validate_with(Validator::IntAtLeast(1)),
        )
        .attr("description", Attribute::optional_computed(string()))
        .attr(
            "extra_disks",
            Attribute::optional(set_of(int())).max_items(MAX_EXTRA_DISKS),
        )
        .attr(
            "network",
            Attribute::optional(set_of(ValueType::Object(network_schema()))).max_items(MAX_NETS),
        )
        .attr(
            "ssh_keys",
            Attribute::optional(list_of(ValueType::Object(ssh_key_schema())))
                .max_items(MAX_SSH_KEYS)
                .describe("Users provisioned through cloud-init at creation"),
        )
        .attr("account_id", Attribute::computed(int()))
        .attr("account_name", Attribute::computed(string()))
        .attr("rg_name", Attribute::computed(string()))
        .attr("image_name", Attribute::computed(string()))
        .attr("boot_disk_id", Attribute::computed(int()))
        .attr(
            "disks",
            Attribute::computed(list_of(ValueType::Object(attached_disk_schema()))),
        )
        .attr(
            "interfaces",
            Attribute::computed(list_of(ValueType::Object(interface_schema()))),
        )
        .attr(
            "guest_logins",
            Attribute::computed(list_of(ValueType::Object(guest_login_schema()))).sensitive(),
        )
        .attr("status", Attribute::computed(string()))
        .attr("tech_status", Attribute::computed(string()))
}

pub fn disk_schema() -> Schema {
    Schema::new()
        .attr("name", Attribute::required(string()))
        .attr("disk_id", Attribute::optional_computed(int()))
        .attr("account_id", Attribute::optional_computed(int()).force_new())
        .attr("account_name", Attribute::optional_computed(string()))
        .attr("gid", Attribute::optional_computed(int()).force_new())
        .attr(
            "size",
            Attribute::required(int())
                .grow_only()
                .validate_with(Validator::IntAtLeast(1)),
        )
        .attr("sep_id", Attribute::optional_computed(int()).force_new())
        .attr("pool", Attribute::optional_computed(string()).force_new())
        .attr("description", Attribute::optional_computed(string()))
        .attr("type", Attribute::computed(string()))
        .attr("image_id", Attribute::computed(int()))
        .attr("sep_type", Attribute::computed(string()))
        .attr("compute_id", Attribute::computed(int()))
        .attr("status", Attribute::computed(string()))
        .attr("tech_status", Attribute::computed(string()))
}

pub fn vins_schema() -> Schema {
    Schema::new()
        .attr("name", Attribute::required(string()).force_new())
        .attr("vins_id", Attribute::optional_computed(int()))
        .attr("rg_id", Attribute::optional_computed(int()).force_new())
        .attr("account_id", Attribute::optional_computed(int()).force_new())
        .attr("account_name", Attribute::optional_computed(string()))
        .attr("ipcidr", Attribute::optional_computed(string()).force_new())
        .attr(
            "ext_net_id",
            Attribute::optional(int())
                .default(-1)
                .describe("-1 isolated, 0 default external network, >0 a specific one"),
        )
        .attr("description", Attribute::optional_computed(string()).force_new())
        .attr("rg_name", Attribute::computed(string()))
        .attr("ext_ip_addr", Attribute::computed(string()))
        .attr("status", Attribute::computed(string()))
}

pub fn rg_schema() -> Schema {
    let quota = || {
        Attribute::optional(int())
            .default(-1)
            .validate_with(Validator::IntAtLeast(-1))
    };
    Schema::new()
        .attr("name", Attribute::required(string()))
        .attr("rg_id", Attribute::optional_computed(int()))
        .attr("account_id", Attribute::optional_computed(int()).force_new())
        .attr("account_name", Attribute::optional_computed(string()))
        .attr("gid", Attribute::optional_computed(int()).force_new())
        .attr("description", Attribute::optional_computed(string()))
        .attr("quota_cpu", quota())
        .attr("quota_ram", quota())
        .attr("quota_disk", quota())
        .attr("quota_ext_ips", quota())
        .attr(
            "def_net_type",
            Attribute::optional(string())
                .default("PRIVATE")
                .force_new()
                .validate_with(Validator::OneOf(DEF_NET_TYPES)),
        )
        .attr("ipcidr", Attribute::optional(string()).force_new())
        .attr("ext_net_id", Attribute::optional(int()).force_new())
        .attr("def_net_id", Attribute::computed(int()))
        .attr("vins", Attribute::computed(list_of(int())))
        .attr("computes", Attribute::computed(list_of(int())))
        .attr("status", Attribute::computed(string()))
}

pub fn pfw_rule_schema() -> Schema {
    Schema::new()
        .attr(
            "public_port_start",
            Attribute::required(int()).validate_with(port()),
        )
        .attr(
            "public_port_end",
            Attribute::optional_computed(int()).validate_with(port()),
        )
        .attr("local_port", Attribute::required(int()).validate_with(port()))
        .attr(
            "proto",
            Attribute::required(string()).validate_with(Validator::OneOf(PROTOCOLS)),
        )
        .attr("rule_id", Attribute::computed(int()))
        .attr("local_ip", Attribute::computed(string()))
}

pub fn pfw_schema() -> Schema {
    Schema::new()
        .attr("compute_id", Attribute::required(int()).force_new())
        .attr(
            "rules",
            Attribute::required(set_of(ValueType::Object(pfw_rule_schema()))),
        )
}
