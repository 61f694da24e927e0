//! End-to-end reconciler runs against the scripted Platform

use gridform_cloud::{Attributes, ResourceData, ResourceState, ResourceStatus};
use gridform_platform::endpoints;
use gridform_platform::mock::{MockPlatform, MockReply};
use gridform_provider::{GridProvider, ProviderContext};
use serde_json::{Value, json};
use std::sync::Arc;

fn provider(mock: &Arc<MockPlatform>) -> GridProvider {
    GridProvider::new(ProviderContext::new(mock.clone(), 212))
}

fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().unwrap()
}

fn compute_body(id: u64, ram: u64, boot_size: u64, extra: &[u64], nets: &[(&str, i64)]) -> String {
    let mut disks = vec![json!({"id": 700, "name": "boot", "type": "B", "sizeMax": boot_size})];
    disks.extend(
        extra
            .iter()
            .map(|id| json!({"id": id, "name": format!("data-{}", id), "type": "D", "sizeMax": 50})),
    );
    let interfaces: Vec<Value> = nets
        .iter()
        .enumerate()
        .map(|(i, (net_type, net_id))| {
            json!({
                "name": format!("eth{}", i),
                "netType": net_type,
                "netId": net_id,
                "ipAddress": format!("10.0.0.{}", 10 + i),
                "mac": format!("52:54:00:00:00:0{}", i),
            })
        })
        .collect();
    json!({
        "id": id,
        "name": "web-1",
        "rgId": 42,
        "rgName": "prod",
        "accountId": 7,
        "accountName": "acme",
        "arch": "KVM_X86",
        "cpus": 2,
        "ram": ram,
        "imageId": 17,
        "imageName": "ubuntu-24.04",
        "status": "ENABLED",
        "techStatus": "STARTED",
        "disks": disks,
        "interfaces": interfaces,
    })
    .to_string()
}

fn minimal_config() -> Value {
    json!({
        "name": "web-1",
        "rg_id": 42,
        "arch": "KVM_X86",
        "cpu": 2,
        "ram": 2048,
        "image_id": 17,
        "boot_disk_size": 10,
    })
}

/// Persisted state of compute 9001 matching `minimal_config`
fn converged_state(extra: &[u64], boot_size: u64) -> ResourceState {
    let mut state = ResourceState::new("9001", "compute")
        .with_attribute("compute_id", json!(9001))
        .with_attribute("boot_disk_id", json!(700))
        .with_attribute("extra_disks", json!(extra));
    for (key, value) in attrs(minimal_config()) {
        state = state.with_attribute(&key, value);
    }
    state.with_attribute("boot_disk_size", json!(boot_size))
}

fn with(config: Value, key: &str, value: Value) -> Value {
    let mut map = attrs(config);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

#[tokio::test]
async fn test_create_minimal_compute() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_CREATE_X86, "\"9001\"")
        .on(endpoints::COMPUTE_GET, compute_body(9001, 2048, 10, &[], &[]));

    let mut d = ResourceData::new(attrs(minimal_config()));
    provider(&mock).create("compute", &mut d).await.unwrap();

    assert_eq!(
        mock.endpoints(),
        vec![endpoints::COMPUTE_CREATE_X86, endpoints::COMPUTE_GET]
    );
    let create = mock.calls_to(endpoints::COMPUTE_CREATE_X86).remove(0);
    assert_eq!(create.param("rgId"), Some("42"));
    assert_eq!(create.param("name"), Some("web-1"));
    assert_eq!(create.param("cpu"), Some("2"));
    assert_eq!(create.param("ram"), Some("2048"));
    assert_eq!(create.param("imageId"), Some("17"));
    assert_eq!(create.param("bootDisk"), Some("10"));
    assert_eq!(create.param("netType"), Some("NONE"));
    assert_eq!(create.param("userdata"), None);

    let get = mock.calls_to(endpoints::COMPUTE_GET).remove(0);
    assert_eq!(get.param("computeId"), Some("9001"));

    assert_eq!(d.id(), "9001");
    assert_eq!(d.get_str("image_name"), "ubuntu-24.04");
    assert_eq!(d.get_u64("boot_disk_id"), 700);

    let state = d.commit("compute").unwrap();
    assert_eq!(state.status, ResourceStatus::Converged);
    assert!(state.pending.is_empty());
}

#[tokio::test]
async fn test_create_with_ssh_keys_sends_userdata() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_CREATE_X86, "9001")
        .on(endpoints::COMPUTE_GET, compute_body(9001, 2048, 10, &[], &[]));

    let config = with(
        minimal_config(),
        "ssh_keys",
        json!([{"user": "ops", "public_key": "ssh-ed25519 AAAA ops@host"}]),
    );
    let mut d = ResourceData::new(attrs(config));
    provider(&mock).create("compute", &mut d).await.unwrap();

    let create = mock.calls_to(endpoints::COMPUTE_CREATE_X86).remove(0);
    assert_eq!(
        create.param("userdata"),
        Some(r#"{"users":[{"ssh-authorized-keys":["ssh-ed25519 AAAA ops@host"],"shell":"/bin/bash","name":"ops"}]}"#)
    );
}

#[tokio::test]
async fn test_create_with_disks_and_network() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_CREATE_X86, "9002")
        .on(endpoints::COMPUTE_DISK_ATTACH, "true")
        .on(endpoints::COMPUTE_NET_ATTACH, "true")
        .on(
            endpoints::COMPUTE_GET,
            compute_body(9002, 2048, 10, &[100, 101], &[("VINS", 55)]),
        );

    let config = with(minimal_config(), "extra_disks", json!([100, 101]));
    let config = with(config, "network", json!([{"net_type": "VINS", "net_id": 55}]));
    let mut d = ResourceData::new(attrs(config));
    provider(&mock).create("compute", &mut d).await.unwrap();

    assert_eq!(
        mock.endpoints(),
        vec![
            endpoints::COMPUTE_CREATE_X86,
            endpoints::COMPUTE_DISK_ATTACH,
            endpoints::COMPUTE_DISK_ATTACH,
            endpoints::COMPUTE_NET_ATTACH,
            endpoints::COMPUTE_GET,
        ]
    );
    let attaches = mock.calls_to(endpoints::COMPUTE_DISK_ATTACH);
    assert_eq!(attaches[0].param("computeId"), Some("9002"));
    assert_eq!(attaches[0].param("diskId"), Some("100"));
    assert_eq!(attaches[1].param("diskId"), Some("101"));

    let net = mock.calls_to(endpoints::COMPUTE_NET_ATTACH).remove(0);
    assert_eq!(net.param("computeId"), Some("9002"));
    assert_eq!(net.param("netType"), Some("VINS"));
    assert_eq!(net.param("netId"), Some("55"));
    assert_eq!(net.param("ipAddr"), None);

    assert!(!d.is_partial());
    assert_eq!(d.get("extra_disks"), Some(&json!([100, 101])));
}

#[tokio::test]
async fn test_create_keeps_id_when_attach_fails() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_CREATE_X86, "9002")
        .on_reply(
            endpoints::COMPUTE_DISK_ATTACH,
            MockReply::fail(400, "disk 100 is attached elsewhere"),
        )
        .on(endpoints::COMPUTE_NET_ATTACH, "true")
        .on(
            endpoints::COMPUTE_GET,
            compute_body(9002, 2048, 10, &[], &[("VINS", 55)]),
        );

    let config = with(minimal_config(), "extra_disks", json!([100]));
    let config = with(config, "network", json!([{"net_type": "VINS", "net_id": 55}]));
    let mut d = ResourceData::new(attrs(config));
    let err = provider(&mock).create("compute", &mut d).await.unwrap_err();
    assert!(err.to_string().contains("attached elsewhere"));

    // Networks still attached and the compute re-read
    assert_eq!(mock.calls_to(endpoints::COMPUTE_NET_ATTACH).len(), 1);
    assert_eq!(mock.calls_to(endpoints::COMPUTE_GET).len(), 1);

    assert_eq!(d.id(), "9002");
    assert_eq!(d.pending(), vec!["extra_disks".to_string()]);
    let state = d.commit("compute").unwrap();
    assert_eq!(state.status, ResourceStatus::Partial);
    assert_eq!(state.pending, vec!["extra_disks".to_string()]);
}

#[tokio::test]
async fn test_update_extra_disk_delta() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_DISK_DETACH, "true")
        .on(endpoints::COMPUTE_DISK_ATTACH, "true")
        .on(
            endpoints::COMPUTE_GET,
            compute_body(9001, 2048, 10, &[101, 103], &[]),
        );

    let state = converged_state(&[100, 101, 102], 10);
    let config = with(minimal_config(), "extra_disks", json!([101, 103]));
    let mut d = ResourceData::from_state(&state, attrs(config));
    provider(&mock).update("compute", &mut d).await.unwrap();

    assert_eq!(
        mock.endpoints(),
        vec![
            endpoints::COMPUTE_DISK_DETACH,
            endpoints::COMPUTE_DISK_DETACH,
            endpoints::COMPUTE_DISK_ATTACH,
            endpoints::COMPUTE_GET,
        ]
    );
    let detached: Vec<String> = mock
        .calls_to(endpoints::COMPUTE_DISK_DETACH)
        .iter()
        .filter_map(|c| c.param("diskId").map(str::to_string))
        .collect();
    assert_eq!(detached, vec!["100", "102"]);
    let attach = mock.calls_to(endpoints::COMPUTE_DISK_ATTACH).remove(0);
    assert_eq!(attach.param("diskId"), Some("103"));

    assert!(
        mock.calls()
            .iter()
            .all(|c| c.param("diskId") != Some("101"))
    );
}

#[tokio::test]
async fn test_update_resize_and_grow_boot_disk() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_RESIZE, "true")
        .on(endpoints::DISKS_RESIZE, "true")
        .on(endpoints::COMPUTE_GET, compute_body(9001, 4096, 20, &[], &[]));

    let state = converged_state(&[], 10);
    let config = with(minimal_config(), "ram", json!(4096));
    let config = with(config, "boot_disk_size", json!(20));
    let mut d = ResourceData::from_state(&state, attrs(config));
    provider(&mock).update("compute", &mut d).await.unwrap();

    assert_eq!(
        mock.endpoints(),
        vec![
            endpoints::COMPUTE_RESIZE,
            endpoints::DISKS_RESIZE,
            endpoints::COMPUTE_GET,
        ]
    );
    let resize = mock.calls_to(endpoints::COMPUTE_RESIZE).remove(0);
    assert_eq!(resize.param("computeId"), Some("9001"));
    assert_eq!(resize.param("cpu"), Some("0"));
    assert_eq!(resize.param("ram"), Some("4096"));

    let grow = mock.calls_to(endpoints::DISKS_RESIZE).remove(0);
    assert_eq!(grow.param("diskId"), Some("700"));
    assert_eq!(grow.param("size"), Some("20"));

    assert_eq!(d.get_u64("ram"), 4096);
    assert_eq!(d.get_u64("boot_disk_size"), 20);
}

#[tokio::test]
async fn test_grow_boot_disk_checks_live_size() {
    // Grown outside gridform to 30 while the state still says 10
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_GET, compute_body(9001, 2048, 30, &[], &[]));

    let mut state = converged_state(&[], 10);
    state.attributes.remove("boot_disk_id");
    let config = with(minimal_config(), "boot_disk_size", json!(20));
    let mut d = ResourceData::from_state(&state, attrs(config));
    provider(&mock).update("compute", &mut d).await.unwrap();

    assert_eq!(
        mock.endpoints(),
        vec![endpoints::COMPUTE_GET, endpoints::COMPUTE_GET]
    );
    assert!(mock.calls_to(endpoints::DISKS_RESIZE).is_empty());
    assert_eq!(d.get_u64("boot_disk_size"), 30);
}

#[tokio::test]
async fn test_update_never_shrinks_boot_disk() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_GET, compute_body(9001, 2048, 20, &[], &[]));

    let state = converged_state(&[], 20);
    let config = with(minimal_config(), "boot_disk_size", json!(10));
    let mut d = ResourceData::from_state(&state, attrs(config));
    provider(&mock).update("compute", &mut d).await.unwrap();

    assert!(mock.calls_to(endpoints::DISKS_RESIZE).is_empty());
    assert!(mock.calls_to(endpoints::COMPUTE_RESIZE).is_empty());
    assert_eq!(d.get_u64("boot_disk_size"), 20);
}

#[tokio::test]
async fn test_update_without_changes_only_reads() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_GET, compute_body(9001, 2048, 10, &[], &[]));

    let state = converged_state(&[], 10);
    let mut d = ResourceData::from_state(&state, attrs(minimal_config()));
    provider(&mock).update("compute", &mut d).await.unwrap();

    assert_eq!(mock.endpoints(), vec![endpoints::COMPUTE_GET]);
    assert!(!d.is_partial());
}

#[tokio::test]
async fn test_update_rejects_arch_change() {
    let mock = Arc::new(MockPlatform::new());
    let state = converged_state(&[], 10);
    let config = with(minimal_config(), "arch", json!("KVM_PPC"));
    let mut d = ResourceData::from_state(&state, attrs(config));

    let err = provider(&mock).update("compute", &mut d).await.unwrap_err();
    assert!(err.to_string().contains("arch"));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_delete_absent_compute_twice() {
    let mock = Arc::new(MockPlatform::new());
    mock.on_reply(endpoints::COMPUTE_GET, MockReply::NotFound)
        .on(endpoints::RG_LIST_COMPUTES, "[]");

    let state = converged_state(&[], 10);
    let mut d = ResourceData::from_state(&state, attrs(minimal_config()));
    let provider = provider(&mock);

    provider.delete("compute", &mut d).await.unwrap();
    assert_eq!(d.id(), "");
    provider.delete("compute", &mut d).await.unwrap();

    assert!(mock.calls_to(endpoints::COMPUTE_DELETE).is_empty());
}

#[tokio::test]
async fn test_delete_is_permanent() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(endpoints::COMPUTE_GET, compute_body(9001, 2048, 10, &[], &[]))
        .on(endpoints::COMPUTE_DELETE, "true");

    let mut d = ResourceData::with_id("9001", Attributes::new());
    provider(&mock).delete("compute", &mut d).await.unwrap();

    let call = mock.calls_to(endpoints::COMPUTE_DELETE).remove(0);
    assert_eq!(call.param("computeId"), Some("9001"));
    assert_eq!(call.param("permanently"), Some("true"));
    assert!(d.commit("compute").is_none());
}

#[tokio::test]
async fn test_read_is_idempotent() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(
        endpoints::COMPUTE_GET,
        compute_body(9001, 2048, 10, &[100], &[("VINS", 55)]),
    );
    let provider = provider(&mock);

    let mut first = ResourceData::with_id("9001", Attributes::new());
    provider.read("compute", &mut first).await.unwrap();
    let first = first.commit("compute").unwrap();

    let mut second = ResourceData::from_state(&first, Attributes::new());
    provider.read("compute", &mut second).await.unwrap();
    let second = second.commit("compute").unwrap();

    assert_eq!(first.attributes, second.attributes);
}

#[tokio::test]
async fn test_exists_does_not_touch_bag() {
    let mock = Arc::new(MockPlatform::new());
    mock.on(
        endpoints::RG_LIST_COMPUTES,
        r#"[{"id": 9001, "name": "web-1", "status": "DESTROYED"},
            {"id": 9003, "name": "web-1", "status": "ENABLED"}]"#,
    )
    .on(endpoints::COMPUTE_GET, compute_body(9003, 2048, 10, &[], &[]));

    let d = ResourceData::new(attrs(minimal_config()));
    assert!(provider(&mock).exists("compute", &d).await.unwrap());
    assert_eq!(d.id(), "");

    let get = mock.calls_to(endpoints::COMPUTE_GET).remove(0);
    assert_eq!(get.param("computeId"), Some("9003"));
}
