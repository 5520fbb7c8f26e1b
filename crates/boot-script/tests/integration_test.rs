//! End-to-end tests for the boot script engine
//!
//! A YAML nodes file feeds the file provider, the synchronizer copies the
//! boot-relevant nodes into the store and the service renders scripts.

use boot_script::provider::{FileProvider, FileProviderConfig};
use boot_script::{
    BootConfiguration, BootScriptService, MemoryNodeStore, NodeProvider, NodeStore, NodeSynchronizer,
    ScriptCache, ScriptRenderer, SyncConfig, IPXE_HEADER,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const NODES: &str = r#"version: "1"
nodes:
  - id: x1000c0s0b0n0
    type: Node
    role: Compute
    nid: 1
    groups: [compute, gpu]
    ethernet_interfaces:
      - mac_address: A4:BF:01:00:00:01
  - id: x1000c0s0b1n0
    type: Node
    role: Compute
    nid: 2
    groups: [compute]
    boot_mac: a4:bf:01:00:00:02
  - id: x1000c0s1b0n0
    type: Node
    role: Management
    nid: 3
"#;

fn configurations() -> Vec<BootConfiguration> {
    vec![
        BootConfiguration {
            name: "compute".to_string(),
            groups: vec!["compute".to_string()],
            kernel: "http://boot.example.com/compute/vmlinuz".to_string(),
            initrd: "http://boot.example.com/compute/initrd.img".to_string(),
            params: "console=ttyS0".to_string(),
            ..BootConfiguration::default()
        },
        BootConfiguration {
            name: "gpu".to_string(),
            groups: vec!["gpu".to_string()],
            kernel: "http://boot.example.com/gpu/vmlinuz".to_string(),
            priority: 10,
            ..BootConfiguration::default()
        },
    ]
}

struct Harness {
    _nodes: tempfile::NamedTempFile,
    store: Arc<MemoryNodeStore>,
    provider: Arc<FileProvider>,
    service: BootScriptService,
}

async fn harness() -> Harness {
    let mut nodes = tempfile::NamedTempFile::new().unwrap();
    nodes.write_all(NODES.as_bytes()).unwrap();

    let provider = Arc::new(
        FileProvider::new(FileProviderConfig {
            path: nodes.path().to_path_buf(),
            auto_reload: true,
        })
        .await
        .unwrap(),
    );
    let store = Arc::new(MemoryNodeStore::with_boot_configurations(configurations()));
    let service = BootScriptService::new(
        Arc::clone(&store) as Arc<dyn NodeStore>,
        Some(Arc::clone(&provider) as Arc<dyn NodeProvider>),
        Arc::new(ScriptCache::new(Duration::from_secs(300))),
        ScriptRenderer::default(),
    );
    Harness {
        _nodes: nodes,
        store,
        provider,
        service,
    }
}

#[tokio::test]
async fn test_provider_nodes_boot_before_sync() {
    let h = harness().await;

    let script = h.service.generate_boot_script("a4:bf:01:00:00:01").await.unwrap();
    assert!(script.starts_with(IPXE_HEADER));
    assert!(
        script.contains("kernel --name vmlinuz http://boot.example.com/gpu/vmlinuz"),
        "gpu (25 + 10) beats compute (25):\n{script}"
    );

    let script = h.service.generate_boot_script("2").await.unwrap();
    assert!(script.contains("http://boot.example.com/compute/vmlinuz"));
    assert!(script.contains("initrd --name initrd.img"));
}

#[tokio::test]
async fn test_sync_then_serve_from_store() {
    let h = harness().await;
    let synchronizer = NodeSynchronizer::new(
        Arc::clone(&h.provider) as Arc<dyn NodeProvider>,
        Arc::clone(&h.store) as Arc<dyn NodeStore>,
        Some(Arc::clone(h.service.cache())),
        SyncConfig::default(),
    );

    let report = synchronizer.sync().await.unwrap();
    assert_eq!(report.created, 2, "Management node is not boot-relevant");

    let stored = h.store.get_node("x1000c0s0b0n0").await.unwrap();
    assert_eq!(stored.boot_mac.as_deref(), Some("a4:bf:01:00:00:01"));

    let script = h.service.generate_boot_script("x1000c0s0b1n0").await.unwrap();
    assert!(script.contains("http://boot.example.com/compute/vmlinuz"));

    // Management node still resolves through the provider, but nothing matches it
    let script = h.service.generate_boot_script("x1000c0s1b0n0").await.unwrap();
    assert!(script.contains("chain --autofree"));
    assert!(!script.contains("kernel --name"));
}

#[tokio::test]
async fn test_configuration_change_after_invalidation() {
    let h = harness().await;
    let before = h.service.generate_boot_script("x1000c0s0b1n0").await.unwrap();
    assert!(before.contains("console=ttyS0"));

    let mut compute = configurations().remove(0);
    compute.params = "console=ttyS1".to_string();
    h.store.add_boot_configuration(compute).await;

    let cached = h.service.generate_boot_script("x1000c0s0b1n0").await.unwrap();
    assert_eq!(cached, before, "served from cache until invalidated");

    assert_eq!(h.service.invalidate_for_config("compute"), 1);
    let after = h.service.generate_boot_script("x1000c0s0b1n0").await.unwrap();
    assert!(after.contains("console=ttyS1"));
}
