//! Unit tests for iPXE rendering

use super::*;
use crate::test_utils::{create_test_config, create_test_node};

fn scenario_a() -> (Node, BootConfiguration) {
    let node = create_test_node("x0c0s0b0n0", 1, "a4:bf:01:00:00:01");
    let mut config = create_test_config("cfg1");
    config.kernel = "http://boot.example.com/images/vmlinuz".to_string();
    config.params = "console=tty0".to_string();
    config.macs = vec!["a4:bf:01:00:00:01".to_string()];
    (node, config)
}

#[test]
fn test_extract_filename() {
    assert_eq!(extract_filename("http://boot.example.com/images/vmlinuz"), "vmlinuz");
    assert_eq!(extract_filename("/srv/boot/initrd.img"), "initrd.img");
    assert_eq!(extract_filename("vmlinuz"), "vmlinuz");
    assert_eq!(extract_filename("http://boot.example.com/images/"), "");
    assert_eq!(extract_filename(""), "");
}

#[test]
fn test_full_script() {
    let (node, config) = scenario_a();
    let renderer = ScriptRenderer::default();
    let script = renderer.render("x0c0s0b0n0", Some(&node), Some(&config)).unwrap();

    assert!(script.starts_with(IPXE_HEADER));
    assert!(script.contains("x0c0s0b0n0"));
    assert!(script.contains("dhcp\n"));
    assert!(script.contains("kernel --name vmlinuz http://boot.example.com/images/vmlinuz\n"));
    assert!(script.contains("initrd --name initrd.img http://boot.example.com/images/initrd.img\n"));
    assert!(script.contains("imgargs vmlinuz initrd=initrd.img console=tty0\n"));
    assert!(script.trim_end().ends_with("boot"));
}

#[test]
fn test_initrd_omitted_when_absent() {
    let (node, mut config) = scenario_a();
    config.initrd.clear();
    let script = ScriptRenderer::default()
        .render("x0c0s0b0n0", Some(&node), Some(&config))
        .unwrap();

    assert!(!script.contains("initrd"), "no initrd line or argument expected:\n{script}");
    assert!(script.contains("imgargs vmlinuz console=tty0\n"));
}

#[test]
fn test_rendering_is_idempotent() {
    let (node, config) = scenario_a();
    let renderer = ScriptRenderer::default();
    let first = renderer.render("x0c0s0b0n0", Some(&node), Some(&config)).unwrap();
    let second = renderer.render("x0c0s0b0n0", Some(&node), Some(&config)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_minimal_script_has_no_kernel() {
    let node = create_test_node("x1000c0s0b0n0", 1, "a4:bf:01:00:00:01");
    let script = ScriptRenderer::default()
        .render("x1000c0s0b0n0", Some(&node), None)
        .unwrap();

    assert!(script.starts_with(IPXE_HEADER));
    assert!(script.contains("dhcp\n"));
    assert!(script.contains("sleep 10\n"));
    assert!(script.contains("chain --autofree /boot/v1/bootscript?mac=${net0/mac} || reboot"));
    assert!(!script.to_lowercase().contains("kernel"));
}

#[test]
fn test_error_script_for_unknown_node() {
    let script = ScriptRenderer::default()
        .render("x9999c9s9b9n9", None, None)
        .unwrap();

    assert!(script.starts_with(IPXE_HEADER));
    assert!(script.contains("BOOT SCRIPT ERROR"));
    assert!(script.contains("# identifier: x9999c9s9b9n9"));
    assert!(script.contains("chain --autofree"));
    assert!(!script.to_lowercase().contains("kernel"));
}

#[test]
fn test_no_placeholders_on_any_path() {
    let (node, config) = scenario_a();
    let renderer = ScriptRenderer::default();
    let scripts = [
        renderer.render("x0c0s0b0n0", Some(&node), Some(&config)).unwrap(),
        renderer.render("x0c0s0b0n0", Some(&node), None).unwrap(),
        renderer.render("x0c0s0b0n0", None, None).unwrap(),
        renderer.render_error("{{identifier}}", "bad {{reason}}\nsecond line"),
    ];
    for script in &scripts {
        assert!(!script.contains("{{"), "unresolved placeholder in:\n{script}");
        assert!(!script.contains("}}"), "unresolved placeholder in:\n{script}");
        assert!(script.starts_with(IPXE_HEADER));
    }
}

#[test]
fn test_error_diagnostics_sanitized() {
    let script = ScriptRenderer::default().render_error("node{1}", "line one\nboot\r\nline two");
    assert!(script.contains("# identifier: node1\n"));
    assert!(script.contains("# reason: line one boot  line two\n"));
    assert_eq!(
        script.lines().filter(|l| *l == "boot").count(),
        0,
        "diagnostic text must not inject directives"
    );
}

#[test]
fn test_values_cannot_inject_lines() {
    let (node, mut config) = scenario_a();
    config.params = "console=tty0\nshell".to_string();
    let script = ScriptRenderer::default()
        .render("x0c0s0b0n0", Some(&node), Some(&config))
        .unwrap();
    assert!(script.contains("console=tty0 shell\n"));
    assert!(!script.lines().any(|l| l == "shell"));
}

#[test]
fn test_empty_kernel_filename_is_error() {
    let (node, mut config) = scenario_a();
    config.kernel = "http://boot.example.com/images/".to_string();
    let result = ScriptRenderer::default().render("x0c0s0b0n0", Some(&node), Some(&config));
    assert!(matches!(result, Err(RenderError::EmptyKernelFilename(_))));

    config.kernel = "http://boot.example.com/images/vmlinuz".to_string();
    config.initrd = "http://boot.example.com/images/".to_string();
    let result = ScriptRenderer::default().render("x0c0s0b0n0", Some(&node), Some(&config));
    assert!(matches!(result, Err(RenderError::EmptyInitrdFilename(_))));
}

#[test]
fn test_placeholder_in_value_is_error() {
    let (node, mut config) = scenario_a();
    config.params = "console={{tty}}".to_string();
    let result = ScriptRenderer::default().render("x0c0s0b0n0", Some(&node), Some(&config));
    assert!(matches!(result, Err(RenderError::UnresolvedPlaceholder(_))));
}

#[test]
fn test_substitute_rejects_unknown_and_unterminated() {
    assert_eq!(
        substitute("a {{missing}} b", &[]),
        Err(RenderError::UnresolvedPlaceholder("missing".to_string()))
    );
    assert!(matches!(
        substitute("a {{open", &[]),
        Err(RenderError::MalformedTemplate(_))
    ));
    assert_eq!(
        substitute("{{x}}-{{ x }}", &[("x", "1".to_string())]).unwrap(),
        "1-1"
    );
}

#[test]
fn test_custom_retry_settings() {
    let renderer = ScriptRenderer::new(RendererConfig {
        chain_url: "http://boot.example.com/boot/v1/bootscript?nid=${nid}".to_string(),
        retry_delay_secs: 30,
    });
    let script = renderer.render("x9999c9s9b9n9", None, None).unwrap();
    assert!(script.contains("sleep 30\n"));
    assert!(script.contains("chain --autofree http://boot.example.com/boot/v1/bootscript?nid=${nid} || reboot"));
}
