//! # Integration Tests for the Tool Registry
//!
//! Exercises pinning, persistent storage and the tool policy scanner
//! together.
//!
//! ## Test Categories
//!
//! 1. **Pin lifecycle**: pin, persist, reload, verify
//! 2. **Scanner wiring**: pins loaded from storage feed the scanner
//! 3. **Scenarios**: silent surface change, shadow server, privilege creep

use warden_policy::{Decision, ScanContext, Scanner, ToolCall, ViolationCategory};

use crate::manifest::{pin_manifest, repin, verify_manifest};
use crate::models::{ToolPermissions, ToolPolicyConfig};
use crate::policy::ToolPolicyScanner;
use crate::storage::PinStore;

// =============================================================================
// Helper Functions
// =============================================================================

fn scanner_from_store(store: &PinStore, config: ToolPolicyConfig) -> ToolPolicyScanner {
    let config = store
        .list_pins()
        .unwrap()
        .into_iter()
        .fold(config, |c, pin| c.with_pin(pin));
    ToolPolicyScanner::new(config).unwrap()
}

fn call(name: &str, server: &str) -> ToolCall {
    ToolCall::new(name).from_server(server)
}

// =============================================================================
// Pin Lifecycle Tests
// =============================================================================

#[test]
fn test_pin_roundtrip_through_store_still_verifies() {
    let store = PinStore::temporary().unwrap();
    let pin = pin_manifest("github", &["list_issues", "create_issue"]).unwrap();
    store.store_pin(&pin).unwrap();

    let loaded = store.load_pin("github").unwrap().unwrap();
    let drift = verify_manifest(&loaded, &["create_issue", "list_issues"]).unwrap();
    assert!(drift.valid);
}

#[test]
fn test_repin_accepts_reviewed_change() {
    let store = PinStore::temporary().unwrap();
    let pin = pin_manifest("github", &["list_issues"]).unwrap();
    store.store_pin(&pin).unwrap();

    let updated = repin(&pin, &["list_issues", "close_issue"]).unwrap();
    store.store_pin(&updated).unwrap();

    let scanner = scanner_from_store(&store, ToolPolicyConfig::default());
    let ctx = ScanContext::new().with_tool(call("close_issue", "github"));
    assert_eq!(scanner.scan("", &ctx).unwrap().decision, Decision::Allow);
}

// =============================================================================
// Scenario Tests
// =============================================================================

/// A server that was reviewed with a read-only surface starts exposing a
/// destructive tool. The call is blocked even though the agent allows `*`.
#[test]
fn test_scenario_silent_surface_change() {
    let store = PinStore::temporary().unwrap();
    store
        .store_pin(&pin_manifest("files", &["read_file", "list_dir"]).unwrap())
        .unwrap();

    let scanner = scanner_from_store(
        &store,
        ToolPolicyConfig::default().with_agent("ops", ToolPermissions::default().allow("*")),
    );

    let ctx = ScanContext::new()
        .with_agent("ops")
        .with_tool(call("read_file", "files"))
        .with_tool(call("wipe_disk", "files"));
    let out = scanner.scan("", &ctx).unwrap();

    assert_eq!(out.decision, Decision::Block);
    assert_eq!(out.violations.len(), 1);
    assert_eq!(out.violations[0].category, ViolationCategory::ManifestDrift);

    let drift = verify_manifest(
        scanner.pin("files").unwrap(),
        &["read_file", "list_dir", "wipe_disk"],
    )
    .unwrap();
    assert_eq!(drift.added, vec!["wipe_disk"]);
}

/// A different server id claims a pinned tool name. Pins are per server, so
/// the shadow server's tools are not vouched for by the original pin.
#[test]
fn test_scenario_shadow_server() {
    let scanner = ToolPolicyScanner::new(
        ToolPolicyConfig::default()
            .with_pin(pin_manifest("files", &["read_file"]).unwrap())
            .with_pin(pin_manifest("files-mirror", &["stat"]).unwrap()),
    )
    .unwrap();

    let ctx = ScanContext::new().with_tool(call("read_file", "files-mirror"));
    let out = scanner.scan("", &ctx).unwrap();
    assert_eq!(out.decision, Decision::Block);
    assert_eq!(out.violations[0].detail.as_deref(), Some("files-mirror/read_file"));
}

/// Every violation kind at once: dangerous, denied, drift and depth.
#[test]
fn test_scenario_privilege_creep_collects_all_violations() {
    let scanner = ToolPolicyScanner::new(
        ToolPolicyConfig::default()
            .with_dangerous_pattern("*sudo*")
            .with_max_chain_depth(2)
            .with_agent("bot", ToolPermissions::default().deny("billing_*"))
            .with_pin(pin_manifest("crm", &["lookup"]).unwrap()),
    )
    .unwrap();

    let ctx = ScanContext::new()
        .with_agent("bot")
        .with_tool(ToolCall::new("sudo_run"))
        .with_tool(ToolCall::new("billing_refund"))
        .with_tool(call("export_contacts", "crm"));
    let out = scanner.scan("", &ctx).unwrap();

    let cats: Vec<_> = out.violations.iter().map(|v| v.category).collect();
    assert_eq!(
        cats,
        vec![
            ViolationCategory::ToolRateLimit,
            ViolationCategory::ToolDenied,
            ViolationCategory::ToolDenied,
            ViolationCategory::ManifestDrift,
        ]
    );
    assert!(out.decision.is_blocked());
}
