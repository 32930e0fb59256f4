//! End-to-end scheduling scenarios

use crate::prelude::*;

#[test]
fn completing_a_blocker_releases_its_dependent() {
    let store = Store::new();
    let a = store.spawn("ship api", &["-p", "high"]);
    let b = store.spawn("write client", &["--blocked-by", &a]);

    assert_eq!(store.status(&b), "blocked");
    assert_eq!(store.queue(), vec![a.clone()]);

    store
        .ctm()
        .args(&["complete", &a])
        .passes()
        .stdout_has(&format!("unblocked: {b}"));

    assert_eq!(store.status(&a), "completed");
    assert_eq!(store.status(&b), "paused");
    assert_eq!(store.queue(), vec![b]);
}

#[test]
fn stale_expected_version_is_a_conflict() {
    let store = Store::new();
    let a = store.spawn("draft", &[]);
    let version = store.json(&["show", &a])["agent"]["_version"]
        .as_u64()
        .unwrap()
        .to_string();

    store
        .ctm()
        .args(&["edit", &a, "--title", "first", "--expect-version", &version])
        .passes();
    store
        .ctm()
        .args(&["edit", &a, "--title", "second", "--expect-version", &version])
        .fails_with(1)
        .stderr_has("version conflict");

    let shown = store.json(&["show", &a]);
    assert_eq!(shown["agent"]["task"]["title"], "first");
}

#[test]
fn cyclic_block_is_rejected_and_leaves_state_alone() {
    let store = Store::new();
    let a = store.spawn("a", &["--queued"]);
    let b = store.spawn("b", &["--queued"]);

    store.ctm().args(&["block", &b, "--on", &a]).passes();
    store
        .ctm()
        .args(&["block", &a, "--on", &b])
        .fails_with(2)
        .stderr_has("would create a cycle");

    let shown = store.json(&["show", &a]);
    assert_eq!(shown["agent"]["deps"]["blocked_by"], serde_json::json!([]));
    assert_eq!(store.status(&b), "blocked");
}

#[test]
fn overdue_agent_leads_the_queue() {
    let store = Store::new();
    store.spawn("someday", &["--queued"]);
    let overdue = store.spawn("tax return", &["--queued", "--deadline", "-1h"]);

    assert_eq!(store.queue()[0], overdue);
    store
        .ctm()
        .args(&["queue"])
        .passes()
        .stdout_has("overdue");
}
