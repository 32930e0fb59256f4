//! Exit codes and error messages

use crate::prelude::*;

#[test]
fn empty_title_is_a_validation_error() {
    let store = Store::new();
    store
        .ctm()
        .args(&["spawn", "   "])
        .fails_with(2)
        .stderr_has("title must not be empty");
}

#[test]
fn unknown_blocker_is_a_validation_error() {
    let store = Store::new();
    store
        .ctm()
        .args(&["spawn", "b", "--blocked-by", "nope"])
        .fails_with(2)
        .stderr_has("agent not found: nope");
    store.ctm().args(&["list"]).passes().stdout_has("No agents");
}

#[test]
fn out_of_range_urgency_is_a_validation_error() {
    let store = Store::new();
    store
        .ctm()
        .args(&["spawn", "x", "--urgency", "1.5"])
        .fails_with(2)
        .stderr_has("urgency must be between 0 and 1");
}

#[test]
fn switch_to_unknown_agent_exits_one() {
    let store = Store::new();
    store
        .ctm()
        .args(&["switch", "ghost"])
        .fails_with(1)
        .stderr_has("agent not found: ghost");
}

#[test]
fn completing_a_cancelled_agent_exits_one() {
    let store = Store::new();
    let a = store.spawn("a", &[]);
    store.ctm().args(&["cancel", &a]).passes();
    store
        .ctm()
        .args(&["complete", &a])
        .fails_with(1)
        .stderr_has("no further changes allowed");
    assert_eq!(store.status(&a), "cancelled");
}

#[test]
fn complete_without_active_agent_exits_one() {
    let store = Store::new();
    store.spawn("queued", &["--queued"]);
    store
        .ctm()
        .args(&["complete"])
        .fails_with(1)
        .stderr_has("no active agent in lane 'default'");
}

#[test]
fn restore_requires_confirmation() {
    let store = Store::new();
    store.spawn("a", &[]);
    store
        .ctm()
        .args(&["restore"])
        .fails_with(1)
        .stderr_has("confirmation required");
}

#[test]
fn unparseable_config_is_reported() {
    let store = Store::new();
    store.file("config.toml", "[store]\nmax_attempts = \"many\"\n");
    store
        .ctm()
        .args(&["queue"])
        .fails_with(1)
        .stderr_has("config.toml");
}
