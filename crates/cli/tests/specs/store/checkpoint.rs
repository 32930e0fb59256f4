//! Checkpoint capture, listing, restore and pruning

use crate::prelude::*;

#[test]
fn first_write_captures_a_cadence_checkpoint() {
    let store = Store::new();
    store.spawn("a", &[]);

    let list = store.json(&["checkpoint", "list"]);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["reason"], "cadence");
}

#[test]
fn manual_checkpoint_shows_in_list() {
    let store = Store::new();
    store.spawn("a", &[]);
    let manifest = store.json(&["checkpoint", "--reason", "before refactor"]);
    let id = id_of(&manifest);

    store
        .ctm()
        .args(&["checkpoint", "list"])
        .passes()
        .stdout_has(&id)
        .stdout_has("before refactor");
}

#[test]
fn restore_discards_agents_created_after_the_checkpoint() {
    let store = Store::new();
    let kept = store.spawn("kept", &[]);
    let checkpoint = id_of(&store.json(&["checkpoint"]));
    let later = store.spawn("later", &[]);
    store.ctm().args(&["complete", &kept]).passes();

    store
        .ctm()
        .args(&["restore", &checkpoint, "--yes"])
        .passes()
        .stdout_has(&format!("Restored checkpoint {checkpoint}"))
        .stdout_has(&format!("discarded: {later}"));

    assert_eq!(store.status(&kept), "active");
    assert!(!store.agent_file(&later).exists());
    store
        .ctm()
        .args(&["show", &later])
        .fails_with(1)
        .stderr_has("agent not found");
}

#[test]
fn restore_of_unknown_checkpoint_fails() {
    let store = Store::new();
    store.spawn("a", &[]);
    store
        .ctm()
        .args(&["restore", "no-such-checkpoint", "--yes"])
        .fails_with(1);
}

#[test]
fn prune_keeps_the_newest() {
    let store = Store::new();
    store.spawn("a", &[]);
    store.ctm().args(&["checkpoint", "--reason", "one"]).passes();
    let newest = id_of(&store.json(&["checkpoint", "--reason", "two"]));

    store
        .ctm()
        .args(&["checkpoint", "prune", "--keep", "1"])
        .passes()
        .stdout_has("2 checkpoint(s) pruned, 1 kept");

    let list = store.json(&["checkpoint", "list"]);
    let ids: Vec<String> = list.as_array().unwrap().iter().map(id_of).collect();
    assert_eq!(ids, vec![newest]);
}
