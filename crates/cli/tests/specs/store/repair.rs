//! Repair of corrupt and inconsistent state

use crate::prelude::*;

#[test]
fn clean_store_has_nothing_to_repair() {
    let store = Store::new();
    store.spawn("a", &[]);
    store
        .ctm()
        .args(&["repair"])
        .passes()
        .stdout_has("Nothing to repair (1 agent(s) indexed)");
}

#[test]
fn corrupt_document_is_restored_from_checkpoint() {
    let store = Store::new();
    let a = store.spawn("precious", &[]);
    std::fs::write(store.agent_file(&a), "{ not json").unwrap();

    store
        .ctm()
        .args(&["repair"])
        .passes()
        .stdout_has(&format!("restored   {a}"));

    let shown = store.json(&["show", &a]);
    assert_eq!(shown["agent"]["task"]["title"], "precious");
}

#[test]
fn unrecoverable_corruption_needs_drop_corrupt() {
    let store = Store::new();
    let a = store.spawn("doomed", &[]);
    std::fs::remove_dir_all(store.path().join("checkpoints")).unwrap();
    std::fs::write(store.agent_file(&a), "garbage").unwrap();

    store
        .ctm()
        .args(&["repair"])
        .fails_with(1)
        .stdout_has(&format!("corrupt    {a}"))
        .stderr_has("--drop-corrupt");

    store
        .ctm()
        .args(&["repair", "--drop-corrupt"])
        .passes()
        .stdout_has(&format!("dropped    {a}"));
    assert!(!store.agent_file(&a).exists());
}

#[test]
fn corrupt_documents_are_skipped_by_queue() {
    let store = Store::new();
    let good = store.spawn("good", &["--queued"]);
    let bad = store.spawn("bad", &["--queued"]);
    std::fs::write(store.agent_file(&bad), "[]").unwrap();

    assert_eq!(store.queue(), vec![good]);
}
