//! Agent lifecycle through the CLI

use crate::prelude::*;

#[test]
fn spawning_takes_focus_from_the_active_agent() {
    let store = Store::new();
    let first = store.spawn("first", &[]);
    let second = store.spawn("second", &[]);

    assert_eq!(store.status(&first), "paused");
    assert_eq!(store.status(&second), "active");
}

#[test]
fn switch_moves_focus_back() {
    let store = Store::new();
    let first = store.spawn("first", &[]);
    let second = store.spawn("second", &[]);

    store
        .ctm()
        .args(&["switch", &first])
        .passes()
        .stdout_has("Switched to")
        .stdout_has(&second);

    assert_eq!(store.status(&first), "active");
    assert_eq!(store.status(&second), "paused");
}

#[test]
fn lanes_keep_separate_focus() {
    let store = Store::new();
    let main = store.spawn("main work", &[]);
    let review = store.spawn("review", &["--lane", "review"]);

    assert_eq!(store.status(&main), "active");
    assert_eq!(store.status(&review), "active");

    store
        .ctm()
        .env("CTM_LANE", "review")
        .args(&["pause"])
        .passes()
        .stdout_has(&review);
    assert_eq!(store.status(&main), "active");
    assert_eq!(store.status(&review), "paused");
}

#[test]
fn pause_and_complete_default_to_the_active_agent() {
    let store = Store::new();
    let a = store.spawn("a", &[]);

    store.ctm().args(&["pause"]).passes().stdout_has("Paused");
    assert_eq!(store.status(&a), "paused");

    store.ctm().args(&["switch", &a]).passes();
    store.ctm().args(&["complete"]).passes().stdout_has("Completed");
    assert_eq!(store.status(&a), "completed");
}

#[test]
fn notes_and_progress_show_up() {
    let store = Store::new();
    let a = store.spawn("migrate db", &["--goal", "move to postgres", "--criterion", "tests green"]);

    store
        .ctm()
        .args(&["note", &a, "--decision", "use pg_dump"])
        .passes();
    store
        .ctm()
        .args(&["note", &a, "--learning", "locks are slow"])
        .passes();
    store
        .ctm()
        .args(&["progress", &a, "40", "--step", "copying rows"])
        .passes()
        .stdout_has("40%");

    store
        .ctm()
        .args(&["show", &a])
        .passes()
        .stdout_has("goal:      move to postgres")
        .stdout_has("[ ] tests green")
        .stdout_has("progress:  40%  copying rows")
        .stdout_has("use pg_dump")
        .stdout_has("locks are slow");
}

#[test]
fn progress_over_100_is_rejected() {
    let store = Store::new();
    let a = store.spawn("a", &[]);
    store
        .ctm()
        .args(&["progress", &a, "150"])
        .fails_with(2)
        .stderr_has("over 100");
}

#[test]
fn list_hides_finished_agents_unless_all() {
    let store = Store::new();
    let done = store.spawn("done", &[]);
    let open = store.spawn("open", &["--queued"]);
    store.ctm().args(&["complete", &done]).passes();

    // The ID column shows a 12-character prefix.
    let (open, done) = (&open[..12], &done[..12]);
    store
        .ctm()
        .args(&["list"])
        .passes()
        .stdout_has(open)
        .stdout_lacks(done);
    store
        .ctm()
        .args(&["list", "--all"])
        .passes()
        .stdout_has(open)
        .stdout_has(done);
}

#[test]
fn archive_removes_a_finished_agent_from_view() {
    let store = Store::new();
    let a = store.spawn("a", &[]);
    store.ctm().args(&["complete", &a]).passes();
    store.ctm().args(&["archive", &a]).passes().stdout_has("Archived");

    assert!(!store.agent_file(&a).exists());
    assert!(store.path().join("archive").join(format!("{a}.json")).exists());
    store
        .ctm()
        .args(&["list", "--all"])
        .passes()
        .stdout_has("No agents");
}

#[test]
fn completion_emits_one_consolidation_event() {
    let store = Store::new();
    let a = store.spawn("a", &[]);
    store
        .ctm()
        .args(&["note", &a, "--learning", "cache the token"])
        .passes();
    store.ctm().args(&["complete", &a]).passes();
    // Completing again is a no-op.
    store.ctm().args(&["complete", &a]).passes();

    let outbox = std::fs::read_to_string(store.path().join("outbox/consolidation.jsonl")).unwrap();
    let lines: Vec<&str> = outbox.lines().collect();
    assert_eq!(lines.len(), 1);
    let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(event["agent_id"], a.as_str());
}

#[test]
fn impact_lists_agents_with_dependents() {
    let store = Store::new();
    let root = store.spawn("root", &[]);
    store.spawn("leaf one", &["--blocked-by", &root]);
    store.spawn("leaf two", &["--blocked-by", &root]);

    store
        .ctm()
        .args(&["impact"])
        .passes()
        .stdout_has(&root)
        .stdout_has("2");
}
