// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctm_core::test_support::{agent, T0};

fn event(id: &str) -> ConsolidationEvent {
    ConsolidationEvent::from_agent(&agent(id), T0)
}

#[test]
fn outbox_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let sink = OutboxSink::new(dir.path().join("outbox/consolidation.jsonl"));
    sink.deliver(&event("a")).unwrap();
    sink.deliver(&event("b")).unwrap();

    let content = fs::read_to_string(sink.path()).unwrap();
    assert_eq!(content.lines().count(), 2);
    let read = read_outbox(sink.path()).unwrap();
    assert_eq!(read, vec![event("a"), event("b")]);
}

#[test]
fn read_outbox_skips_garbage_and_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("consolidation.jsonl");
    assert!(read_outbox(&path).unwrap().is_empty());

    let sink = OutboxSink::new(&path);
    sink.deliver(&event("a")).unwrap();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "{{torn").unwrap();
    assert_eq!(read_outbox(&path).unwrap().len(), 1);
}
