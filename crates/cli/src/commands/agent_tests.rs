// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctm_core::test_support::{agent, T0};
use ctm_core::{ConsolidationEvent, ScoreBreakdown, ScoreConfig, ScoreContext};
use serial_test::serial;
use yare::parameterized;

const HOUR_MS: u64 = 3_600_000;

fn plain() {
    std::env::set_var("NO_COLOR", "1");
    std::env::remove_var("COLOR");
}

fn versioned(agent: Agent) -> Versioned<Agent> {
    Versioned {
        version: 3,
        last_modified_ms: T0,
        modified_by: "host:1".into(),
        data: agent,
    }
}

fn view(agent: Agent) -> AgentView {
    let cfg = ScoreConfig::default();
    let breakdown = ScoreBreakdown::of(&agent, &cfg, &ScoreContext::at(T0));
    AgentView {
        score: breakdown.total(&cfg),
        breakdown,
        tier: None,
        agent: versioned(agent),
    }
}

#[parameterized(
    bare_offset = { "2h", T0 + 2 * HOUR_MS },
    plus_offset = { "+30m", T0 + HOUR_MS / 2 },
    past_offset = { "-1h", T0 - HOUR_MS },
    rfc3339 = { "2026-01-01T01:00:00Z", T0 + HOUR_MS },
)]
fn deadlines_parse(input: &str, expected: u64) {
    assert_eq!(parse_deadline(input, T0).unwrap(), expected);
}

#[test]
fn garbage_deadline_is_rejected() {
    let err = parse_deadline("tomorrow", T0).unwrap_err();
    assert!(err.contains("invalid deadline 'tomorrow'"), "{err}");
}

#[test]
#[serial]
fn view_lists_dependencies_and_notes() {
    plain();
    let mut a = agent("a");
    a.task.goal = "ship the parser".into();
    a.deps.blocks.insert(AgentId::new("b"));
    a.context.decisions.push(ctm_core::LogEntry {
        text: "use serde".into(),
        timestamp_ms: T0 - 5 * 60_000,
    });
    a.state.progress_pct = 40;
    a.state.current_step = "tests".into();

    let text = format_view(&view(a), T0);
    assert!(text.starts_with("a task a\n"), "{text}");
    assert!(text.contains("  status:    active (lane default)"), "{text}");
    assert!(text.contains("  goal:      ship the parser"), "{text}");
    assert!(text.contains("  progress:  40%  tests"), "{text}");
    assert!(text.contains("  blocks:    b"), "{text}");
    assert!(text.contains("    - use serde (5m ago)"), "{text}");
    assert!(text.contains("version 3, modified 0s ago by host:1"), "{text}");
    assert!(!text.contains("deadline"), "{text}");
}

#[test]
#[serial]
fn view_shows_overdue_deadline() {
    plain();
    let mut a = agent("a");
    a.timing.deadline_ms = Some(T0 - HOUR_MS);
    let text = format_view(&view(a), T0);
    assert!(text.contains("  deadline:  1h overdue"), "{text}");
    assert!(text.contains("overdue"), "{text}");
}

#[test]
#[serial]
fn completion_reports_unblocked_and_undelivered() {
    plain();
    let a = agent("a");
    let done = Completion {
        event: Some(ConsolidationEvent::from_agent(&a, T0)),
        agent: versioned(a),
        unblocked: vec![AgentId::new("b"), AgentId::new("c")],
        stranded: vec![AgentId::new("d")],
        delivered: false,
    };
    let text = format_completion("Completed", &done);
    assert_eq!(
        text,
        "Completed a task a\n  unblocked: b, c\n  still blocked: d (run `ctm repair`)\n  consolidation not delivered; see ctm.log\n"
    );
}

#[test]
#[serial]
fn delivered_completion_is_one_line() {
    plain();
    let a = agent("a");
    let done = Completion {
        event: Some(ConsolidationEvent::from_agent(&a, T0)),
        agent: versioned(a),
        unblocked: Vec::new(),
        stranded: Vec::new(),
        delivered: true,
    };
    assert_eq!(format_completion("Completed", &done), "Completed a task a\n");
}
