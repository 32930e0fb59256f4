// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctm_core::test_support::{agent_at, T0};
use ctm_core::{AgentId, ScoreBreakdown, ScoreConfig, ScoreContext};
use std::path::PathBuf;

const HOUR_MS: u64 = 3_600_000;

fn doc(agent: Agent) -> Versioned<Agent> {
    Versioned {
        version: 1,
        last_modified_ms: T0,
        modified_by: "test".into(),
        data: agent,
    }
}

fn entry(agent: Agent) -> QueueEntry {
    let cfg = ScoreConfig::default();
    let breakdown = ScoreBreakdown::of(&agent, &cfg, &ScoreContext::at(T0));
    QueueEntry {
        score: breakdown.total(&cfg),
        breakdown,
        tier: None,
        agent: doc(agent),
    }
}

#[test]
fn queue_row_carries_rank_score_and_deadline() {
    let mut a = agent_at("a", T0);
    a.timing.deadline_ms = Some(T0 - HOUR_MS);
    let e = entry(a);
    let row = queue_row(1, &e, T0, false);
    assert_eq!(row.len(), queue_columns(false).len());
    assert_eq!(row[0], "1");
    assert_eq!(row[1], "a");
    assert_eq!(row[2], format_score(e.score));
    assert_eq!(row[3], "medium");
    assert_eq!(row[4], "active");
    assert_eq!(row[5], "1h overdue");
    assert_eq!(row[6], "task a");
}

#[test]
fn project_column_is_inserted_before_title() {
    let mut a = agent_at("a", T0);
    a.context.project_path = Some(PathBuf::from("/work/app"));
    let row = queue_row(2, &entry(a), T0, true);
    assert_eq!(row.len(), queue_columns(true).len());
    assert_eq!(row[6], "/work/app");
    assert_eq!(row[7], "task a");
}

#[test]
fn list_row_counts_blockers() {
    let mut a = agent_at("a", T0 - 2 * 60_000);
    a.state.status = AgentStatus::Blocked;
    a.deps.blocked_by.insert(AgentId::new("x"));
    a.deps.blocked_by.insert(AgentId::new("y"));
    a.state.progress_pct = 25;
    let row = list_row(&doc(a), T0);
    assert_eq!(row.len(), list_columns().len());
    assert_eq!(row[1], "blocked (2)");
    assert_eq!(row[2], "default");
    assert_eq!(row[4], "25%");
    assert_eq!(row[5], "2m ago");
}

#[test]
fn impact_row_marks_missing_blockers() {
    let node = Impact {
        id: AgentId::new("gone"),
        title: String::new(),
        status: None,
        blocking: 3,
    };
    assert_eq!(impact_row(&node), vec!["gone", "3", "missing", ""]);
}
