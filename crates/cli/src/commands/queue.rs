// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ctm queue`, `ctm list` and `ctm impact`: read-only tabular views.

use anyhow::Result;
use ctm_core::{format_deadline, Agent, AgentStatus};
use ctm_engine::{Impact, QueueEntry};
use ctm_storage::{AgentFilter, Versioned};

use super::Ctx;
use crate::output::{format_score, format_time_ago, print_json, OutputFormat};
use crate::table::{project_cell, should_show_project, Column, Table};

pub fn queue(ctx: &Ctx) -> Result<()> {
    let entries = ctx.tm.queue(ctx.project())?;
    match ctx.format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("Queue is empty");
                return Ok(());
            }
            let show_project = should_show_project(
                entries
                    .iter()
                    .map(|e| e.agent.data.context.project_path.as_deref()),
            );
            let mut table = Table::new(queue_columns(show_project));
            let now = ctx.now_ms();
            for (rank, entry) in entries.iter().enumerate() {
                table.row(queue_row(rank + 1, entry, now, show_project));
            }
            table.render(&mut std::io::stdout());
        }
    }
    Ok(())
}

pub fn list(ctx: &Ctx, status: Option<AgentStatus>, all: bool) -> Result<()> {
    let filter = match status {
        Some(status) => AgentFilter::status(status),
        None if all => AgentFilter::all(),
        None => AgentFilter::default(),
    };
    let mut docs = ctx.tm.list(&filter)?;
    docs.sort_by(|a, b| {
        b.data
            .timing
            .last_active_ms
            .cmp(&a.data.timing.last_active_ms)
            .then_with(|| a.data.id.cmp(&b.data.id))
    });
    match ctx.format {
        OutputFormat::Json => print_json(&docs)?,
        OutputFormat::Text => {
            if docs.is_empty() {
                println!("No agents");
                return Ok(());
            }
            let mut table = Table::new(list_columns());
            let now = ctx.now_ms();
            for doc in &docs {
                table.row(list_row(doc, now));
            }
            table.render(&mut std::io::stdout());
        }
    }
    Ok(())
}

pub fn impact(ctx: &Ctx) -> Result<()> {
    let nodes = ctx.tm.high_impact()?;
    match ctx.format {
        OutputFormat::Json => print_json(&nodes)?,
        OutputFormat::Text => {
            if nodes.is_empty() {
                println!("Nothing is blocking anything");
                return Ok(());
            }
            let mut table = Table::new(vec![
                Column::muted("ID"),
                Column::right("BLOCKING"),
                Column::status("STATUS"),
                Column::left("TITLE"),
            ]);
            for node in &nodes {
                table.row(impact_row(node));
            }
            table.render(&mut std::io::stdout());
        }
    }
    Ok(())
}

pub(crate) fn queue_columns(show_project: bool) -> Vec<Column> {
    let mut columns = vec![
        Column::right("#"),
        Column::id(),
        Column::right("SCORE"),
        Column::left("PRIORITY"),
        Column::status("STATUS"),
        Column::left("DEADLINE"),
    ];
    if show_project {
        columns.push(Column::left("PROJECT").with_max(32));
    }
    columns.push(Column::left("TITLE"));
    columns
}

pub(crate) fn queue_row(rank: usize, entry: &QueueEntry, now_ms: u64, show_project: bool) -> Vec<String> {
    let agent = &entry.agent.data;
    let mut row = vec![
        rank.to_string(),
        agent.id.to_string(),
        format_score(entry.score),
        agent.priority.level.to_string(),
        agent.status().to_string(),
        format_deadline(agent.timing.deadline_ms, now_ms),
    ];
    if show_project {
        row.push(project_cell(agent.context.project_path.as_deref()));
    }
    row.push(agent.title().to_string());
    row
}

pub(crate) fn list_columns() -> Vec<Column> {
    vec![
        Column::id(),
        Column::status("STATUS"),
        Column::left("LANE"),
        Column::left("PRIORITY"),
        Column::right("PROGRESS"),
        Column::left("ACTIVE"),
        Column::left("TITLE"),
    ]
}

pub(crate) fn list_row(doc: &Versioned<Agent>, now_ms: u64) -> Vec<String> {
    let agent = &doc.data;
    let status = match agent.status() {
        AgentStatus::Blocked => format!("blocked ({})", agent.deps.blocked_by.len()),
        other => other.to_string(),
    };
    vec![
        agent.id.to_string(),
        status,
        agent.lane.clone(),
        agent.priority.level.to_string(),
        format!("{}%", agent.state.progress_pct),
        format_time_ago(agent.timing.last_active_ms, now_ms),
        agent.title().to_string(),
    ]
}

pub(crate) fn impact_row(node: &Impact) -> Vec<String> {
    vec![
        node.id.to_string(),
        node.blocking.to_string(),
        node.status
            .map_or_else(|| "missing".to_string(), |s| s.to_string()),
        node.title.clone(),
    ]
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
