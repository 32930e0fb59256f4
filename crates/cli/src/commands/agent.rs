// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands that create or change a single agent.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use ctm_core::{format_ago, format_deadline, Agent, AgentId, NewAgent, PriorityLevel};
use ctm_engine::{AgentView, Completion, NoteKind};
use ctm_storage::{AgentPatch, Change, Mutation, Versioned};

use super::Ctx;
use crate::color;
use crate::exit_error::{ExitError, VALIDATION};
use crate::output::{format_score, parse_duration, print_json, OutputFormat};

#[derive(Args)]
pub struct SpawnArgs {
    /// What the agent is for
    pub title: String,
    /// Priority level: low, medium, high or critical
    #[arg(long, short = 'p', default_value = "medium")]
    pub priority: PriorityLevel,
    /// Agent this one waits on (repeatable)
    #[arg(long = "blocked-by", value_name = "ID")]
    pub blocked_by: Vec<String>,
    #[arg(long)]
    pub goal: Option<String>,
    /// Acceptance criterion (repeatable)
    #[arg(long = "criterion", value_name = "TEXT")]
    pub criteria: Vec<String>,
    /// Key file (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,
    /// Explicit urgency in 0..=1
    #[arg(long)]
    pub urgency: Option<f64>,
    /// Estimated value in 0..=1
    #[arg(long)]
    pub value: Option<f64>,
    /// RFC 3339 time, or an offset from now such as `2h`, `+3d` or `-1h`
    #[arg(long, allow_hyphen_values = true)]
    pub deadline: Option<String>,
    /// Enter the queue paused instead of taking focus
    #[arg(long)]
    pub queued: bool,
}

#[derive(Args)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub goal: Option<String>,
    /// Add an acceptance criterion (repeatable)
    #[arg(long = "criterion", value_name = "TEXT")]
    pub criteria: Vec<String>,
    /// Add a key file (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,
    #[arg(long, short = 'p')]
    pub priority: Option<PriorityLevel>,
    #[arg(long)]
    pub urgency: Option<f64>,
    #[arg(long)]
    pub value: Option<f64>,
    /// RFC 3339 time, an offset from now, or `none` to clear
    #[arg(long, allow_hyphen_values = true)]
    pub deadline: Option<String>,
    /// Move to another lane (the agent must not be active)
    #[arg(long = "move-to", value_name = "LANE")]
    pub move_to: Option<String>,
    /// Fail instead of retrying if the document is no longer at this version
    #[arg(long = "expect-version", value_name = "N")]
    pub expect_version: Option<u64>,
}

#[derive(Args)]
pub struct NoteArgs {
    pub id: String,
    /// Record a decision
    #[arg(long, conflicts_with = "learning", required_unless_present = "learning")]
    pub decision: Option<String>,
    /// Record a learning
    #[arg(long)]
    pub learning: Option<String>,
}

pub fn spawn(ctx: &Ctx, args: SpawnArgs) -> Result<()> {
    let mut new = NewAgent::new(args.title)
        .level(args.priority)
        .lane(ctx.lane.clone());
    if let Some(goal) = args.goal {
        new = new.goal(goal);
    }
    for criterion in args.criteria {
        new = new.criterion(criterion);
    }
    for file in args.files {
        new = new.key_file(file);
    }
    if let Some(project) = ctx.project() {
        new = new.project(project);
    }
    if let Some(u) = args.urgency {
        new = new.urgency(unit(u, "urgency")?);
    }
    if let Some(v) = args.value {
        new = new.value(unit(v, "value")?);
    }
    if let Some(when) = args.deadline {
        new = new.deadline_ms(deadline(&when, ctx.now_ms())?);
    }
    for prefix in &args.blocked_by {
        let blocker = ctx.tm.resolve(prefix).map_err(ExitError::from_validation)?;
        new = new.blocked_by(blocker);
    }
    if args.queued {
        new = new.queued();
    }

    let doc = ctx.tm.spawn(new).map_err(ExitError::from_validation)?;
    match ctx.format {
        OutputFormat::Text => println!(
            "Spawned {} {} ({})",
            doc.data.id,
            doc.data.title(),
            color::status(doc.data.status().as_str())
        ),
        OutputFormat::Json => print_json(&doc)?,
    }
    Ok(())
}

pub fn switch(ctx: &Ctx, id: &str) -> Result<()> {
    let id = ctx.id(id)?;
    let switched = ctx.tm.switch(&id)?;
    match ctx.format {
        OutputFormat::Text => {
            println!("Switched to {} {}", id, switched.agent.data.title());
            for paused in &switched.demoted {
                println!("  paused {}", color::muted(paused.as_str()));
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "agent": switched.agent,
            "paused": switched.demoted,
        }))?,
    }
    Ok(())
}

pub fn pause(ctx: &Ctx, id: Option<&str>) -> Result<()> {
    let id = ctx.target(id)?;
    let m = ctx.tm.pause(&id)?;
    print_mutation(ctx.format, "Paused", &m)
}

pub fn complete(ctx: &Ctx, id: Option<&str>) -> Result<()> {
    let id = ctx.target(id)?;
    let done = ctx.tm.complete(&id)?;
    print_completion(ctx.format, "Completed", &done)
}

pub fn cancel(ctx: &Ctx, id: &str) -> Result<()> {
    let id = ctx.id(id)?;
    let done = ctx.tm.cancel(&id)?;
    print_completion(ctx.format, "Cancelled", &done)
}

pub fn block(ctx: &Ctx, id: &str, on: &str) -> Result<()> {
    let id = ctx.id(id)?;
    let blocker = ctx.id(on)?;
    let m = ctx.tm.block(&id, &blocker).map_err(ExitError::from_validation)?;
    print_mutation(ctx.format, "Blocked", &m)
}

pub fn unblock(ctx: &Ctx, id: &str, from: &str) -> Result<()> {
    let id = ctx.id(id)?;
    // The blocker may already be archived; fall back to the literal id.
    let blocker = ctx
        .tm
        .resolve(from)
        .unwrap_or_else(|_| AgentId::new(from));
    let m = ctx.tm.unblock(&id, &blocker)?;
    print_mutation(ctx.format, "Unblocked", &m)
}

pub fn edit(ctx: &Ctx, args: EditArgs) -> Result<()> {
    let id = ctx.id(&args.id)?;
    let mut patch = AgentPatch::new();
    if let Some(title) = args.title {
        patch.push(Change::Title(title));
    }
    if let Some(goal) = args.goal {
        patch.push(Change::Goal(goal));
    }
    for criterion in args.criteria {
        patch.push(Change::Criterion(criterion));
    }
    for file in args.files {
        patch.push(Change::KeyFile(file));
    }
    if let Some(level) = args.priority {
        patch.push(Change::Level(level));
    }
    if let Some(u) = args.urgency {
        patch.push(Change::Urgency(unit(u, "urgency")?));
    }
    if let Some(v) = args.value {
        patch.push(Change::Value(unit(v, "value")?));
    }
    if let Some(when) = args.deadline {
        let at = match when.as_str() {
            "none" => None,
            _ => Some(deadline(&when, ctx.now_ms())?),
        };
        patch.push(Change::Deadline(at));
    }
    if let Some(lane) = args.move_to {
        patch.push(Change::Lane(lane));
    }
    if patch.is_empty() {
        return Err(ExitError::new(VALIDATION, "nothing to change").into());
    }
    let m = ctx
        .tm
        .edit(&id, args.expect_version, &patch)
        .map_err(ExitError::from_validation)?;
    print_mutation(ctx.format, "Updated", &m)
}

pub fn note(ctx: &Ctx, args: NoteArgs) -> Result<()> {
    let id = ctx.id(&args.id)?;
    let (kind, text) = match (args.decision, args.learning) {
        (Some(text), _) => (NoteKind::Decision, text),
        (None, Some(text)) => (NoteKind::Learning, text),
        (None, None) => return Err(ExitError::new(VALIDATION, "--decision or --learning is required").into()),
    };
    let m = ctx
        .tm
        .note(&id, kind, &text)
        .map_err(ExitError::from_validation)?;
    let label = match kind {
        NoteKind::Decision => "Decision recorded for",
        NoteKind::Learning => "Learning recorded for",
    };
    print_mutation(ctx.format, label, &m)
}

pub fn progress(ctx: &Ctx, id: &str, pct: u8, step: Option<&str>) -> Result<()> {
    let id = ctx.id(id)?;
    let m = ctx
        .tm
        .progress(&id, pct, step)
        .map_err(ExitError::from_validation)?;
    match ctx.format {
        OutputFormat::Text => println!(
            "{} {}% {}",
            id,
            m.doc.data.state.progress_pct,
            m.doc.data.state.current_step
        ),
        OutputFormat::Json => print_json(&m.doc)?,
    }
    Ok(())
}

pub fn fail(ctx: &Ctx, id: &str) -> Result<()> {
    let id = ctx.id(id)?;
    let m = ctx.tm.fail(&id)?;
    match ctx.format {
        OutputFormat::Text => println!(
            "{} has {} recent failure(s)",
            id, m.doc.data.state.recent_failures
        ),
        OutputFormat::Json => print_json(&m.doc)?,
    }
    Ok(())
}

pub fn show(ctx: &Ctx, id: &str) -> Result<()> {
    let id = ctx.id(id)?;
    let view = ctx.tm.show(&id, ctx.project())?;
    match ctx.format {
        OutputFormat::Text => print!("{}", format_view(&view, ctx.now_ms())),
        OutputFormat::Json => print_json(&view)?,
    }
    Ok(())
}

pub fn archive(ctx: &Ctx, id: &str) -> Result<()> {
    let id = ctx.id(id)?;
    let doc = ctx.tm.archive(&id)?;
    match ctx.format {
        OutputFormat::Text => println!("Archived {} {}", id, doc.data.title()),
        OutputFormat::Json => print_json(&doc)?,
    }
    Ok(())
}

fn print_mutation(format: OutputFormat, label: &str, m: &Mutation) -> Result<()> {
    match format {
        OutputFormat::Text => println!(
            "{label} {} ({})",
            m.doc.data.id,
            color::status(m.doc.data.status().as_str())
        ),
        OutputFormat::Json => print_json(&m.doc)?,
    }
    Ok(())
}

fn print_completion(format: OutputFormat, label: &str, done: &Completion) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", format_completion(label, done)),
        OutputFormat::Json => print_json(done)?,
    }
    Ok(())
}

pub(crate) fn format_completion(label: &str, done: &Completion) -> String {
    let mut out = String::new();
    let agent = &done.agent.data;
    let _ = writeln!(out, "{label} {} {}", agent.id, agent.title());
    if !done.unblocked.is_empty() {
        let _ = writeln!(out, "  unblocked: {}", join_ids(&done.unblocked));
    }
    if !done.stranded.is_empty() {
        let _ = writeln!(
            out,
            "  {} {} (run `ctm repair`)",
            color::yellow("still blocked:"),
            join_ids(&done.stranded)
        );
    }
    if done.event.is_some() && !done.delivered {
        let _ = writeln!(
            out,
            "  {}",
            color::yellow("consolidation not delivered; see ctm.log")
        );
    }
    out
}

/// Multi-line text rendering for `ctm show`.
pub(crate) fn format_view(view: &AgentView, now_ms: u64) -> String {
    let doc: &Versioned<Agent> = &view.agent;
    let agent = &doc.data;
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", color::header(agent.id.as_str()), agent.title());
    let _ = writeln!(
        out,
        "  status:    {} (lane {})",
        color::status(agent.status().as_str()),
        agent.lane
    );
    let _ = writeln!(
        out,
        "  priority:  {}  score {}  {}",
        agent.priority.level,
        format_score(view.score),
        view.breakdown.tier.as_str()
    );
    let b = &view.breakdown;
    let _ = writeln!(
        out,
        "  {}",
        color::muted(&format!(
            "urgency {:.2}  recency {:.2}  value {:.2}  novelty {:.2}  signal {:.2}  errors {:.2}{}",
            b.urgency,
            b.recency,
            b.value,
            b.novelty,
            b.user_signal,
            b.error_boost,
            if b.project_match { "  +project" } else { "" }
        ))
    );
    if !agent.task.goal.is_empty() {
        let _ = writeln!(out, "  goal:      {}", agent.task.goal);
    }
    for criterion in &agent.task.acceptance_criteria {
        let _ = writeln!(out, "  [ ] {criterion}");
    }
    let _ = write!(out, "  progress:  {}%", agent.state.progress_pct);
    if !agent.state.current_step.is_empty() {
        let _ = write!(out, "  {}", agent.state.current_step);
    }
    out.push('\n');
    if agent.timing.deadline_ms.is_some() {
        let _ = writeln!(
            out,
            "  deadline:  {}",
            format_deadline(agent.timing.deadline_ms, now_ms)
        );
    }
    if let Some(project) = &agent.context.project_path {
        let _ = writeln!(out, "  project:   {}", project.display());
    }
    for file in &agent.context.key_files {
        let _ = writeln!(out, "  file:      {}", file.display());
    }
    if !agent.deps.blocked_by.is_empty() {
        let ids: Vec<AgentId> = agent.deps.blocked_by.iter().cloned().collect();
        let _ = writeln!(out, "  blocked by: {}", join_ids(&ids));
    }
    if !agent.deps.blocks.is_empty() {
        let ids: Vec<AgentId> = agent.deps.blocks.iter().cloned().collect();
        let _ = writeln!(out, "  blocks:    {}", join_ids(&ids));
    }
    for (label, entries) in [
        ("decisions", &agent.context.decisions),
        ("learnings", &agent.context.learnings),
    ] {
        if entries.is_empty() {
            continue;
        }
        let _ = writeln!(out, "  {label}:");
        for entry in entries {
            let _ = writeln!(
                out,
                "    - {} {}",
                entry.text,
                color::muted(&format!("({})", format_ago(entry.timestamp_ms, now_ms)))
            );
        }
    }
    let _ = writeln!(
        out,
        "  {}",
        color::muted(&format!(
            "version {}, modified {} by {}, {} session(s)",
            doc.version,
            format_ago(doc.last_modified_ms, now_ms),
            doc.modified_by,
            agent.timing.session_count
        ))
    );
    out
}

fn join_ids(ids: &[AgentId]) -> String {
    ids.iter().map(AgentId::as_str).collect::<Vec<_>>().join(", ")
}

fn unit(v: f64, what: &str) -> Result<f64> {
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(ExitError::new(VALIDATION, format!("{what} must be between 0 and 1")).into())
    }
}

fn deadline(input: &str, now_ms: u64) -> Result<u64> {
    parse_deadline(input, now_ms).map_err(|msg| ExitError::new(VALIDATION, msg).into())
}

/// Parse an RFC 3339 time or a signed offset from `now_ms` into epoch ms.
pub(crate) fn parse_deadline(input: &str, now_ms: u64) -> Result<u64, String> {
    let input = input.trim();
    if let Ok(at) = chrono::DateTime::parse_from_rfc3339(input) {
        return u64::try_from(at.timestamp_millis())
            .map_err(|_| format!("deadline '{input}' is before 1970"));
    }
    let (sign, rest) = match input.as_bytes().first() {
        Some(b'+') => (1, &input[1..]),
        Some(b'-') => (-1, &input[1..]),
        _ => (1, input),
    };
    let offset = parse_duration(rest)
        .map_err(|e| format!("invalid deadline '{input}': {e}"))?
        .as_millis() as u64;
    Ok(if sign < 0 {
        now_ms.saturating_sub(offset)
    } else {
        now_ms.saturating_add(offset)
    })
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
