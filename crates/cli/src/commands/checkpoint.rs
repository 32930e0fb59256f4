// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ctm checkpoint`, `ctm restore` and `ctm repair`.

use std::fmt::Write as _;

use anyhow::Result;
use clap::{Args, Subcommand};
use ctm_core::AgentId;
use ctm_engine::{RepairOptions, RepairReport};
use ctm_storage::{CheckpointInfo, CheckpointSelector};

use super::Ctx;
use crate::color;
use crate::exit_error::ExitError;
use crate::output::{format_time_ago, print_json, print_prune_results, OutputFormat};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct CheckpointArgs {
    #[command(subcommand)]
    pub command: Option<CheckpointCommand>,
    /// Label stored in the manifest
    #[arg(long, default_value = "manual")]
    pub reason: String,
}

#[derive(Subcommand)]
pub enum CheckpointCommand {
    /// List checkpoints, newest first
    List,
    /// Delete all but the newest checkpoints
    Prune {
        /// How many to keep (default from config)
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[derive(Args)]
pub struct RepairArgs {
    /// Quarantine corrupt documents that cannot be restored
    #[arg(long)]
    pub drop_corrupt: bool,
    /// Do not restore corrupt documents from checkpoints
    #[arg(long)]
    pub no_restore: bool,
}

pub fn checkpoint(ctx: &Ctx, args: CheckpointArgs) -> Result<()> {
    match args.command {
        None => {
            let info = ctx.tm.checkpoint(&args.reason)?;
            match ctx.format {
                OutputFormat::Text => println!(
                    "Checkpoint {} ({} agent(s))",
                    info.id(),
                    info.manifest.agents.len()
                ),
                OutputFormat::Json => print_json(&info.manifest)?,
            }
        }
        Some(CheckpointCommand::List) => {
            let list = ctx.tm.list_checkpoints()?;
            match ctx.format {
                OutputFormat::Json => {
                    let manifests: Vec<_> = list.iter().map(|c| &c.manifest).collect();
                    print_json(&manifests)?;
                }
                OutputFormat::Text => {
                    if list.is_empty() {
                        println!("No checkpoints");
                        return Ok(());
                    }
                    let mut table = Table::new(vec![
                        Column::left("ID"),
                        Column::left("AGE"),
                        Column::right("AGENTS"),
                        Column::muted("REASON"),
                    ]);
                    let now = ctx.now_ms();
                    for info in &list {
                        table.row(checkpoint_row(info, now));
                    }
                    table.render(&mut std::io::stdout());
                }
            }
        }
        Some(CheckpointCommand::Prune { keep }) => {
            let keep = keep.unwrap_or(ctx.tm.config().checkpoints.keep_last);
            let removed = ctx.tm.prune_checkpoints(keep)?;
            let kept = ctx.tm.list_checkpoints()?.len();
            print_prune_results(&removed, kept, ctx.format)?;
        }
    }
    Ok(())
}

pub fn restore(ctx: &Ctx, id: Option<&str>, yes: bool) -> Result<()> {
    let selector = CheckpointSelector::from_arg(id);
    let report = ctx.tm.restore(&selector, yes)?;
    match ctx.format {
        OutputFormat::Text => {
            println!(
                "Restored checkpoint {} ({} agent(s))",
                report.checkpoint.id(),
                report.restored.len()
            );
            if !report.discarded.is_empty() {
                println!("  discarded: {}", join_ids(&report.discarded));
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "checkpoint": report.checkpoint.manifest,
            "restored": report.restored,
            "discarded": report.discarded,
        }))?,
    }
    Ok(())
}

pub fn repair(ctx: &Ctx, args: RepairArgs) -> Result<()> {
    let report = ctx.tm.repair(RepairOptions {
        restore_corrupt: !args.no_restore,
        drop_corrupt: args.drop_corrupt,
    })?;
    match ctx.format {
        OutputFormat::Text => print!("{}", format_repair(&report)),
        OutputFormat::Json => print_json(&report)?,
    }
    if !report.is_recoverable() {
        return Err(ExitError::new(
            1,
            format!(
                "{} corrupt document(s) could not be recovered; rerun with --drop-corrupt to quarantine them",
                report.unresolved.len()
            ),
        )
        .into());
    }
    Ok(())
}

pub(crate) fn checkpoint_row(info: &CheckpointInfo, now_ms: u64) -> Vec<String> {
    vec![
        info.id().to_string(),
        format_time_ago(info.manifest.created_at_ms, now_ms),
        info.manifest.agents.len().to_string(),
        info.manifest.reason.clone(),
    ]
}

pub(crate) fn format_repair(report: &RepairReport) -> String {
    let mut out = String::new();
    if let Some(id) = &report.checkpoint {
        let _ = writeln!(out, "{}", color::muted(&format!("checkpoint {id}")));
    }
    if report.is_clean() {
        let _ = writeln!(out, "Nothing to repair ({} agent(s) indexed)", report.indexed);
        return out;
    }
    for (id, checkpoint) in &report.restored {
        let _ = writeln!(out, "restored   {id} from {checkpoint}");
    }
    for id in &report.quarantined {
        let _ = writeln!(out, "dropped    {id} (corrupt)");
    }
    for id in &report.unresolved {
        let _ = writeln!(out, "{}    {id}", color::status("corrupt"));
    }
    for (id, blocker) in &report.dangling {
        let _ = writeln!(out, "unblocked  {id} (blocker {blocker} gone or finished)");
    }
    for (id, blocker) in &report.cycles_broken {
        let _ = writeln!(out, "unblocked  {id} (cycle through {blocker})");
    }
    for fix in &report.status_fixed {
        let _ = writeln!(out, "status     {} {} -> {}", fix.id, fix.from, fix.to);
    }
    for id in &report.demoted {
        let _ = writeln!(out, "paused     {id} (second active agent in lane)");
    }
    for id in &report.mirrors_fixed {
        let _ = writeln!(out, "mirror     {id}");
    }
    let _ = writeln!(out, "{} agent(s) indexed", report.indexed);
    out
}

fn join_ids(ids: &[AgentId]) -> String {
    ids.iter().map(AgentId::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
