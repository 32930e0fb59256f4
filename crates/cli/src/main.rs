// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ctm - persistent task scheduler for multi-session agents

mod color;
mod commands;
mod env;
mod exit_error;
mod output;
mod table;

use output::OutputFormat;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use commands::{agent, checkpoint, mail, queue, Ctx};
use ctm_core::{AgentStatus, DEFAULT_LANE};
use ctm_storage::StoreLayout;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "ctm",
    version,
    about = "Persistent task scheduler for multi-session agents",
    styles = color::styles()
)]
struct Cli {
    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    /// State directory [default: $CTM_STATE_DIR, $XDG_STATE_HOME/ctm, ~/.local/state/ctm]
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Project you are working in; matching agents rank higher [env: CTM_PROJECT]
    #[arg(long, global = true, value_name = "PATH")]
    project: Option<PathBuf>,

    /// Focus lane [env: CTM_LANE, default: default]
    #[arg(long, global = true)]
    lane: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an agent
    Spawn(agent::SpawnArgs),
    /// Give an agent focus, pausing the active one
    Switch { id: String },
    /// Pause an agent (default: the active one)
    Pause { id: Option<String> },
    /// Complete an agent (default: the active one) and unblock its dependents
    Complete { id: Option<String> },
    /// Cancel an agent and unblock its dependents
    Cancel { id: String },
    /// Make an agent wait on another
    Block {
        id: String,
        #[arg(long, value_name = "ID")]
        on: String,
    },
    /// Stop an agent waiting on another
    Unblock {
        id: String,
        #[arg(long, value_name = "ID")]
        from: String,
    },
    /// Change an agent's fields
    Edit(agent::EditArgs),
    /// Record a decision or a learning
    Note(agent::NoteArgs),
    /// Report progress
    Progress {
        id: String,
        /// Percent complete, 0-100
        pct: u8,
        #[arg(long)]
        step: Option<String>,
    },
    /// Record a failed attempt
    Fail { id: String },
    /// Show one agent
    Show { id: String },
    /// Move a finished agent out of the live set
    Archive { id: String },
    /// Schedulable agents in priority order
    Queue,
    /// List agents
    List {
        #[arg(long)]
        status: Option<AgentStatus>,
        /// Include completed and cancelled agents
        #[arg(long)]
        all: bool,
    },
    /// Agents blocking the most others
    Impact,
    /// Capture, list or prune checkpoints
    Checkpoint(checkpoint::CheckpointArgs),
    /// Replace all agent state with a checkpoint (default: latest)
    Restore {
        id: Option<String>,
        /// Confirm the destructive restore
        #[arg(long)]
        yes: bool,
    },
    /// Validate and fix derived state
    Repair(checkpoint::RepairArgs),
    /// Messages between sessions
    Mail(mail::MailArgs),
}

impl Commands {
    /// Commands that write agent documents.
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Spawn(_)
                | Commands::Switch { .. }
                | Commands::Pause { .. }
                | Commands::Complete { .. }
                | Commands::Cancel { .. }
                | Commands::Block { .. }
                | Commands::Unblock { .. }
                | Commands::Edit(_)
                | Commands::Note(_)
                | Commands::Progress { .. }
                | Commands::Fail { .. }
                | Commands::Archive { .. }
        )
    }
}

fn main() {
    if let Err(e) = run() {
        let code = e
            .downcast_ref::<exit_error::ExitError>()
            .map_or(1, |c| c.code);
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(code);
    }
}

/// Format an anyhow error, deduplicating the chain.
///
/// If the top-level Display already contains the source error text, we skip
/// the "Caused by" chain to avoid noisy duplicate output (common when
/// thiserror variants use `#[error("... {0}")]` with `#[from]`).
/// Otherwise we render the full chain so context isn't lost.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));

    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            // No subcommand: print help and exit 0
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
    };

    let state_dir = env::state_dir(cli.state_dir)
        .context("cannot determine state directory; set CTM_STATE_DIR or pass --state-dir")?;
    let layout = StoreLayout::new(&state_dir);
    let _guard = setup_logging(&layout.log_path())?;

    let lane = cli
        .lane
        .or_else(env::lane)
        .unwrap_or_else(|| DEFAULT_LANE.to_string());
    let project = cli.project.or_else(env::project);
    let ctx = Ctx::open(layout, format, lane, project)?;

    let mutates = command.mutates();
    dispatch(&ctx, command)?;

    if mutates {
        match ctx.tm.maybe_checkpoint() {
            Ok(Some(info)) => tracing::info!(checkpoint = info.id(), "cadence checkpoint"),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "cadence checkpoint failed"),
        }
    }
    Ok(())
}

fn dispatch(ctx: &Ctx, command: Commands) -> Result<()> {
    match command {
        Commands::Spawn(args) => agent::spawn(ctx, args),
        Commands::Switch { id } => agent::switch(ctx, &id),
        Commands::Pause { id } => agent::pause(ctx, id.as_deref()),
        Commands::Complete { id } => agent::complete(ctx, id.as_deref()),
        Commands::Cancel { id } => agent::cancel(ctx, &id),
        Commands::Block { id, on } => agent::block(ctx, &id, &on),
        Commands::Unblock { id, from } => agent::unblock(ctx, &id, &from),
        Commands::Edit(args) => agent::edit(ctx, args),
        Commands::Note(args) => agent::note(ctx, args),
        Commands::Progress { id, pct, step } => agent::progress(ctx, &id, pct, step.as_deref()),
        Commands::Fail { id } => agent::fail(ctx, &id),
        Commands::Show { id } => agent::show(ctx, &id),
        Commands::Archive { id } => agent::archive(ctx, &id),
        Commands::Queue => queue::queue(ctx),
        Commands::List { status, all } => queue::list(ctx, status, all),
        Commands::Impact => queue::impact(ctx),
        Commands::Checkpoint(args) => checkpoint::checkpoint(ctx, args),
        Commands::Restore { id, yes } => checkpoint::restore(ctx, id.as_deref(), yes),
        Commands::Repair(args) => checkpoint::repair(ctx, args),
        Commands::Mail(args) => mail::mail(ctx, args),
    }
}

/// Log to `<state_dir>/ctm.log`; stdout stays reserved for command output.
fn setup_logging(log_path: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = log_path
        .parent()
        .context("log path has no parent directory")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create state directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::never(
        dir,
        log_path.file_name().context("log path has no file name")?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
