// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed agent mutations.
//!
//! A patch is an ordered list of [`Change`]s applied to an in-memory copy of
//! the document. Status changes are checked by the state machine at the
//! point they appear, against the blockers as they stand after the earlier
//! changes. Nothing here touches disk.

use ctm_core::transition::{self, TransitionContext, TransitionEffect, TransitionError};
use ctm_core::{clamp_unit, Agent, AgentId, AgentStatus, LogEntry, PriorityLevel};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Status(AgentStatus),
    /// Active -> paused; no-op in any other status.
    Demote,
    Title(String),
    Goal(String),
    Criterion(String),
    Progress(u8),
    Step(String),
    Level(PriorityLevel),
    Urgency(f64),
    Value(f64),
    Deadline(Option<u64>),
    Lane(String),
    AddBlocker(AgentId),
    RemoveBlocker(AgentId),
    /// Remove a blocker and move blocked -> paused once none remain.
    Unblock(AgentId),
    AddDependent(AgentId),
    RemoveDependent(AgentId),
    Decision(String),
    Learning(String),
    KeyFile(PathBuf),
    Failure,
    /// Refresh `last_active` without changing status.
    Touch,
}

impl Change {
    /// Changes a terminal agent silently ignores instead of rejecting.
    fn is_inert_on_terminal(&self, status: AgentStatus) -> bool {
        match self {
            Change::Status(to) => *to == status,
            Change::Demote | Change::RemoveDependent(_) | Change::Unblock(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentPatch {
    pub changes: Vec<Change>,
}

impl AgentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn one(change: Change) -> Self {
        Self {
            changes: vec![change],
        }
    }

    pub fn with(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Status this patch requests last, if any.
    pub fn target_status(&self) -> Option<AgentStatus> {
        self.changes.iter().rev().find_map(|c| match c {
            Change::Status(s) => Some(*s),
            _ => None,
        })
    }
}

impl From<Change> for AgentPatch {
    fn from(change: Change) -> Self {
        Self::one(change)
    }
}

impl FromIterator<Change> for AgentPatch {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("{status} agents cannot be modified")]
    Terminal { status: AgentStatus },
    #[error("cannot move from {from} to {to}: {source}")]
    Illegal {
        from: AgentStatus,
        to: AgentStatus,
        source: TransitionError,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Apply `patch` to `agent` at `now_ms`, returning the collected transition effects.
///
/// On error `agent` may be partially modified; callers work on a copy.
pub fn apply_patch(
    agent: &mut Agent,
    patch: &AgentPatch,
    now_ms: u64,
) -> Result<Vec<TransitionEffect>, PatchError> {
    let mut effects = Vec::new();
    for change in &patch.changes {
        if agent.is_terminal() {
            if change.is_inert_on_terminal(agent.status()) {
                continue;
            }
            if let Change::Status(to) = change {
                return Err(illegal(agent, *to));
            }
            return Err(PatchError::Terminal {
                status: agent.status(),
            });
        }
        apply_change(agent, change, now_ms, &mut effects)?;
    }
    Ok(effects)
}

fn apply_change(
    agent: &mut Agent,
    change: &Change,
    now_ms: u64,
    effects: &mut Vec<TransitionEffect>,
) -> Result<(), PatchError> {
    match change {
        Change::Status(to) => set_status(agent, *to, now_ms, effects)?,
        Change::Demote => {
            if agent.status() == AgentStatus::Active {
                set_status(agent, AgentStatus::Paused, now_ms, effects)?;
            }
        }
        Change::Title(title) => {
            let title = title.trim();
            if title.is_empty() {
                return Err(PatchError::Invalid("title must not be empty".into()));
            }
            agent.task.title = title.to_string();
        }
        Change::Goal(goal) => agent.task.goal.clone_from(goal),
        Change::Criterion(c) => agent.task.acceptance_criteria.push(c.clone()),
        Change::Progress(pct) => {
            agent.state.progress_pct = (*pct).min(100);
            agent.state.recent_failures = 0;
        }
        Change::Step(step) => agent.state.current_step.clone_from(step),
        Change::Level(level) => agent.priority.level = *level,
        Change::Urgency(u) => agent.priority.urgency = clamp_unit(*u),
        Change::Value(v) => agent.priority.value = clamp_unit(*v),
        Change::Deadline(d) => agent.timing.deadline_ms = *d,
        Change::Lane(lane) => {
            let lane = lane.trim();
            if lane.is_empty() {
                return Err(PatchError::Invalid("lane must not be empty".into()));
            }
            agent.lane = lane.to_string();
        }
        Change::AddBlocker(blocker) => {
            if *blocker == agent.id {
                return Err(PatchError::Invalid(format!("{} cannot block itself", agent.id)));
            }
            agent.deps.blocked_by.insert(blocker.clone());
        }
        Change::RemoveBlocker(blocker) => {
            agent.deps.blocked_by.remove(blocker);
        }
        Change::Unblock(blocker) => {
            agent.deps.blocked_by.remove(blocker);
            if agent.status() == AgentStatus::Blocked && agent.deps.blocked_by.is_empty() {
                set_status(agent, AgentStatus::Paused, now_ms, effects)?;
            }
        }
        Change::AddDependent(dep) => {
            agent.deps.blocks.insert(dep.clone());
        }
        Change::RemoveDependent(dep) => {
            agent.deps.blocks.remove(dep);
        }
        Change::Decision(text) => agent.context.decisions.push(LogEntry {
            text: text.clone(),
            timestamp_ms: now_ms,
        }),
        Change::Learning(text) => agent.context.learnings.push(LogEntry {
            text: text.clone(),
            timestamp_ms: now_ms,
        }),
        Change::KeyFile(path) => {
            if !agent.context.key_files.contains(path) {
                agent.context.key_files.push(path.clone());
            }
        }
        Change::Failure => agent.state.recent_failures = agent.state.recent_failures.saturating_add(1),
        Change::Touch => agent.timing.last_active_ms = now_ms,
    }
    Ok(())
}

fn set_status(
    agent: &mut Agent,
    to: AgentStatus,
    now_ms: u64,
    effects: &mut Vec<TransitionEffect>,
) -> Result<(), PatchError> {
    let ctx = TransitionContext {
        has_blockers: !agent.deps.blocked_by.is_empty(),
    };
    let found = transition::validate(agent.status(), to, &ctx).map_err(|source| PatchError::Illegal {
        from: agent.status(),
        to,
        source,
    })?;
    for effect in &found {
        if *effect == TransitionEffect::Touch {
            agent.timing.last_active_ms = now_ms;
            agent.timing.session_count = agent.timing.session_count.saturating_add(1);
        }
    }
    agent.state.status = to;
    effects.extend(found);
    Ok(())
}

fn illegal(agent: &Agent, to: AgentStatus) -> PatchError {
    let from = agent.status();
    match transition::validate(from, to, &TransitionContext::default()) {
        Err(source) => PatchError::Illegal { from, to, source },
        Ok(_) => PatchError::Terminal { status: from },
    }
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
