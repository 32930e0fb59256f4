// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent: the persisted task-context record.
//!
//! An agent is one unit of work the scheduler ranks and the state machine
//! governs. Field groups mirror the on-disk JSON layout; the version triple
//! (`_version`, `_last_modified`, `_modified_by`) is not part of this type but
//! of the storage envelope that wraps every persisted document.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub use crate::id::AgentId;

/// Lane used when none is specified.
pub const DEFAULT_LANE: &str = "default";

fn default_lane() -> String {
    DEFAULT_LANE.to_string()
}

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Paused,
    Blocked,
    Completed,
    Cancelled,
}

impl AgentStatus {
    pub const ALL: [AgentStatus; 5] = [
        AgentStatus::Active,
        AgentStatus::Paused,
        AgentStatus::Blocked,
        AgentStatus::Completed,
        AgentStatus::Cancelled,
    ];

    /// Completed and cancelled agents accept no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Cancelled)
    }

    /// Statuses that appear in the scheduler queue.
    pub fn is_schedulable(self) -> bool {
        matches!(self, AgentStatus::Active | AgentStatus::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Paused => "paused",
            AgentStatus::Blocked => "blocked",
            AgentStatus::Completed => "completed",
            AgentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a status or priority level from user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for AgentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// User-assigned priority level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 4] = [
        PriorityLevel::Low,
        PriorityLevel::Medium,
        PriorityLevel::High,
        PriorityLevel::Critical,
    ];

    /// Normalized user signal fed into the scheduler (0.25 .. 1.0).
    pub fn user_signal(self) -> f64 {
        match self {
            PriorityLevel::Low => 0.25,
            PriorityLevel::Medium => 0.5,
            PriorityLevel::High => 0.75,
            PriorityLevel::Critical => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PriorityLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

/// Timestamped entry in an append-only log (decisions, learnings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub text: String,
    pub timestamp_ms: u64,
}

/// What the agent is for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

/// Working context accumulated while the agent is worked on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    #[serde(default)]
    pub key_files: Vec<PathBuf>,
    #[serde(default)]
    pub decisions: Vec<LogEntry>,
    #[serde(default)]
    pub learnings: Vec<LogEntry>,
}

/// Lifecycle state, governed by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub status: AgentStatus,
    #[serde(default)]
    pub progress_pct: u8,
    #[serde(default)]
    pub current_step: String,
    /// Failures recorded since the last successful progress update.
    #[serde(default)]
    pub recent_failures: u32,
}

/// Scheduling inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Priority {
    #[serde(default)]
    pub level: PriorityLevel,
    /// Manual urgency (0.0 .. 1.0); deadlines can push effective urgency higher.
    #[serde(default)]
    pub urgency: f64,
    /// Estimated value (0.0 .. 1.0).
    #[serde(default = "default_value")]
    pub value: f64,
    /// Read-time projection of the scheduler score. Never persisted.
    #[serde(skip)]
    pub computed_score: Option<f64>,
}

fn default_value() -> f64 {
    0.5
}

impl Default for Priority {
    fn default() -> Self {
        Self {
            level: PriorityLevel::default(),
            urgency: 0.0,
            value: default_value(),
            computed_score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub created_at_ms: u64,
    pub last_active_ms: u64,
    #[serde(default)]
    pub session_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

/// Blocking relationships. `blocked_by` is authoritative; `blocks` mirrors it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub blocked_by: BTreeSet<AgentId>,
    #[serde(default)]
    pub blocks: BTreeSet<AgentId>,
}

/// A persisted task context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// Session lane; at most one agent per lane is active.
    #[serde(default = "default_lane")]
    pub lane: String,
    pub task: Task,
    #[serde(default)]
    pub context: Context,
    pub state: State,
    #[serde(default)]
    pub priority: Priority,
    pub timing: Timing,
    #[serde(default)]
    pub deps: Dependencies,
    /// Unknown fields, preserved verbatim across rewrites.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Agent {
    pub fn status(&self) -> AgentStatus {
        self.state.status
    }

    pub fn is_terminal(&self) -> bool {
        self.state.status.is_terminal()
    }

    pub fn title(&self) -> &str {
        &self.task.title
    }
}

impl AsRef<Agent> for Agent {
    fn as_ref(&self) -> &Agent {
        self
    }
}

/// How a freshly spawned agent without blockers starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    /// Take focus in its lane, pausing whatever was active.
    #[default]
    Active,
    /// Enter the queue as paused.
    Queued,
}

/// Fields supplied when spawning an agent.
#[derive(Debug, Clone, Default)]
pub struct NewAgent {
    pub title: String,
    pub goal: String,
    pub acceptance_criteria: Vec<String>,
    pub project_path: Option<PathBuf>,
    pub key_files: Vec<PathBuf>,
    pub level: PriorityLevel,
    pub urgency: Option<f64>,
    pub value: Option<f64>,
    pub deadline_ms: Option<u64>,
    pub lane: Option<String>,
    pub blocked_by: BTreeSet<AgentId>,
    pub start: StartMode,
}

impl NewAgent {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn criterion(mut self, criterion: impl Into<String>) -> Self {
        self.acceptance_criteria.push(criterion.into());
        self
    }

    pub fn project(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_files.push(path.into());
        self
    }

    pub fn level(mut self, level: PriorityLevel) -> Self {
        self.level = level;
        self
    }

    pub fn urgency(mut self, urgency: f64) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    pub fn lane(mut self, lane: impl Into<String>) -> Self {
        self.lane = Some(lane.into());
        self
    }

    pub fn blocked_by(mut self, blocker: impl Into<AgentId>) -> Self {
        self.blocked_by.insert(blocker.into());
        self
    }

    pub fn queued(mut self) -> Self {
        self.start = StartMode::Queued;
        self
    }

    /// Status the agent will be created with.
    pub fn initial_status(&self) -> AgentStatus {
        if !self.blocked_by.is_empty() {
            AgentStatus::Blocked
        } else {
            match self.start {
                StartMode::Active => AgentStatus::Active,
                StartMode::Queued => AgentStatus::Paused,
            }
        }
    }

    /// Materialize the agent document at `now_ms`.
    pub fn into_agent(self, id: AgentId, now_ms: u64) -> Agent {
        let status = self.initial_status();
        let priority = Priority {
            level: self.level,
            urgency: clamp_unit(self.urgency.unwrap_or(0.0)),
            value: clamp_unit(self.value.unwrap_or_else(default_value)),
            computed_score: None,
        };
        Agent {
            id,
            lane: self.lane.unwrap_or_else(default_lane),
            task: Task {
                title: self.title,
                goal: self.goal,
                acceptance_criteria: self.acceptance_criteria,
            },
            context: Context {
                project_path: self.project_path,
                key_files: self.key_files,
                decisions: Vec::new(),
                learnings: Vec::new(),
            },
            state: State {
                status,
                progress_pct: 0,
                current_step: String::new(),
                recent_failures: 0,
            },
            priority,
            timing: Timing {
                created_at_ms: now_ms,
                last_active_ms: now_ms,
                session_count: u32::from(status == AgentStatus::Active),
                deadline_ms: self.deadline_ms,
            },
            deps: Dependencies {
                blocked_by: self.blocked_by,
                blocks: BTreeSet::new(),
            },
            extra: BTreeMap::new(),
        }
    }
}

/// Clamp into `0.0 ..= 1.0`, mapping NaN to 0.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
