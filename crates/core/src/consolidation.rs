// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload handed to project-memory collaborators when an agent completes.

use crate::agent::{Agent, AgentId, LogEntry};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationEvent {
    pub agent_id: AgentId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    pub decisions: Vec<LogEntry>,
    pub learnings: Vec<LogEntry>,
    pub completed_at_ms: u64,
}

impl ConsolidationEvent {
    pub fn from_agent(agent: &Agent, completed_at_ms: u64) -> Self {
        Self {
            agent_id: agent.id.clone(),
            title: agent.task.title.clone(),
            project_path: agent.context.project_path.clone(),
            decisions: agent.context.decisions.clone(),
            learnings: agent.context.learnings.clone(),
            completed_at_ms,
        }
    }
}
