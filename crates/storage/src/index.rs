// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secondary index over agent documents.
//!
//! Holds one summary row per agent plus the active agent of each lane. It is
//! maintained incrementally after every agent write and can always be rebuilt
//! from the documents themselves.

use crate::Versioned;
use ctm_core::{Agent, AgentId, AgentStatus, PriorityLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub title: String,
    pub status: AgentStatus,
    pub level: PriorityLevel,
    pub lane: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    pub version: u64,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIndex {
    /// lane -> active agent
    #[serde(default)]
    pub active: BTreeMap<String, AgentId>,
    #[serde(default)]
    pub entries: BTreeMap<AgentId, IndexEntry>,
}

impl AgentIndex {
    pub fn from_docs<'a>(docs: impl IntoIterator<Item = &'a Versioned<Agent>>) -> Self {
        let mut index = Self::default();
        for doc in docs {
            index.upsert(doc);
        }
        index
    }

    /// Record the current state of `doc`, keeping the lane pointer in sync.
    pub fn upsert(&mut self, doc: &Versioned<Agent>) {
        let agent = &doc.data;
        let old_lane = self.entries.get(&agent.id).map(|e| e.lane.clone());
        if let Some(old_lane) = old_lane.filter(|lane| *lane != agent.lane) {
            self.clear_active(&old_lane, &agent.id);
        }
        if agent.status() == AgentStatus::Active {
            self.active.insert(agent.lane.clone(), agent.id.clone());
        } else {
            self.clear_active(&agent.lane, &agent.id);
        }
        self.entries.insert(
            agent.id.clone(),
            IndexEntry {
                title: agent.task.title.clone(),
                status: agent.status(),
                level: agent.priority.level,
                lane: agent.lane.clone(),
                project_path: agent.context.project_path.clone(),
                version: doc.version,
                updated_at_ms: doc.last_modified_ms,
            },
        );
    }

    pub fn remove(&mut self, id: &AgentId) -> Option<IndexEntry> {
        let entry = self.entries.remove(id)?;
        self.clear_active(&entry.lane, id);
        Some(entry)
    }

    pub fn active_id(&self, lane: &str) -> Option<&AgentId> {
        self.active.get(lane)
    }

    fn clear_active(&mut self, lane: &str, id: &AgentId) {
        if self.active.get(lane) == Some(id) {
            self.active.remove(lane);
        }
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
