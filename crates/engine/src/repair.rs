// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validate and fix derived state.
//!
//! Repair always takes a checkpoint first. It then works through, in order:
//! corrupt documents, dangling or finished blockers, dependency cycles,
//! status/blocker consistency, one active agent per lane, and the `blocks`
//! mirror. Finally the index is rebuilt from the repaired documents.

use crate::error::EngineError;
use crate::manager::TaskManager;
use ctm_core::{Agent, AgentId, AgentStatus, Clock, DependencyGraph, GraphError, IdGen};
use ctm_storage::{AgentPatch, Change, RepoError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairOptions {
    /// Replace a corrupt document with its newest readable checkpoint copy.
    pub restore_corrupt: bool,
    /// Quarantine corrupt documents that could not be restored.
    pub drop_corrupt: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            restore_corrupt: true,
            drop_corrupt: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusFix {
    pub id: AgentId,
    pub from: AgentStatus,
    pub to: AgentStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub checkpoint: Option<String>,
    /// Corrupt documents restored from a checkpoint, with the checkpoint id.
    pub restored: Vec<(AgentId, String)>,
    pub quarantined: Vec<AgentId>,
    /// Corrupt documents left in place.
    pub unresolved: Vec<AgentId>,
    /// `(agent, blocker)` pairs removed because the blocker is gone or finished.
    pub dangling: Vec<(AgentId, AgentId)>,
    /// `(agent, blocker)` pairs removed to break a cycle.
    pub cycles_broken: Vec<(AgentId, AgentId)>,
    pub status_fixed: Vec<StatusFix>,
    /// Extra active agents paused, keeping the most recently active per lane.
    pub demoted: Vec<AgentId>,
    pub mirrors_fixed: Vec<AgentId>,
    pub indexed: usize,
}

impl RepairReport {
    /// Nothing needed fixing.
    pub fn is_clean(&self) -> bool {
        self.restored.is_empty()
            && self.quarantined.is_empty()
            && self.unresolved.is_empty()
            && self.dangling.is_empty()
            && self.cycles_broken.is_empty()
            && self.status_fixed.is_empty()
            && self.demoted.is_empty()
            && self.mirrors_fixed.is_empty()
    }

    pub fn is_recoverable(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl<C: Clock, G: IdGen> TaskManager<C, G> {
    pub fn repair(&self, opts: RepairOptions) -> Result<RepairReport, EngineError> {
        let mut report = RepairReport {
            checkpoint: Some(self.checkpoints.capture("pre-repair")?.manifest.id),
            ..RepairReport::default()
        };

        self.repair_corrupt(opts, &mut report)?;
        self.repair_dangling(&mut report)?;
        self.repair_cycles(&mut report)?;
        self.repair_status(&mut report)?;
        self.repair_lanes(&mut report)?;
        self.repair_mirrors(&mut report)?;

        report.indexed = self.repo.rebuild_index()?.entries.len();
        self.memory.lock().clear();
        self.reload()?;
        if report.is_clean() {
            info!("repair found nothing to fix");
        } else {
            info!(
                restored = report.restored.len(),
                quarantined = report.quarantined.len(),
                unresolved = report.unresolved.len(),
                dangling = report.dangling.len(),
                cycles = report.cycles_broken.len(),
                status = report.status_fixed.len(),
                demoted = report.demoted.len(),
                mirrors = report.mirrors_fixed.len(),
                "repair complete"
            );
        }
        Ok(report)
    }

    fn live_agents(&self) -> Result<BTreeMap<AgentId, Agent>, EngineError> {
        Ok(self
            .repo
            .scan()?
            .agents
            .into_iter()
            .map(|doc| (doc.data.id.clone(), doc.data))
            .collect())
    }

    fn repair_corrupt(&self, opts: RepairOptions, report: &mut RepairReport) -> Result<(), EngineError> {
        for doc in self.repo.scan()?.corrupt {
            if opts.restore_corrupt {
                if let Some((found_in, copy)) = self.checkpoints.find_document(&doc.id)? {
                    self.repo.restore_document(&copy.data, copy.version)?;
                    warn!(agent = %doc.id, checkpoint = found_in.id(), "corrupt document restored");
                    report.restored.push((doc.id, found_in.manifest.id));
                    continue;
                }
            }
            if opts.drop_corrupt {
                self.repo.quarantine(&doc.id)?;
                report.quarantined.push(doc.id);
            } else {
                warn!(agent = %doc.id, error = %doc.message, "corrupt document left in place");
                report.unresolved.push(doc.id);
            }
        }
        Ok(())
    }

    fn repair_dangling(&self, report: &mut RepairReport) -> Result<(), EngineError> {
        let agents = self.live_agents()?;
        for agent in agents.values().filter(|a| !a.is_terminal()) {
            let gone: Vec<AgentId> = agent
                .deps
                .blocked_by
                .iter()
                .filter(|b| match agents.get(*b) {
                    Some(blocker) => blocker.is_terminal(),
                    // An unreadable blocker may still be open.
                    None => !report.unresolved.contains(b),
                })
                .cloned()
                .collect();
            if gone.is_empty() {
                continue;
            }
            let patch: AgentPatch = gone.iter().cloned().map(Change::Unblock).collect();
            self.repo.apply(&agent.id, &patch)?;
            for blocker in gone {
                report.dangling.push((agent.id.clone(), blocker));
            }
        }
        Ok(())
    }

    fn repair_cycles(&self, report: &mut RepairReport) -> Result<(), EngineError> {
        let agents = self.live_agents()?;
        let (_, rejected) = DependencyGraph::from_agents(agents.values());
        for e in rejected {
            let GraphError::CycleDetected { blocked, blocker, .. } = e;
            self.repo.apply(&blocked, &Change::Unblock(blocker.clone()).into())?;
            warn!(agent = %blocked, %blocker, "dependency cycle broken");
            report.cycles_broken.push((blocked, blocker));
        }
        Ok(())
    }

    fn repair_status(&self, report: &mut RepairReport) -> Result<(), EngineError> {
        for agent in self.live_agents()?.into_values() {
            let status = agent.status();
            let has_blockers = !agent.deps.blocked_by.is_empty();
            let to = match status {
                AgentStatus::Blocked if !has_blockers => AgentStatus::Paused,
                AgentStatus::Active | AgentStatus::Paused if has_blockers => AgentStatus::Blocked,
                _ => continue,
            };
            self.repo.transition(&agent.id, to)?;
            report.status_fixed.push(StatusFix {
                id: agent.id,
                from: status,
                to,
            });
        }
        Ok(())
    }

    fn repair_lanes(&self, report: &mut RepairReport) -> Result<(), EngineError> {
        let mut lanes: BTreeMap<String, Vec<Agent>> = BTreeMap::new();
        for agent in self.live_agents()?.into_values() {
            if agent.status() == AgentStatus::Active {
                lanes.entry(agent.lane.clone()).or_default().push(agent);
            }
        }
        for (lane, mut active) in lanes {
            if active.len() < 2 {
                continue;
            }
            active.sort_by(|a, b| {
                b.timing
                    .last_active_ms
                    .cmp(&a.timing.last_active_ms)
                    .then_with(|| b.id.cmp(&a.id))
            });
            for extra in active.into_iter().skip(1) {
                self.repo.apply(&extra.id, &Change::Demote.into())?;
                warn!(agent = %extra.id, %lane, "extra active agent paused");
                report.demoted.push(extra.id);
            }
        }
        Ok(())
    }

    fn repair_mirrors(&self, report: &mut RepairReport) -> Result<(), EngineError> {
        let agents = self.live_agents()?;
        let mut expected: BTreeMap<&AgentId, BTreeSet<AgentId>> = BTreeMap::new();
        for agent in agents.values() {
            for blocker in &agent.deps.blocked_by {
                expected.entry(blocker).or_default().insert(agent.id.clone());
            }
        }
        let empty = BTreeSet::new();
        for agent in agents.values().filter(|a| !a.is_terminal()) {
            let want = expected.get(&agent.id).unwrap_or(&empty);
            if *want == agent.deps.blocks {
                continue;
            }
            let patch: AgentPatch = agent
                .deps
                .blocks
                .difference(want)
                .cloned()
                .map(Change::RemoveDependent)
                .chain(want.difference(&agent.deps.blocks).cloned().map(Change::AddDependent))
                .collect();
            match self.repo.apply(&agent.id, &patch) {
                Ok(_) => report.mirrors_fixed.push(agent.id.clone()),
                Err(RepoError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "repair_tests.rs"]
mod tests;
