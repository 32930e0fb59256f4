// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task manager facade.
//!
//! Composes the repository, dependency graph, scheduler, checkpoints,
//! working memory and consolidation sink into the operations the CLI
//! exposes. The documents on disk are the source of truth; the graph and
//! the tiers are rebuilt from them whenever the manager opens or restores.
//! Edge checks reload the graph under the store's dependency gate, since
//! other sessions may have added edges since then.

use crate::error::EngineError;
use crate::sink::ConsolidationSink;
use ctm_core::{
    rank_queue, Agent, AgentId, AgentStatus, Clock, Config, ConsolidationEvent, DependencyGraph,
    IdGen, NewAgent, ScoreBreakdown, ScoreContext, TransitionEffect,
};
use ctm_storage::{
    AgentFilter, AgentPatch, AgentRepository, Change, CheckpointInfo, CheckpointManager,
    CheckpointSelector, ColdSummary, Mailbox, Mutation, RepoError, RestoreReport, RetryPolicy,
    StoreLayout, Switched, Tier, TierStats, Versioned, WorkingMemory,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of completing or cancelling an agent.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub agent: Versioned<Agent>,
    /// Dependents that moved `blocked -> paused`.
    pub unblocked: Vec<AgentId>,
    /// Dependents whose blocker could not be removed; repair picks them up.
    pub stranded: Vec<AgentId>,
    pub event: Option<ConsolidationEvent>,
    pub delivered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub agent: Versioned<Agent>,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Impact {
    pub id: AgentId,
    pub title: String,
    pub status: Option<AgentStatus>,
    /// Agents currently waiting on this one.
    pub blocking: usize,
}

/// Everything `show` displays about one agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentView {
    pub agent: Versioned<Agent>,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkingSet {
    pub focused: Option<AgentId>,
    pub l1: Vec<AgentId>,
    pub l2: Vec<AgentId>,
    pub cold: Vec<ColdSummary>,
    pub stats: TierStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    Decision,
    Learning,
}

pub struct TaskManager<C: Clock, G: IdGen> {
    pub(crate) repo: AgentRepository<C, G>,
    pub(crate) checkpoints: CheckpointManager<C>,
    mailbox: Mailbox<C, G>,
    pub(crate) graph: Mutex<DependencyGraph>,
    pub(crate) memory: Mutex<WorkingMemory>,
    sink: Arc<dyn ConsolidationSink>,
    config: Config,
}

impl<C: Clock, G: IdGen> TaskManager<C, G> {
    /// Open the state directory, rebuilding a stale index and loading the graph.
    pub fn open(
        layout: StoreLayout,
        config: Config,
        clock: C,
        ids: G,
        sink: Arc<dyn ConsolidationSink>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let repo = AgentRepository::open(layout.clone(), clock.clone(), ids.clone())?
            .with_retry(RetryPolicy::from(&config.store));
        if repo.index_is_stale()? {
            info!("index stale, rebuilding");
            repo.rebuild_index()?;
        }
        let mailbox = Mailbox::new(
            layout.clone(),
            clock.clone(),
            ids,
            std::time::Duration::from_secs(config.mailbox.default_ttl_secs),
        );
        let manager = Self {
            checkpoints: CheckpointManager::new(layout, clock),
            repo,
            mailbox,
            graph: Mutex::new(DependencyGraph::new()),
            memory: Mutex::new(WorkingMemory::new(config.tiers.clone())),
            sink,
            config,
        };
        manager.reload()?;
        Ok(manager)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repo(&self) -> &AgentRepository<C, G> {
        &self.repo
    }

    pub fn checkpoints(&self) -> &CheckpointManager<C> {
        &self.checkpoints
    }

    pub fn mailbox(&self) -> &Mailbox<C, G> {
        &self.mailbox
    }

    fn now(&self) -> u64 {
        self.repo.clock().epoch_ms()
    }

    /// Rebuild the in-memory graph from the documents.
    pub(crate) fn reload(&self) -> Result<(), EngineError> {
        let report = self.repo.scan()?;
        for doc in &report.corrupt {
            warn!(agent = %doc.id, error = %doc.message, "corrupt agent document; run repair");
        }
        let (graph, rejected) = DependencyGraph::from_agents(report.agents.iter().map(|d| &d.data));
        for e in &rejected {
            warn!(error = %e, "dependency edge skipped; run repair");
        }
        debug!(edges = graph.edge_count(), "dependency graph loaded");
        *self.graph.lock() = graph;
        Ok(())
    }

    pub fn resolve(&self, prefix: &str) -> Result<AgentId, EngineError> {
        Ok(self.repo.resolve(prefix)?)
    }

    /// The active agent of `lane`, if any.
    pub fn active(&self, lane: &str) -> Result<Option<Versioned<Agent>>, EngineError> {
        let index = self.repo.index().unwrap_or_default();
        if let Some(id) = index.active_id(lane) {
            match self.repo.get(id) {
                Ok(doc) if doc.data.status() == AgentStatus::Active && doc.data.lane == lane => {
                    return Ok(Some(doc))
                }
                Ok(_) | Err(RepoError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        let filter = AgentFilter {
            statuses: vec![AgentStatus::Active],
            lane: Some(lane.to_string()),
            include_terminal: false,
        };
        Ok(self
            .repo
            .list(&filter)?
            .into_iter()
            .max_by_key(|d| d.data.timing.last_active_ms))
    }

    /// Resolve `prefix`, or fall back to the active agent of `lane`.
    pub fn target(&self, prefix: Option<&str>, lane: &str) -> Result<AgentId, EngineError> {
        match prefix {
            Some(p) => self.resolve(p),
            None => self
                .active(lane)?
                .map(|doc| doc.data.id)
                .ok_or_else(|| EngineError::NoActive(lane.to_string())),
        }
    }

    /// Create an agent. Blockers must exist, be open, and keep the graph acyclic.
    pub fn spawn(&self, new: NewAgent) -> Result<Versioned<Agent>, EngineError> {
        if new.title.trim().is_empty() {
            return Err(EngineError::Invalid("title must not be empty".into()));
        }
        for blocker in &new.blocked_by {
            let doc = self.repo.get(blocker)?;
            if doc.data.is_terminal() {
                return Err(EngineError::Invalid(format!(
                    "blocker {blocker} is already {}",
                    doc.data.status()
                )));
            }
        }
        let id = self.repo.next_id();
        let _deps = if new.blocked_by.is_empty() {
            None
        } else {
            let gate = self.repo.deps_gate()?;
            self.reload()?;
            Some(gate)
        };
        {
            let mut trial = self.graph.lock().clone();
            for blocker in &new.blocked_by {
                trial.add_edge(&id, blocker)?;
            }
        }

        let blockers: Vec<AgentId> = new.blocked_by.iter().cloned().collect();
        let doc = self.repo.create_with_id(id.clone(), new)?;
        {
            let mut graph = self.graph.lock();
            for blocker in &blockers {
                graph.add_edge(&id, blocker)?;
            }
        }
        for blocker in &blockers {
            let mirrored = self.repo.apply(blocker, &Change::AddDependent(id.clone()).into())?;
            self.track(&mirrored.doc);
        }
        self.track(&doc);
        Ok(doc)
    }

    /// Give `id` focus in its lane, pausing the previous active agent.
    pub fn switch(&self, id: &AgentId) -> Result<Switched, EngineError> {
        let switched = self.repo.switch(id)?;
        self.forget(&switched.demoted);
        self.track(&switched.agent);
        Ok(switched)
    }

    pub fn pause(&self, id: &AgentId) -> Result<Mutation, EngineError> {
        let m = self.repo.transition(id, AgentStatus::Paused)?;
        self.track(&m.doc);
        Ok(m)
    }

    pub fn complete(&self, id: &AgentId) -> Result<Completion, EngineError> {
        self.finish(id, AgentStatus::Completed)
    }

    pub fn cancel(&self, id: &AgentId) -> Result<Completion, EngineError> {
        self.finish(id, AgentStatus::Cancelled)
    }

    fn finish(&self, id: &AgentId, to: AgentStatus) -> Result<Completion, EngineError> {
        let m = self.repo.transition(id, to)?;
        self.track(&m.doc);

        let (unblocked, stranded) = if m.has_effect(TransitionEffect::UnblockDependents) {
            self.cascade(&m.doc.data)
        } else {
            (Vec::new(), Vec::new())
        };

        let mut delivered = false;
        let event = if m.has_effect(TransitionEffect::Consolidate) {
            let event = ConsolidationEvent::from_agent(&m.doc.data, m.doc.last_modified_ms);
            match self.sink.deliver(&event) {
                Ok(()) => delivered = true,
                Err(e) => warn!(agent = %id, error = %e, "consolidation delivery failed"),
            }
            Some(event)
        } else {
            None
        };

        info!(agent = %id, status = %to, unblocked = unblocked.len(), "agent finished");
        Ok(Completion {
            agent: m.doc,
            unblocked,
            stranded,
            event,
            delivered,
        })
    }

    /// Remove a finished agent as a blocker from every dependent.
    fn cascade(&self, finished: &Agent) -> (Vec<AgentId>, Vec<AgentId>) {
        let id = &finished.id;
        let mut dependents: BTreeSet<AgentId> = self.graph.lock().dependents(id).cloned().collect();
        dependents.extend(finished.deps.blocks.iter().cloned());

        let mut unblocked = Vec::new();
        let mut stranded = Vec::new();
        for dep in &dependents {
            match self.repo.apply(dep, &Change::Unblock(id.clone()).into()) {
                Ok(m) => {
                    if m.from == AgentStatus::Blocked && m.doc.data.status() == AgentStatus::Paused {
                        unblocked.push(dep.clone());
                    }
                    self.track(&m.doc);
                }
                Err(RepoError::NotFound(_)) => debug!(agent = %dep, "dependent gone"),
                Err(e) => {
                    warn!(agent = %dep, blocker = %id, error = %e, "failed to unblock dependent");
                    stranded.push(dep.clone());
                }
            }
        }
        let mut graph = self.graph.lock();
        graph.unblock_cascade(id);
        graph.remove_node(id);
        (unblocked, stranded)
    }

    /// Make `id` wait on `blocker`.
    pub fn block(&self, id: &AgentId, blocker: &AgentId) -> Result<Mutation, EngineError> {
        let blocker_doc = self.repo.get(blocker)?;
        if blocker_doc.data.is_terminal() {
            return Err(EngineError::Invalid(format!(
                "blocker {blocker} is already {}",
                blocker_doc.data.status()
            )));
        }
        let _deps = self.repo.deps_gate()?;
        self.reload()?;
        self.graph.lock().check_edge(id, blocker)?;

        let patch = AgentPatch::new()
            .with(Change::AddBlocker(blocker.clone()))
            .with(Change::Status(AgentStatus::Blocked));
        let m = self.repo.apply(id, &patch)?;
        self.graph.lock().add_edge(id, blocker)?;
        let mirrored = self.repo.apply(blocker, &Change::AddDependent(id.clone()).into())?;
        self.track(&mirrored.doc);
        self.track(&m.doc);
        Ok(m)
    }

    /// Drop `blocker` from `id`; an agent with no blockers left becomes paused.
    pub fn unblock(&self, id: &AgentId, blocker: &AgentId) -> Result<Mutation, EngineError> {
        let m = self.repo.apply(id, &Change::Unblock(blocker.clone()).into())?;
        self.graph.lock().remove_edge(id, blocker);
        match self.repo.apply(blocker, &Change::RemoveDependent(id.clone()).into()) {
            Ok(mirrored) => self.track(&mirrored.doc),
            Err(RepoError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.track(&m.doc);
        Ok(m)
    }

    /// Schedulable agents in priority order.
    pub fn queue(&self, project: Option<&Path>) -> Result<Vec<QueueEntry>, EngineError> {
        let docs = self.repo.list(&AgentFilter::default())?;
        let ctx = ScoreContext::at(self.now()).with_project(project);
        let memory = self.memory.lock();
        Ok(rank_queue(docs, &self.config.scoring, &ctx)
            .into_iter()
            .map(|ranked| QueueEntry {
                tier: memory.tier_of(&ranked.item.data.id),
                agent: ranked.item,
                score: ranked.score,
                breakdown: ranked.breakdown,
            })
            .collect())
    }

    pub fn list(&self, filter: &AgentFilter) -> Result<Vec<Versioned<Agent>>, EngineError> {
        Ok(self.repo.list(filter)?)
    }

    /// Agents blocking the most others.
    pub fn high_impact(&self) -> Result<Vec<Impact>, EngineError> {
        let nodes = self.graph.lock().high_impact_nodes();
        let index = self.repo.index().unwrap_or_default();
        Ok(nodes
            .into_iter()
            .map(|(id, blocking)| {
                let entry = index.entries.get(&id);
                Impact {
                    title: entry.map(|e| e.title.clone()).unwrap_or_default(),
                    status: entry.map(|e| e.status),
                    id,
                    blocking,
                }
            })
            .collect())
    }

    /// Apply a field edit. `expected` pins the version; `None` retries against fresh reads.
    pub fn edit(
        &self,
        id: &AgentId,
        expected: Option<u64>,
        patch: &AgentPatch,
    ) -> Result<Mutation, EngineError> {
        for change in &patch.changes {
            match change {
                Change::Status(_)
                | Change::Demote
                | Change::AddBlocker(_)
                | Change::RemoveBlocker(_)
                | Change::Unblock(_)
                | Change::AddDependent(_)
                | Change::RemoveDependent(_) => {
                    return Err(EngineError::Invalid(
                        "status and dependency changes go through their own commands".into(),
                    ))
                }
                Change::Lane(_) => {
                    if self.repo.get(id)?.data.status() == AgentStatus::Active {
                        return Err(EngineError::Invalid(
                            "pause the agent before moving it to another lane".into(),
                        ));
                    }
                }
                _ => {}
            }
        }
        let m = match expected {
            Some(version) => self.repo.mutate(id, version, patch)?,
            None => self.repo.apply(id, patch)?,
        };
        self.track(&m.doc);
        Ok(m)
    }

    pub fn note(&self, id: &AgentId, kind: NoteKind, text: &str) -> Result<Mutation, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::Invalid("note must not be empty".into()));
        }
        let change = match kind {
            NoteKind::Decision => Change::Decision(text.to_string()),
            NoteKind::Learning => Change::Learning(text.to_string()),
        };
        self.edit(id, None, &change.into())
    }

    pub fn progress(
        &self,
        id: &AgentId,
        pct: u8,
        step: Option<&str>,
    ) -> Result<Mutation, EngineError> {
        if pct > 100 {
            return Err(EngineError::Invalid(format!("progress {pct} is over 100")));
        }
        let mut patch = AgentPatch::one(Change::Progress(pct));
        if let Some(step) = step {
            patch.push(Change::Step(step.to_string()));
        }
        self.edit(id, None, &patch)
    }

    /// Record a failed attempt; raises the agent's error boost.
    pub fn fail(&self, id: &AgentId) -> Result<Mutation, EngineError> {
        self.edit(id, None, &Change::Failure.into())
    }

    /// One agent with its score, served through working memory.
    pub fn show(&self, id: &AgentId, project: Option<&Path>) -> Result<AgentView, EngineError> {
        let (doc, tier) = {
            let mut memory = self.memory.lock();
            let doc = memory.get_or_load(id, |id| self.repo.get(id))?;
            let tier = memory.tier_of(id);
            (doc, tier)
        };
        let ctx = ScoreContext::at(self.now()).with_project(project);
        let breakdown = ScoreBreakdown::of(&doc.data, &self.config.scoring, &ctx);
        Ok(AgentView {
            score: breakdown.total(&self.config.scoring),
            breakdown,
            tier,
            agent: doc,
        })
    }

    pub fn working_set(&self) -> WorkingSet {
        let memory = self.memory.lock();
        WorkingSet {
            focused: memory.focused().cloned(),
            l1: memory.members(Tier::L1),
            l2: memory.members(Tier::L2),
            cold: memory.cold_summaries().cloned().collect(),
            stats: memory.stats(),
        }
    }

    /// Move a finished agent out of the live set.
    pub fn archive(&self, id: &AgentId) -> Result<Versioned<Agent>, EngineError> {
        let doc = self.repo.archive(id)?;
        self.memory.lock().invalidate(id);
        self.graph.lock().remove_node(id);
        Ok(doc)
    }

    pub fn checkpoint(&self, reason: &str) -> Result<CheckpointInfo, EngineError> {
        Ok(self.checkpoints.capture(reason)?)
    }

    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>, EngineError> {
        Ok(self.checkpoints.list()?)
    }

    pub fn prune_checkpoints(&self, keep_last: usize) -> Result<Vec<String>, EngineError> {
        Ok(self.checkpoints.prune(keep_last)?)
    }

    /// Capture on the configured cadence, then apply retention.
    pub fn maybe_checkpoint(&self) -> Result<Option<CheckpointInfo>, EngineError> {
        let cfg = &self.config.checkpoints;
        let captured = self.checkpoints.maybe_capture(cfg.interval(), "cadence")?;
        if captured.is_some() {
            let removed = self.checkpoints.prune(cfg.keep_last)?;
            if !removed.is_empty() {
                debug!(removed = removed.len(), "old checkpoints pruned");
            }
        }
        Ok(captured)
    }

    /// Replace all state with a checkpoint, capturing the current state first.
    pub fn restore(
        &self,
        selector: &CheckpointSelector,
        confirmed: bool,
    ) -> Result<RestoreReport, EngineError> {
        if !confirmed {
            return Err(ctm_storage::CheckpointError::Unconfirmed.into());
        }
        let target = self.checkpoints.resolve(selector)?;
        let safety = self.checkpoints.capture("pre-restore")?;
        info!(target = target.id(), safety = safety.id(), "restoring checkpoint");
        let report = self
            .checkpoints
            .restore(&CheckpointSelector::Id(target.id().to_string()), true)?;
        self.memory.lock().clear();
        self.reload()?;
        Ok(report)
    }

    /// Keep working memory in step with a freshly written document.
    pub(crate) fn track(&self, doc: &Versioned<Agent>) {
        let mut memory = self.memory.lock();
        if doc.data.status() == AgentStatus::Active {
            // Whatever held focus in this lane was paused by the write.
            let displaced: Vec<AgentId> = [Tier::L1, Tier::L2]
                .into_iter()
                .flat_map(|tier| memory.members(tier))
                .filter(|other| {
                    *other != doc.data.id
                        && memory.peek(other).is_some_and(|cached| {
                            cached.data.status() == AgentStatus::Active
                                && cached.data.lane == doc.data.lane
                        })
                })
                .collect();
            for other in &displaced {
                memory.invalidate(other);
            }
            memory.focus(doc.clone());
        } else {
            if memory.focused() == Some(&doc.data.id) {
                memory.unfocus();
            }
            memory.refresh(doc);
        }
    }

    fn forget(&self, ids: &[AgentId]) {
        let mut memory = self.memory.lock();
        for id in ids {
            memory.invalidate(id);
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
