// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent repository: one versioned document per agent plus the index.
//!
//! Every status-changing write goes through the state machine inside
//! [`apply_patch`] before anything reaches disk. Promotion to `active`
//! happens under the store's focus gate: the lane's other active agents are
//! demoted first, then the target is written, then the index pointer moves.
//! A lane is briefly without focus rather than briefly with two, across
//! every process sharing the directory.

use crate::index::AgentIndex;
use crate::layout::{json_stems, rotate_bak_path, StoreLayout};
use crate::patch::{apply_patch, AgentPatch, Change, PatchError};
use crate::versioned::{
    lock_path, RetryPolicy, Stamp, StoreError, StoreGate, Versioned, VersionedStore,
};
use ctm_core::transition::{TransitionEffect, TransitionError};
use ctm_core::{Agent, AgentId, AgentStatus, Clock, IdGen, NewAgent};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("agent not found: {0}")]
    NotFound(String),
    #[error("ambiguous id '{prefix}' matches {}", render_ids(.candidates))]
    Ambiguous {
        prefix: String,
        candidates: Vec<AgentId>,
    },
    #[error("illegal transition for {id}: {from} -> {to} ({source})")]
    IllegalTransition {
        id: AgentId,
        from: AgentStatus,
        to: AgentStatus,
        source: TransitionError,
    },
    #[error("agent {id} is {status}; no further changes allowed")]
    Terminal { id: AgentId, status: AgentStatus },
    #[error("invalid change to {id}: {message}")]
    Invalid { id: AgentId, message: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn render_ids(ids: &[AgentId]) -> String {
    ids.iter().map(AgentId::as_str).collect::<Vec<_>>().join(", ")
}

impl RepoError {
    fn from_patch(id: &AgentId, e: PatchError) -> Self {
        match e {
            PatchError::Terminal { status } => RepoError::Terminal {
                id: id.clone(),
                status,
            },
            PatchError::Illegal { from, to, source } => RepoError::IllegalTransition {
                id: id.clone(),
                from,
                to,
                source,
            },
            PatchError::Invalid(message) => RepoError::Invalid {
                id: id.clone(),
                message,
            },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RepoError::Store(e) if e.is_conflict())
    }
}

/// Why one attempt at [`AgentRepository::apply`] stopped.
enum Attempt {
    Failed(RepoError),
    /// The fresh read turned the patch into a promotion; retake under the gate.
    NeedsFocus,
}

impl From<StoreError> for Attempt {
    fn from(e: StoreError) -> Self {
        Attempt::Failed(e.into())
    }
}

/// Result of a committed (or no-op) mutation.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub doc: Versioned<Agent>,
    pub from: AgentStatus,
    pub effects: Vec<TransitionEffect>,
    /// Agents paused to make room for this one.
    pub demoted: Vec<AgentId>,
}

impl Mutation {
    pub fn has_effect(&self, effect: TransitionEffect) -> bool {
        self.effects.contains(&effect)
    }
}

#[derive(Debug, Clone)]
pub struct Switched {
    pub agent: Versioned<Agent>,
    pub demoted: Vec<AgentId>,
}

/// Filter for [`AgentRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub statuses: Vec<AgentStatus>,
    pub lane: Option<String>,
    pub include_terminal: bool,
}

impl AgentFilter {
    pub fn all() -> Self {
        Self {
            include_terminal: true,
            ..Self::default()
        }
    }

    pub fn status(status: AgentStatus) -> Self {
        Self {
            statuses: vec![status],
            include_terminal: status.is_terminal(),
            ..Self::default()
        }
    }

    pub fn matches(&self, agent: &Agent) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&agent.status()) {
            return false;
        }
        if !self.include_terminal && agent.is_terminal() {
            return false;
        }
        match &self.lane {
            Some(lane) => *lane == agent.lane,
            None => true,
        }
    }
}

/// A document that failed to read.
#[derive(Debug, Clone)]
pub struct CorruptDoc {
    pub id: AgentId,
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub agents: Vec<Versioned<Agent>>,
    pub corrupt: Vec<CorruptDoc>,
}

pub struct AgentRepository<C: Clock, G: IdGen> {
    layout: StoreLayout,
    clock: C,
    ids: G,
    retry: RetryPolicy,
    writer_id: String,
}

impl<C: Clock, G: IdGen> AgentRepository<C, G> {
    pub fn open(layout: StoreLayout, clock: C, ids: G) -> Result<Self, RepoError> {
        layout.ensure()?;
        Ok(Self {
            layout,
            clock,
            ids,
            retry: RetryPolicy::default(),
            writer_id: format!("ctm:{}", std::process::id()),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_writer_id(mut self, writer_id: impl Into<String>) -> Self {
        self.writer_id = writer_id.into();
        self
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn next_id(&self) -> AgentId {
        AgentId::new(self.ids.next())
    }

    fn stamp(&self) -> Stamp<'_> {
        Stamp {
            by: &self.writer_id,
            at_ms: self.clock.epoch_ms(),
        }
    }

    fn store(&self, id: &AgentId) -> VersionedStore<Agent> {
        VersionedStore::new(self.layout.agent_path(id))
    }

    fn index_store(&self) -> VersionedStore<AgentIndex> {
        VersionedStore::new(self.layout.index_path())
    }

    /// Create an agent with a fresh id.
    pub fn create(&self, new: NewAgent) -> Result<Versioned<Agent>, RepoError> {
        let id = self.next_id();
        self.create_with_id(id, new)
    }

    pub fn create_with_id(&self, id: AgentId, new: NewAgent) -> Result<Versioned<Agent>, RepoError> {
        if new.title.trim().is_empty() {
            return Err(RepoError::Invalid {
                id,
                message: "title must not be empty".into(),
            });
        }
        let agent = new.into_agent(id.clone(), self.clock.epoch_ms());
        let _gate = match agent.status() {
            AgentStatus::Active => {
                let gate = self.focus_gate()?;
                self.demote_lane(&agent.lane, &id)?;
                Some(gate)
            }
            _ => None,
        };
        let stamp = self.stamp();
        let version = self.store(&id).write(&agent, 0, stamp)?;
        let doc = Versioned {
            version,
            last_modified_ms: stamp.at_ms,
            modified_by: self.writer_id.clone(),
            data: agent,
        };
        self.sync_index(|index| index.upsert(&doc));
        info!(agent = %id, status = %doc.data.status(), "agent created");
        Ok(doc)
    }

    pub fn get(&self, id: &AgentId) -> Result<Versioned<Agent>, RepoError> {
        self.store(id).read().map_err(|e| match e {
            StoreError::NotFound { .. } => RepoError::NotFound(id.to_string()),
            other => other.into(),
        })
    }

    pub fn exists(&self, id: &AgentId) -> bool {
        self.store(id).exists()
    }

    /// Ids of every agent document on disk, sorted.
    pub fn ids(&self) -> Result<Vec<AgentId>, RepoError> {
        Ok(json_stems(&self.layout.agents_dir())?
            .into_iter()
            .map(AgentId::from)
            .collect())
    }

    /// Resolve a full id or unique prefix.
    pub fn resolve(&self, prefix: &str) -> Result<AgentId, RepoError> {
        let exact = AgentId::new(prefix);
        if !prefix.is_empty() && self.exists(&exact) {
            return Ok(exact);
        }
        let mut candidates: Vec<AgentId> = self
            .ids()?
            .into_iter()
            .filter(|id| id.matches_prefix(prefix))
            .collect();
        match candidates.len() {
            0 => Err(RepoError::NotFound(prefix.to_string())),
            1 => Ok(candidates.remove(0)),
            _ => Err(RepoError::Ambiguous {
                prefix: prefix.to_string(),
                candidates,
            }),
        }
    }

    /// Read every document, separating readable agents from corrupt ones.
    pub fn scan(&self) -> Result<ScanReport, RepoError> {
        let mut report = ScanReport::default();
        for id in self.ids()? {
            match self.store(&id).read() {
                Ok(doc) => report.agents.push(doc),
                Err(StoreError::Corrupt { path, message }) => {
                    report.corrupt.push(CorruptDoc { id, path, message })
                }
                // Archived or quarantined between listing and reading.
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(report)
    }

    /// Readable agents matching `filter`. Corrupt documents are skipped with a warning.
    pub fn list(&self, filter: &AgentFilter) -> Result<Vec<Versioned<Agent>>, RepoError> {
        let report = self.scan()?;
        for doc in &report.corrupt {
            warn!(agent = %doc.id, error = %doc.message, "skipping corrupt agent document");
        }
        Ok(report
            .agents
            .into_iter()
            .filter(|doc| filter.matches(&doc.data))
            .collect())
    }

    /// Apply `patch` if the document is still at `expected` version.
    ///
    /// No retry: a stale `expected` surfaces as a version conflict.
    pub fn mutate(
        &self,
        id: &AgentId,
        expected: u64,
        patch: &AgentPatch,
    ) -> Result<Mutation, RepoError> {
        let current = self.get(id)?;
        if current.version != expected {
            return Err(StoreError::VersionConflict {
                path: self.layout.agent_path(id),
                expected,
                found: Some(current.version),
            }
            .into());
        }
        let stamp = self.stamp();
        let from = current.data.status();
        let mut next = current.data.clone();
        let effects = apply_patch(&mut next, patch, stamp.at_ms)
            .map_err(|e| RepoError::from_patch(id, e))?;
        if next == current.data {
            return Ok(Mutation {
                doc: current,
                from,
                effects,
                demoted: Vec::new(),
            });
        }
        let (_gate, demoted) = if claims_focus(&current.data, &next) {
            let gate = self.focus_gate()?;
            (Some(gate), self.demote_lane(&next.lane, id)?)
        } else {
            (None, Vec::new())
        };
        let version = self.store(id).write(&next, expected, stamp)?;
        let doc = Versioned {
            version,
            last_modified_ms: stamp.at_ms,
            modified_by: self.writer_id.clone(),
            data: next,
        };
        self.sync_index(|index| index.upsert(&doc));
        self.log_transition(&doc, from);
        Ok(Mutation {
            doc,
            from,
            effects,
            demoted,
        })
    }

    /// Apply `patch` against a fresh read, retrying version conflicts.
    pub fn apply(&self, id: &AgentId, patch: &AgentPatch) -> Result<Mutation, RepoError> {
        let current = self.get(id)?;
        let mut preview = current.data.clone();
        apply_patch(&mut preview, patch, self.clock.epoch_ms())
            .map_err(|e| RepoError::from_patch(id, e))?;
        if !claims_focus(&current.data, &preview) {
            match self.commit_patch(id, patch, current.version, false) {
                Err(Attempt::NeedsFocus) => {}
                Err(Attempt::Failed(e)) => return Err(e),
                Ok(m) => return Ok(m),
            }
        }

        let _gate = self.focus_gate()?;
        let current = self.get(id)?;
        let mut preview = current.data.clone();
        apply_patch(&mut preview, patch, self.clock.epoch_ms())
            .map_err(|e| RepoError::from_patch(id, e))?;
        let demoted = if claims_focus(&current.data, &preview) {
            self.demote_lane(&preview.lane, id)?
        } else {
            Vec::new()
        };
        let mut m = match self.commit_patch(id, patch, current.version, true) {
            Ok(m) => m,
            Err(Attempt::Failed(e)) => return Err(e),
            // Not raised while the gate is held.
            Err(Attempt::NeedsFocus) => {
                return Err(StoreError::VersionConflict {
                    path: self.layout.agent_path(id),
                    expected: current.version,
                    found: None,
                }
                .into())
            }
        };
        m.demoted = demoted;
        Ok(m)
    }

    /// Read-modify-write `patch` with retries. Without the focus gate an
    /// attempt that would promote the agent stops with [`Attempt::NeedsFocus`].
    fn commit_patch(
        &self,
        id: &AgentId,
        patch: &AgentPatch,
        seen: u64,
        gated: bool,
    ) -> Result<Mutation, Attempt> {
        let stamp = self.stamp();
        let mut from = AgentStatus::Paused;
        let (doc, effects) = self.store(id).update(&self.retry, stamp, |agent: &mut Agent| {
            let before = agent.clone();
            from = before.status();
            let effects = apply_patch(agent, patch, stamp.at_ms)
                .map_err(|e| Attempt::Failed(RepoError::from_patch(id, e)))?;
            if !gated && claims_focus(&before, agent) {
                return Err(Attempt::NeedsFocus);
            }
            Ok(effects)
        })?;
        if doc.version != seen {
            self.sync_index(|index| index.upsert(&doc));
        }
        self.log_transition(&doc, from);
        Ok(Mutation {
            doc,
            from,
            effects,
            demoted: Vec::new(),
        })
    }

    pub fn transition(&self, id: &AgentId, to: AgentStatus) -> Result<Mutation, RepoError> {
        self.apply(id, &Change::Status(to).into())
    }

    /// Make `id` the active agent of its lane.
    pub fn switch(&self, id: &AgentId) -> Result<Switched, RepoError> {
        let mutation = self.transition(id, AgentStatus::Active)?;
        Ok(Switched {
            agent: mutation.doc,
            demoted: mutation.demoted,
        })
    }

    /// Move a terminal agent's document into `archive/`.
    pub fn archive(&self, id: &AgentId) -> Result<Versioned<Agent>, RepoError> {
        let doc = self.get(id)?;
        if !doc.data.is_terminal() {
            return Err(RepoError::Invalid {
                id: id.clone(),
                message: format!("only completed or cancelled agents can be archived ({})", doc.data.status()),
            });
        }
        let src = self.layout.agent_path(id);
        let dst = self.layout.archive_dir().join(format!("{id}.json"));
        fs::create_dir_all(self.layout.archive_dir())?;
        fs::rename(&src, &dst)?;
        let _ = fs::remove_file(lock_path(&src));
        self.sync_index(|index| {
            index.remove(id);
        });
        info!(agent = %id, "agent archived");
        Ok(doc)
    }

    /// Move an unreadable document aside to a rotating `.bak`.
    pub fn quarantine(&self, id: &AgentId) -> Result<PathBuf, RepoError> {
        let path = self.layout.agent_path(id);
        let bak = rotate_bak_path(&path);
        fs::rename(&path, &bak)?;
        self.sync_index(|index| {
            index.remove(id);
        });
        warn!(agent = %id, bak = %bak.display(), "agent document quarantined");
        Ok(bak)
    }

    /// Overwrite a document with `agent`, bumping past `floor`. Repair only.
    ///
    /// The version the index last recorded for the agent also counts toward
    /// the floor, so a writer holding the lost version still conflicts.
    pub fn restore_document(
        &self,
        agent: &Agent,
        floor: u64,
    ) -> Result<Versioned<Agent>, RepoError> {
        let indexed = self
            .index()
            .ok()
            .and_then(|index| index.entries.get(&agent.id).map(|e| e.version))
            .unwrap_or(0);
        let stamp = self.stamp();
        let version = self
            .store(&agent.id)
            .force_replace(agent, floor.max(indexed), stamp)?;
        let doc = Versioned {
            version,
            last_modified_ms: stamp.at_ms,
            modified_by: self.writer_id.clone(),
            data: agent.clone(),
        };
        self.sync_index(|index| index.upsert(&doc));
        Ok(doc)
    }

    /// Current index, or an empty one when none has been written.
    pub fn index(&self) -> Result<AgentIndex, RepoError> {
        Ok(self
            .index_store()
            .read_optional()?
            .map(|doc| doc.data)
            .unwrap_or_default())
    }

    /// Regenerate the index from the documents.
    ///
    /// Entries for unreadable documents carry over from the old index, so
    /// their last known version still bounds a later restore.
    pub fn rebuild_index(&self) -> Result<AgentIndex, RepoError> {
        let report = self.scan()?;
        let mut index = AgentIndex::from_docs(&report.agents);
        if let Ok(old) = self.index() {
            for doc in &report.corrupt {
                if let Some(entry) = old.entries.get(&doc.id) {
                    index.entries.insert(doc.id.clone(), entry.clone());
                }
            }
        }
        self.index_store().force_replace(&index, 0, self.stamp())?;
        info!(agents = index.entries.len(), "index rebuilt");
        Ok(index)
    }

    /// True when the index is missing, older than some document, or lists a
    /// different set of agents than the directory holds.
    pub fn index_is_stale(&self) -> Result<bool, RepoError> {
        let index_path = self.layout.index_path();
        let Some(index_mtime) = mtime(&index_path)? else {
            return Ok(true);
        };
        let index = match self.index() {
            Ok(index) => index,
            Err(RepoError::Store(StoreError::Corrupt { .. })) => return Ok(true),
            Err(e) => return Err(e),
        };
        let ids = self.ids()?;
        if ids.len() != index.entries.len() || ids.iter().any(|id| !index.entries.contains_key(id)) {
            return Ok(true);
        }
        for id in &ids {
            if let Some(doc_mtime) = mtime(&self.layout.agent_path(id))? {
                if doc_mtime > index_mtime {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Exclusive right to promote agents on this store, across processes.
    pub fn focus_gate(&self) -> Result<StoreGate, RepoError> {
        Ok(StoreGate::acquire(self.layout.focus_gate_path())?)
    }

    /// Exclusive right to add dependency edges. Take it before the focus gate.
    pub fn deps_gate(&self) -> Result<StoreGate, RepoError> {
        Ok(StoreGate::acquire(self.layout.deps_gate_path())?)
    }

    /// Pause every other active agent in `lane`. Caller holds the focus gate.
    ///
    /// Reads the documents rather than the index, which may lag.
    fn demote_lane(&self, lane: &str, except: &AgentId) -> Result<Vec<AgentId>, RepoError> {
        let candidates: Vec<AgentId> = self
            .scan()?
            .agents
            .into_iter()
            .filter(|doc| {
                doc.data.status() == AgentStatus::Active
                    && doc.data.lane == lane
                    && doc.data.id != *except
            })
            .map(|doc| doc.data.id)
            .collect();
        let mut demoted = Vec::new();
        for other in candidates {
            match self.apply(&other, &Change::Demote.into()) {
                Ok(m) if m.from == AgentStatus::Active => demoted.push(other),
                Ok(_) => {}
                Err(RepoError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(demoted)
    }

    /// Best-effort index maintenance; a stale index is rebuilt on next open.
    fn sync_index(&self, edit: impl Fn(&mut AgentIndex)) {
        let store = self.index_store();
        let stamp = self.stamp();
        let result = if store.exists() {
            store
                .update(&self.retry, stamp, |index: &mut AgentIndex| {
                    edit(index);
                    Ok::<_, StoreError>(())
                })
                .map(|_| ())
        } else {
            let mut index = AgentIndex::default();
            edit(&mut index);
            store.write(&index, 0, stamp).map(|_| ())
        };
        if let Err(e) = result {
            warn!(error = %e, "index update failed; it will be rebuilt");
        }
    }

    fn log_transition(&self, doc: &Versioned<Agent>, from: AgentStatus) {
        let to = doc.data.status();
        if from != to {
            info!(agent = %doc.data.id, %from, %to, version = doc.version, "agent transitioned");
        } else {
            debug!(agent = %doc.data.id, version = doc.version, "agent updated");
        }
    }
}

/// `after` holds focus in a lane where `before` did not.
fn claims_focus(before: &Agent, after: &Agent) -> bool {
    after.status() == AgentStatus::Active
        && (before.status() != AgentStatus::Active || before.lane != after.lane)
}

fn mtime(path: &std::path::Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => meta.modified().map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
