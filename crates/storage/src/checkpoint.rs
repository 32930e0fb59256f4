// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-repository checkpoints.
//!
//! ```text
//! checkpoints/
//!   20260101T000000.000Z/        immutable once renamed into place
//!     manifest.json
//!     index.json
//!     agents/<id>.json           byte-for-byte copies
//!   .staging-<pid>-<n>/          under construction, never listed
//! ```
//!
//! A checkpoint is assembled in a hidden staging directory and renamed into
//! place, so a crash mid-capture leaves nothing that looks like a checkpoint.
//! Restore swaps the whole `agents/` directory the same way.

use crate::atomic::{fsync_dir, write_atomic, FsWriter};
use crate::layout::{json_stems, StoreLayout};
use crate::versioned::Versioned;
use chrono::{TimeZone, Utc};
use ctm_core::{Agent, AgentId, Clock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checkpoint not found: {0}")]
    NotFound(String),
    #[error("ambiguous checkpoint '{prefix}' matches {count} checkpoints")]
    Ambiguous { prefix: String, count: usize },
    #[error("restore replaces all agent state; confirmation required")]
    Unconfirmed,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub created_at_ms: u64,
    pub reason: String,
    pub agents: Vec<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointInfo {
    pub manifest: Manifest,
    pub path: PathBuf,
}

impl CheckpointInfo {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointSelector {
    Latest,
    /// Full id or unique prefix.
    Id(String),
}

impl CheckpointSelector {
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("latest") => CheckpointSelector::Latest,
            Some(id) => CheckpointSelector::Id(id.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub checkpoint: CheckpointInfo,
    pub restored: Vec<AgentId>,
    /// Agents present before the restore that the checkpoint does not contain.
    pub discarded: Vec<AgentId>,
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct CheckpointManager<C: Clock> {
    layout: StoreLayout,
    clock: C,
}

impl<C: Clock> CheckpointManager<C> {
    pub fn new(layout: StoreLayout, clock: C) -> Self {
        Self { layout, clock }
    }

    fn dir(&self) -> PathBuf {
        self.layout.checkpoints_dir()
    }

    /// Snapshot the index and every agent document.
    pub fn capture(&self, reason: &str) -> Result<CheckpointInfo, CheckpointError> {
        let root = self.dir();
        fs::create_dir_all(&root)?;
        let now = self.clock.epoch_ms();

        let staging = root.join(format!(
            ".staging-{}-{}",
            std::process::id(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        let staged_agents = staging.join("agents");
        fs::create_dir_all(&staged_agents)?;

        let result = self.fill_staging(&staging, &staged_agents, now, reason);
        let manifest = match result {
            Ok(manifest) => manifest,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let (id, path) = self.claim_name(&root, now);
        let manifest = Manifest { id, ..manifest };
        write_atomic(
            &FsWriter,
            &staging.join("manifest.json"),
            &serde_json::to_vec_pretty(&manifest)?,
        )?;
        fsync_dir(&staged_agents)?;
        if let Err(e) = fs::rename(&staging, &path) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e.into());
        }
        fsync_dir(&root)?;

        info!(
            checkpoint = %manifest.id,
            agents = manifest.agents.len(),
            reason,
            "checkpoint captured"
        );
        Ok(CheckpointInfo { manifest, path })
    }

    fn fill_staging(
        &self,
        staging: &Path,
        staged_agents: &Path,
        now: u64,
        reason: &str,
    ) -> Result<Manifest, CheckpointError> {
        let src = self.layout.agents_dir();
        let mut agents = Vec::new();
        for stem in json_stems(&src)? {
            let file = format!("{stem}.json");
            match fs::copy(src.join(&file), staged_agents.join(&file)) {
                Ok(_) => agents.push(AgentId::new(stem)),
                // Archived between listing and copying.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        match fs::copy(self.layout.index_path(), staging.join("index.json")) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Manifest {
            id: String::new(),
            created_at_ms: now,
            reason: reason.to_string(),
            agents,
        })
    }

    /// First free `<timestamp>[-n]` name.
    fn claim_name(&self, root: &Path, now: u64) -> (String, PathBuf) {
        let base = checkpoint_stamp(now);
        let mut n = 1;
        let mut id = base.clone();
        loop {
            let path = root.join(&id);
            if !path.exists() {
                return (id, path);
            }
            n += 1;
            id = format!("{base}-{n}");
        }
    }

    /// All checkpoints, oldest first.
    pub fn list(&self) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let root = self.dir();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') || !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            match read_manifest(&path) {
                Ok(manifest) => found.push(CheckpointInfo { manifest, path }),
                Err(e) => {
                    warn!(checkpoint = name, error = %e, "skipping unreadable checkpoint");
                }
            }
        }
        found.sort_by(|a, b| {
            a.manifest
                .created_at_ms
                .cmp(&b.manifest.created_at_ms)
                .then_with(|| suffix(a.id()).cmp(&suffix(b.id())))
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(found)
    }

    pub fn latest(&self) -> Result<Option<CheckpointInfo>, CheckpointError> {
        Ok(self.list()?.pop())
    }

    pub fn resolve(&self, selector: &CheckpointSelector) -> Result<CheckpointInfo, CheckpointError> {
        let mut all = self.list()?;
        match selector {
            CheckpointSelector::Latest => all
                .pop()
                .ok_or_else(|| CheckpointError::NotFound("no checkpoints".into())),
            CheckpointSelector::Id(prefix) => {
                if let Some(pos) = all.iter().position(|c| c.id() == prefix) {
                    return Ok(all.swap_remove(pos));
                }
                let mut matching: Vec<_> = all
                    .into_iter()
                    .filter(|c| !prefix.is_empty() && c.id().starts_with(prefix.as_str()))
                    .collect();
                match matching.len() {
                    0 => Err(CheckpointError::NotFound(prefix.clone())),
                    1 => Ok(matching.remove(0)),
                    count => Err(CheckpointError::Ambiguous {
                        prefix: prefix.clone(),
                        count,
                    }),
                }
            }
        }
    }

    /// Replace all agent documents and the index with a checkpoint's copies.
    ///
    /// Documents are restored verbatim, versions included. Without
    /// `confirmed` nothing is touched.
    pub fn restore(
        &self,
        selector: &CheckpointSelector,
        confirmed: bool,
    ) -> Result<RestoreReport, CheckpointError> {
        let checkpoint = self.resolve(selector)?;
        if !confirmed {
            return Err(CheckpointError::Unconfirmed);
        }

        let live = self.layout.agents_dir();
        let before: Vec<AgentId> = json_stems(&live)?.into_iter().map(AgentId::from).collect();

        let root = self.layout.root();
        let pid = std::process::id();
        let incoming = root.join(format!(".agents.restore-{pid}"));
        let outgoing = root.join(format!(".agents.old-{pid}"));
        for stale in [&incoming, &outgoing] {
            if stale.exists() {
                fs::remove_dir_all(stale)?;
            }
        }

        fs::create_dir_all(&incoming)?;
        let snap_agents = checkpoint.path.join("agents");
        let mut restored = Vec::new();
        for stem in json_stems(&snap_agents)? {
            let file = format!("{stem}.json");
            fs::copy(snap_agents.join(&file), incoming.join(&file))?;
            restored.push(AgentId::new(stem));
        }
        fsync_dir(&incoming)?;

        if live.exists() {
            fs::rename(&live, &outgoing)?;
        }
        if let Err(e) = fs::rename(&incoming, &live) {
            // Put the previous state back before surfacing the error.
            if outgoing.exists() {
                let _ = fs::rename(&outgoing, &live);
            }
            return Err(e.into());
        }
        fsync_dir(root)?;

        let snap_index = checkpoint.path.join("index.json");
        if snap_index.is_file() {
            write_atomic(&FsWriter, &self.layout.index_path(), &fs::read(&snap_index)?)?;
        } else {
            let _ = fs::remove_file(self.layout.index_path());
        }
        if outgoing.exists() {
            fs::remove_dir_all(&outgoing)?;
        }

        let discarded = before
            .into_iter()
            .filter(|id| !restored.contains(id))
            .collect();
        info!(
            checkpoint = %checkpoint.id(),
            restored = restored.len(),
            "checkpoint restored"
        );
        Ok(RestoreReport {
            checkpoint,
            restored,
            discarded,
        })
    }

    /// Delete all but the newest `keep_last` checkpoints. Returns removed ids.
    pub fn prune(&self, keep_last: usize) -> Result<Vec<String>, CheckpointError> {
        let all = self.list()?;
        let excess = all.len().saturating_sub(keep_last);
        let mut removed = Vec::new();
        for checkpoint in all.into_iter().take(excess) {
            fs::remove_dir_all(&checkpoint.path)?;
            removed.push(checkpoint.manifest.id);
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), keep_last, "checkpoints pruned");
        }
        Ok(removed)
    }

    /// Newest readable copy of one agent, searching checkpoints newest first.
    pub fn find_document(
        &self,
        id: &AgentId,
    ) -> Result<Option<(CheckpointInfo, Versioned<Agent>)>, CheckpointError> {
        for checkpoint in self.list()?.into_iter().rev() {
            let path = checkpoint.path.join("agents").join(format!("{id}.json"));
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<Versioned<Agent>>(&bytes) {
                Ok(doc) => return Ok(Some((checkpoint, doc))),
                Err(e) => {
                    warn!(checkpoint = %checkpoint.id(), agent = %id, error = %e, "unreadable copy in checkpoint");
                }
            }
        }
        Ok(None)
    }

    /// Capture when the newest checkpoint is older than `interval` (or none exists).
    pub fn maybe_capture(
        &self,
        interval: Duration,
        reason: &str,
    ) -> Result<Option<CheckpointInfo>, CheckpointError> {
        let now = self.clock.epoch_ms();
        let due = match self.latest()? {
            None => true,
            Some(latest) => {
                now.saturating_sub(latest.manifest.created_at_ms) >= interval.as_millis() as u64
            }
        };
        if due {
            self.capture(reason).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn read_manifest(dir: &Path) -> Result<Manifest, CheckpointError> {
    let bytes = fs::read(dir.join("manifest.json"))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `YYYYMMDDTHHMMSS.mmmZ` for an epoch-millisecond instant.
pub fn checkpoint_stamp(epoch_ms: u64) -> String {
    match i64::try_from(epoch_ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    {
        Some(t) => t.format("%Y%m%dT%H%M%S%.3fZ").to_string(),
        None => format!("{epoch_ms}"),
    }
}

/// Numeric `-n` suffix of a checkpoint id (1 when absent).
fn suffix(id: &str) -> u32 {
    id.rsplit_once('-')
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(1)
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
