// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout of a state directory.
//!
//! ```text
//! <root>/
//!   agents/<id>.json          one versioned document per agent
//!   index.json                versioned summary index + per-lane active id
//!   deps.lock                 gate for dependency edge changes
//!   focus.lock                gate for promotions to active
//!   archive/<id>.json         archived terminal agents
//!   checkpoints/<ts>/         immutable snapshots
//!   mailbox/<recipient>/      pending messages
//!   outbox/consolidation.jsonl
//!   config.toml
//!   ctm.log
//! ```

use ctm_core::AgentId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn agent_path(&self, id: &AgentId) -> PathBuf {
        self.agents_dir().join(format!("{id}.json"))
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    /// Held while a dependency edge is checked and persisted. Taken before
    /// the focus gate when both are needed.
    pub fn deps_gate_path(&self) -> PathBuf {
        self.root.join("deps.lock")
    }

    /// Held while an agent is promoted to active.
    pub fn focus_gate_path(&self) -> PathBuf {
        self.root.join("focus.lock")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    pub fn mailbox_dir(&self) -> PathBuf {
        self.root.join("mailbox")
    }

    pub fn inbox_dir(&self, recipient: &str) -> PathBuf {
        self.mailbox_dir().join(recipient)
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.root.join("outbox")
    }

    pub fn consolidation_outbox(&self) -> PathBuf {
        self.outbox_dir().join("consolidation.jsonl")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("ctm.log")
    }

    /// Create every directory the layout needs.
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [
            self.agents_dir(),
            self.archive_dir(),
            self.checkpoints_dir(),
            self.mailbox_dir(),
            self.outbox_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Ids of the `*.json` documents directly inside `dir`, sorted.
///
/// Temp files, lock sidecars, backups and hidden entries are ignored.
pub(crate) fn json_stems(dir: &Path) -> io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut stems = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with('.') || !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(stem) = name.strip_suffix(".json") {
            if !stem.is_empty() && !stem.contains(".tmp.") {
                stems.push(stem.to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
