// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod agent;
pub mod checkpoint;
pub mod mail;
pub mod queue;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use ctm_core::{AgentId, Clock, Config, SystemClock, UuidIdGen};
use ctm_engine::{OutboxSink, TaskManager};
use ctm_storage::StoreLayout;

use crate::output::OutputFormat;

pub type Manager = TaskManager<SystemClock, UuidIdGen>;

/// The opened task manager plus the caller's focus for this invocation.
pub struct Ctx {
    pub tm: Manager,
    pub format: OutputFormat,
    pub lane: String,
    project: Option<PathBuf>,
}

impl Ctx {
    pub fn open(
        layout: StoreLayout,
        format: OutputFormat,
        lane: String,
        project: Option<PathBuf>,
    ) -> Result<Self> {
        let config = Config::load(&layout.config_path())?;
        let sink = Arc::new(OutboxSink::new(layout.consolidation_outbox()));
        let tm = TaskManager::open(layout, config, SystemClock, UuidIdGen, sink)?;
        Ok(Self {
            tm,
            format,
            lane,
            project,
        })
    }

    pub fn now_ms(&self) -> u64 {
        self.tm.repo().clock().epoch_ms()
    }

    pub fn project(&self) -> Option<&Path> {
        self.project.as_deref()
    }

    /// Resolve a full id or unique prefix.
    pub fn id(&self, prefix: &str) -> Result<AgentId> {
        Ok(self.tm.resolve(prefix)?)
    }

    /// Resolve `prefix`, or fall back to the active agent in the caller's lane.
    pub fn target(&self, prefix: Option<&str>) -> Result<AgentId> {
        Ok(self.tm.target(prefix, &self.lane)?)
    }
}
