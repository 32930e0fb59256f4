// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consolidation sinks.
//!
//! On completion the manager hands a [`ConsolidationEvent`] to exactly one
//! sink, once. Delivery happens after the completion is committed, so a sink
//! failure is reported but never rolls the completion back.

use ctm_core::ConsolidationEvent;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("consolidation outbox io: {0}")]
    Io(#[from] io::Error),
    #[error("consolidation payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Rejected(String),
}

/// Receiver of completion payloads for project memory and search indexing.
pub trait ConsolidationSink: Send + Sync {
    fn deliver(&self, event: &ConsolidationEvent) -> Result<(), SinkError>;
}

/// Appends one JSON line per event to `outbox/consolidation.jsonl`.
#[derive(Debug, Clone)]
pub struct OutboxSink {
    path: PathBuf,
}

impl OutboxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ConsolidationSink for OutboxSink {
    fn deliver(&self, event: &ConsolidationEvent) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ConsolidationSink for NullSink {
    fn deliver(&self, _event: &ConsolidationEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{read_outbox, RecordingSink};

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
