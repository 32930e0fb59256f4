// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory sink and outbox reader for tests

use super::{ConsolidationSink, SinkError};
use ctm_core::ConsolidationEvent;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Keeps delivered events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ConsolidationEvent>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ConsolidationEvent> {
        self.events.lock().clone()
    }

    /// Make subsequent deliveries fail.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

impl ConsolidationSink for RecordingSink {
    fn deliver(&self, event: &ConsolidationEvent) -> Result<(), SinkError> {
        if *self.fail.lock() {
            return Err(SinkError::Rejected("recording sink set to fail".into()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Read back every event in an outbox file. Unparsable lines are skipped.
pub fn read_outbox(path: &Path) -> Result<Vec<ConsolidationEvent>, SinkError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable outbox line");
                None
            }
        })
        .collect())
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
