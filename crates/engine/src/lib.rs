// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ctm task manager: the operations behind every CLI command

mod error;
mod manager;
mod repair;
pub mod sink;

pub use error::EngineError;
pub use manager::{
    AgentView, Completion, Impact, NoteKind, QueueEntry, TaskManager, WorkingSet,
};
pub use repair::{RepairOptions, RepairReport, StatusFix};
pub use sink::{ConsolidationSink, NullSink, OutboxSink, SinkError};

#[cfg(any(test, feature = "test-support"))]
pub use sink::{read_outbox, RecordingSink};
