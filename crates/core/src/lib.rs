// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ctm-core: data model and pure logic for the cognitive task manager

pub mod agent;
pub mod clock;
pub mod config;
pub mod consolidation;
pub mod graph;
pub mod id;
pub mod priority;
pub mod time_fmt;
pub mod transition;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{
    clamp_unit, Agent, AgentId, AgentStatus, Context, Dependencies, LogEntry, NewAgent,
    ParseEnumError, Priority, PriorityLevel, StartMode, State, Task, Timing, DEFAULT_LANE,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{CheckpointConfig, Config, ConfigError, MailboxConfig, StoreConfig, TierConfig};
pub use consolidation::ConsolidationEvent;
pub use graph::{DependencyGraph, GraphError};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use priority::{
    rank_queue, score, Ranked, ScoreBreakdown, ScoreConfig, ScoreContext, ScoreWeights,
    UrgencyTier,
};
pub use time_fmt::{format_ago, format_deadline, format_elapsed, format_elapsed_ms};
pub use transition::{TransitionContext, TransitionEffect, TransitionError};
