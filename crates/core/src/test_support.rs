// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::agent::{Agent, AgentId, NewAgent};
use crate::clock::FakeClock;

/// Instant used by [`FakeClock::default`].
pub const T0: u64 = 1_767_225_600_000;

/// Active medium-priority agent created and last touched at [`T0`].
pub fn agent(id: &str) -> Agent {
    agent_at(id, T0)
}

/// Active medium-priority agent created and last touched at `at_ms`.
pub fn agent_at(id: &str, at_ms: u64) -> Agent {
    NewAgent::new(format!("task {id}")).into_agent(AgentId::new(id), at_ms)
}

pub fn ids(raw: &[&str]) -> Vec<AgentId> {
    raw.iter().copied().map(AgentId::from).collect()
}

pub fn clock() -> FakeClock {
    FakeClock::new(T0)
}
