// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle state machine.
//!
//! [`validate`] is pure: it checks a requested status change against the
//! transition table and returns the effects the caller must carry out. The
//! repository calls it before every status-changing write, so an illegal
//! request never reaches disk.

use crate::agent::AgentStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Follow-up work a legal transition requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEffect {
    /// Agent gains focus: bump `last_active` and `session_count`.
    Touch,
    /// Agent loses focus: clear the lane's active pointer.
    ReleaseFocus,
    /// Hand decisions and learnings to the consolidation sink.
    Consolidate,
    /// Remove the agent as a blocker from every dependent.
    UnblockDependents,
}

/// Facts about the agent the table depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext {
    pub has_blockers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{from} is terminal")]
    Terminal { from: AgentStatus },
    #[error("cannot block without a blocker")]
    NoBlocker,
    #[error("still has open blockers")]
    StillBlocked,
}

/// Check `from -> to` and return the effects to apply, in order.
///
/// The identity transition is legal and has no effects.
pub fn validate(
    from: AgentStatus,
    to: AgentStatus,
    ctx: &TransitionContext,
) -> Result<Vec<TransitionEffect>, TransitionError> {
    use AgentStatus::*;

    if from == to {
        return Ok(Vec::new());
    }
    if from.is_terminal() {
        return Err(TransitionError::Terminal { from });
    }

    match (from, to) {
        (_, Blocked) if !ctx.has_blockers => return Err(TransitionError::NoBlocker),
        (Blocked, Active | Paused) if ctx.has_blockers => {
            return Err(TransitionError::StillBlocked)
        }
        _ => {}
    }

    let mut effects = Vec::new();
    if from == Active {
        effects.push(TransitionEffect::ReleaseFocus);
    }
    match to {
        Active => effects.push(TransitionEffect::Touch),
        Completed => {
            effects.push(TransitionEffect::Consolidate);
            effects.push(TransitionEffect::UnblockDependents);
        }
        Cancelled => effects.push(TransitionEffect::UnblockDependents),
        Paused | Blocked => {}
    }
    Ok(effects)
}

/// True when `from -> to` passes [`validate`].
pub fn is_legal(from: AgentStatus, to: AgentStatus, ctx: &TransitionContext) -> bool {
    validate(from, to, ctx).is_ok()
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
