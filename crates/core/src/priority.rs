// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority scoring.
//!
//! `score(agent, now)` is a pure weighted sum of urgency, recency, value,
//! novelty, user signal and error boost, plus an additive project boost that
//! can push the total above 1.0. Queue order is score descending, then
//! `created_at` ascending, then id.

use crate::agent::Agent;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

const HOUR_MS: u64 = 60 * 60 * 1000;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Failures at which the error boost saturates.
const ERROR_BOOST_SATURATION: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub urgency: f64,
    pub recency: f64,
    pub value: f64,
    pub novelty: f64,
    pub user_signal: f64,
    pub error_boost: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            urgency: 0.25,
            recency: 0.25,
            value: 0.20,
            novelty: 0.15,
            user_signal: 0.10,
            error_boost: 0.05,
        }
    }
}

/// Scoring parameters, loaded from the `[scoring]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub weights: ScoreWeights,
    /// Additive bonus when the agent belongs to the current project.
    pub project_boost: f64,
    pub recency_half_life_ms: u64,
    pub novelty_half_life_ms: u64,
    /// Window over which deadline urgency ramps from 0 to 1.
    pub deadline_horizon_ms: u64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            project_boost: 0.20,
            recency_half_life_ms: 4 * HOUR_MS,
            novelty_half_life_ms: 3 * DAY_MS,
            deadline_horizon_ms: 7 * DAY_MS,
        }
    }
}

/// Inputs that are not part of the agent document.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub now_ms: u64,
    pub current_project: Option<&'a Path>,
}

impl<'a> ScoreContext<'a> {
    pub fn at(now_ms: u64) -> Self {
        Self {
            now_ms,
            current_project: None,
        }
    }

    pub fn with_project(mut self, project: Option<&'a Path>) -> Self {
        self.current_project = project;
        self
    }
}

/// Exponential decay `e^(-elapsed/tau)` with `tau = half_life / ln 2`.
///
/// Future timestamps count as zero elapsed; a zero half-life decays instantly.
pub fn decay(elapsed_ms: u64, half_life_ms: u64) -> f64 {
    if half_life_ms == 0 {
        return if elapsed_ms == 0 { 1.0 } else { 0.0 };
    }
    let tau = half_life_ms as f64 / std::f64::consts::LN_2;
    (-(elapsed_ms as f64) / tau).exp()
}

/// Urgency derived from a deadline.
///
/// Ramps linearly from 0 (a full horizon away) to 1 (due now) and keeps
/// growing past 1 once overdue.
pub fn deadline_urgency(deadline_ms: Option<u64>, now_ms: u64, horizon_ms: u64) -> f64 {
    let Some(deadline) = deadline_ms else {
        return 0.0;
    };
    let horizon = horizon_ms.max(1) as f64;
    if now_ms >= deadline {
        1.0 + (now_ms - deadline) as f64 / horizon
    } else {
        let remaining = (deadline - now_ms) as f64;
        (1.0 - remaining / horizon).clamp(0.0, 1.0)
    }
}

/// Coarse deadline bucket used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Overdue,
    DueSoon,
    Scheduled,
    None,
}

impl UrgencyTier {
    pub fn of(deadline_ms: Option<u64>, now_ms: u64) -> Self {
        match deadline_ms {
            None => UrgencyTier::None,
            Some(d) if d <= now_ms => UrgencyTier::Overdue,
            Some(d) if d - now_ms <= DAY_MS => UrgencyTier::DueSoon,
            Some(_) => UrgencyTier::Scheduled,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyTier::Overdue => "overdue",
            UrgencyTier::DueSoon => "due_soon",
            UrgencyTier::Scheduled => "scheduled",
            UrgencyTier::None => "none",
        }
    }
}

/// Unweighted components of a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub urgency: f64,
    pub recency: f64,
    pub value: f64,
    pub novelty: f64,
    pub user_signal: f64,
    pub error_boost: f64,
    pub project_match: bool,
    pub tier: UrgencyTier,
}

impl ScoreBreakdown {
    pub fn of(agent: &Agent, cfg: &ScoreConfig, ctx: &ScoreContext<'_>) -> Self {
        let now = ctx.now_ms;
        let urgency = agent.priority.urgency.max(deadline_urgency(
            agent.timing.deadline_ms,
            now,
            cfg.deadline_horizon_ms,
        ));
        Self {
            urgency,
            recency: decay(
                now.saturating_sub(agent.timing.last_active_ms),
                cfg.recency_half_life_ms,
            ),
            value: agent.priority.value,
            novelty: decay(
                now.saturating_sub(agent.timing.created_at_ms),
                cfg.novelty_half_life_ms,
            ),
            user_signal: agent.priority.level.user_signal(),
            error_boost: (f64::from(agent.state.recent_failures) / ERROR_BOOST_SATURATION).min(1.0),
            project_match: project_matches(agent, ctx.current_project),
            tier: UrgencyTier::of(agent.timing.deadline_ms, now),
        }
    }

    pub fn total(&self, cfg: &ScoreConfig) -> f64 {
        let w = &cfg.weights;
        let boost = if self.project_match {
            cfg.project_boost
        } else {
            0.0
        };
        w.urgency * self.urgency
            + w.recency * self.recency
            + w.value * self.value
            + w.novelty * self.novelty
            + w.user_signal * self.user_signal
            + w.error_boost * self.error_boost
            + boost
    }
}

fn project_matches(agent: &Agent, current: Option<&Path>) -> bool {
    match (current, agent.context.project_path.as_deref()) {
        (Some(current), Some(path)) => path.starts_with(current),
        _ => false,
    }
}

/// Score one agent.
pub fn score(agent: &Agent, cfg: &ScoreConfig, ctx: &ScoreContext<'_>) -> f64 {
    ScoreBreakdown::of(agent, cfg, ctx).total(cfg)
}

/// An item paired with its score and breakdown.
#[derive(Debug, Clone)]
pub struct Ranked<T> {
    pub item: T,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Queue ordering: score descending, then oldest first, then id.
pub fn queue_order(a: (&Agent, f64), b: (&Agent, f64)) -> Ordering {
    b.1.total_cmp(&a.1)
        .then_with(|| a.0.timing.created_at_ms.cmp(&b.0.timing.created_at_ms))
        .then_with(|| a.0.id.cmp(&b.0.id))
}

/// Score and order the schedulable items (active and paused).
pub fn rank_queue<T, I>(items: I, cfg: &ScoreConfig, ctx: &ScoreContext<'_>) -> Vec<Ranked<T>>
where
    T: AsRef<Agent>,
    I: IntoIterator<Item = T>,
{
    let mut ranked: Vec<Ranked<T>> = items
        .into_iter()
        .filter(|item| item.as_ref().state.status.is_schedulable())
        .map(|item| {
            let breakdown = ScoreBreakdown::of(item.as_ref(), cfg, ctx);
            let score = breakdown.total(cfg);
            Ranked {
                item,
                score,
                breakdown,
            }
        })
        .collect();
    ranked.sort_by(|a, b| queue_order((a.item.as_ref(), a.score), (b.item.as_ref(), b.score)));
    ranked
}

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;
