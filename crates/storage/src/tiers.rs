// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Working-memory tiers: a bounded, per-process cache over agent documents.
//!
//! L1 holds the focused agent (pinned) plus up to `l1_slots` hot agents; L2
//! is a larger LRU. Once a tier passes `pressure` × its token budget, or its
//! slot count, the least recently used member moves down a tier. Agents that
//! fall out of L2 go cold: only a one-line summary is kept and the document
//! is re-read from disk on next access. Nothing here is authoritative.

use crate::versioned::Versioned;
use ctm_core::{Agent, AgentId, AgentStatus, TierConfig};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    L1,
    L2,
    Cold,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::L1 => "L1",
            Tier::L2 => "L2",
            Tier::Cold => "cold",
        })
    }
}

/// Rough token cost of holding a document in context.
pub fn estimate_tokens(doc: &Versioned<Agent>) -> usize {
    serde_json::to_string(doc).map(|s| s.len() / 4 + 1).unwrap_or(1)
}

#[derive(Debug, Clone)]
struct Entry {
    doc: Versioned<Agent>,
    tokens: usize,
    tick: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColdSummary {
    pub id: AgentId,
    pub title: String,
    pub status: AgentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demotion {
    pub id: AgentId,
    pub from: Tier,
    pub to: Tier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierUsage {
    pub l1_count: usize,
    pub l1_tokens: usize,
    pub l2_count: usize,
    pub l2_tokens: usize,
    pub cold_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub usage: TierUsage,
}

#[derive(Debug)]
pub struct WorkingMemory {
    cfg: TierConfig,
    focus: Option<AgentId>,
    l1: BTreeMap<AgentId, Entry>,
    l2: BTreeMap<AgentId, Entry>,
    cold: BTreeMap<AgentId, ColdSummary>,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl WorkingMemory {
    pub fn new(cfg: TierConfig) -> Self {
        Self {
            cfg,
            focus: None,
            l1: BTreeMap::new(),
            l2: BTreeMap::new(),
            cold: BTreeMap::new(),
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn focused(&self) -> Option<&AgentId> {
        self.focus.as_ref()
    }

    /// Pin `doc` in L1 as the focused agent. The previous focus becomes an ordinary L1 member.
    pub fn focus(&mut self, doc: Versioned<Agent>) -> Vec<Demotion> {
        self.focus = Some(doc.data.id.clone());
        self.admit(doc)
    }

    pub fn unfocus(&mut self) -> Vec<Demotion> {
        self.focus = None;
        self.enforce()
    }

    /// Place `doc` at the hot end of L1.
    pub fn admit(&mut self, doc: Versioned<Agent>) -> Vec<Demotion> {
        let id = doc.data.id.clone();
        self.l2.remove(&id);
        self.cold.remove(&id);
        let entry = Entry {
            tokens: estimate_tokens(&doc),
            doc,
            tick: self.next_tick(),
        };
        self.l1.insert(id, entry);
        self.enforce()
    }

    /// Cached copy of `id`, promoting an L2 hit to L1.
    pub fn get(&mut self, id: &AgentId) -> Option<Versioned<Agent>> {
        let tick = self.next_tick();
        if let Some(entry) = self.l1.get_mut(id) {
            entry.tick = tick;
            self.hits += 1;
            return Some(entry.doc.clone());
        }
        if let Some(mut entry) = self.l2.remove(id) {
            self.hits += 1;
            entry.tick = tick;
            let doc = entry.doc.clone();
            self.l1.insert(id.clone(), entry);
            self.enforce();
            return Some(doc);
        }
        self.misses += 1;
        None
    }

    /// Cached copy without touching recency or stats.
    pub fn peek(&self, id: &AgentId) -> Option<&Versioned<Agent>> {
        self.l1.get(id).or_else(|| self.l2.get(id)).map(|e| &e.doc)
    }

    /// Cached copy, or `load` it and admit the result.
    pub fn get_or_load<E>(
        &mut self,
        id: &AgentId,
        load: impl FnOnce(&AgentId) -> Result<Versioned<Agent>, E>,
    ) -> Result<Versioned<Agent>, E> {
        if let Some(doc) = self.get(id) {
            return Ok(doc);
        }
        let doc = load(id)?;
        self.admit(doc.clone());
        Ok(doc)
    }

    /// Replace the cached copy of `doc` if one is held; otherwise do nothing.
    pub fn refresh(&mut self, doc: &Versioned<Agent>) {
        let id = &doc.data.id;
        let tokens = estimate_tokens(doc);
        for tier in [&mut self.l1, &mut self.l2] {
            if let Some(entry) = tier.get_mut(id) {
                entry.doc = doc.clone();
                entry.tokens = tokens;
            }
        }
        if let Some(summary) = self.cold.get_mut(id) {
            summary.title.clone_from(&doc.data.task.title);
            summary.status = doc.data.status();
        }
        self.enforce();
    }

    /// Drop any cached copy of `id`.
    pub fn invalidate(&mut self, id: &AgentId) {
        self.l1.remove(id);
        self.l2.remove(id);
        self.cold.remove(id);
        if self.focus.as_ref() == Some(id) {
            self.focus = None;
        }
    }

    pub fn clear(&mut self) {
        self.focus = None;
        self.l1.clear();
        self.l2.clear();
        self.cold.clear();
    }

    pub fn tier_of(&self, id: &AgentId) -> Option<Tier> {
        if self.l1.contains_key(id) {
            Some(Tier::L1)
        } else if self.l2.contains_key(id) {
            Some(Tier::L2)
        } else if self.cold.contains_key(id) {
            Some(Tier::Cold)
        } else {
            None
        }
    }

    pub fn cold_summaries(&self) -> impl Iterator<Item = &ColdSummary> {
        self.cold.values()
    }

    /// Ids held in `tier`, hottest first.
    pub fn members(&self, tier: Tier) -> Vec<AgentId> {
        let by_heat = |map: &BTreeMap<AgentId, Entry>| {
            let mut v: Vec<_> = map.iter().map(|(id, e)| (e.tick, id.clone())).collect();
            v.sort_by(|a, b| b.0.cmp(&a.0));
            v.into_iter().map(|(_, id)| id).collect()
        };
        match tier {
            Tier::L1 => by_heat(&self.l1),
            Tier::L2 => by_heat(&self.l2),
            Tier::Cold => self.cold.keys().cloned().collect(),
        }
    }

    pub fn usage(&self) -> TierUsage {
        TierUsage {
            l1_count: self.l1.len(),
            l1_tokens: self.l1.values().map(|e| e.tokens).sum(),
            l2_count: self.l2.len(),
            l2_tokens: self.l2.values().map(|e| e.tokens).sum(),
            cold_count: self.cold.len(),
        }
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            hits: self.hits,
            misses: self.misses,
            usage: self.usage(),
        }
    }

    fn threshold(&self, budget: usize) -> usize {
        (budget as f64 * self.cfg.pressure) as usize
    }

    fn l1_over(&self) -> bool {
        let unpinned = self
            .l1
            .keys()
            .filter(|id| Some(*id) != self.focus.as_ref())
            .count();
        unpinned > self.cfg.l1_slots
            || self.l1.values().map(|e| e.tokens).sum::<usize>()
                > self.threshold(self.cfg.l1_token_budget)
    }

    fn l2_over(&self) -> bool {
        self.l2.len() > self.cfg.l2_slots
            || self.l2.values().map(|e| e.tokens).sum::<usize>()
                > self.threshold(self.cfg.l2_token_budget)
    }

    fn lru(map: &BTreeMap<AgentId, Entry>, pinned: Option<&AgentId>) -> Option<AgentId> {
        map.iter()
            .filter(|(id, _)| Some(*id) != pinned)
            .min_by_key(|(_, e)| e.tick)
            .map(|(id, _)| id.clone())
    }

    fn enforce(&mut self) -> Vec<Demotion> {
        let mut demotions = Vec::new();
        while self.l1_over() {
            let Some(id) = Self::lru(&self.l1, self.focus.as_ref()) else {
                break;
            };
            if let Some(entry) = self.l1.remove(&id) {
                self.l2.insert(id.clone(), entry);
                demotions.push(Demotion {
                    id,
                    from: Tier::L1,
                    to: Tier::L2,
                });
            }
        }
        while self.l2_over() {
            let Some(id) = Self::lru(&self.l2, None) else {
                break;
            };
            if let Some(entry) = self.l2.remove(&id) {
                self.cold.insert(
                    id.clone(),
                    ColdSummary {
                        id: id.clone(),
                        title: entry.doc.data.task.title,
                        status: entry.doc.data.state.status,
                    },
                );
                demotions.push(Demotion {
                    id,
                    from: Tier::L2,
                    to: Tier::Cold,
                });
            }
        }
        demotions
    }
}

#[cfg(test)]
#[path = "tiers_tests.rs"]
mod tests;
