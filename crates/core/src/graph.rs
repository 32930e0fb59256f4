// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory dependency graph over agent blocking edges.
//!
//! The graph is a derived view rebuilt from agent documents; `blocked_by` on
//! disk stays authoritative. Edges point from the blocked agent to its
//! blocker. Every insertion is cycle-checked first and a rejected insertion
//! leaves the graph untouched.

use crate::agent::{Agent, AgentId};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("adding {blocked} blocked-by {blocker} would create a cycle: {}", render_path(.path))]
    CycleDetected {
        blocked: AgentId,
        blocker: AgentId,
        /// Path from `blocked` around the cycle and back to `blocked`.
        path: Vec<AgentId>,
    },
}

fn render_path(path: &[AgentId]) -> String {
    path.iter()
        .map(AgentId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// blocked -> blockers
    blockers: BTreeMap<AgentId, BTreeSet<AgentId>>,
    /// blocker -> dependents
    dependents: BTreeMap<AgentId, BTreeSet<AgentId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `blocked_by` sets of non-terminal agents.
    ///
    /// Edges that would close a cycle are skipped and returned so the caller
    /// can report them; repair is responsible for fixing the documents.
    pub fn from_agents<'a, I>(agents: I) -> (Self, Vec<GraphError>)
    where
        I: IntoIterator<Item = &'a Agent>,
    {
        let mut graph = Self::new();
        let mut rejected = Vec::new();
        for agent in agents {
            if agent.is_terminal() {
                continue;
            }
            for blocker in &agent.deps.blocked_by {
                if let Err(e) = graph.add_edge(&agent.id, blocker) {
                    rejected.push(e);
                }
            }
        }
        (graph, rejected)
    }

    /// Reject `blocked -> blocker` if `blocker` already reaches `blocked`.
    pub fn check_edge(&self, blocked: &AgentId, blocker: &AgentId) -> Result<(), GraphError> {
        if let Some(mut path) = self.path(blocker, blocked) {
            // The new edge closes the loop.
            path.insert(0, blocked.clone());
            return Err(GraphError::CycleDetected {
                blocked: blocked.clone(),
                blocker: blocker.clone(),
                path,
            });
        }
        Ok(())
    }

    /// Insert `blocked -> blocker`. Returns `false` when the edge already existed.
    pub fn add_edge(&mut self, blocked: &AgentId, blocker: &AgentId) -> Result<bool, GraphError> {
        if self.contains_edge(blocked, blocker) {
            return Ok(false);
        }
        self.check_edge(blocked, blocker)?;
        self.blockers
            .entry(blocked.clone())
            .or_default()
            .insert(blocker.clone());
        self.dependents
            .entry(blocker.clone())
            .or_default()
            .insert(blocked.clone());
        Ok(true)
    }

    /// Remove `blocked -> blocker`. Returns `false` when it was absent.
    pub fn remove_edge(&mut self, blocked: &AgentId, blocker: &AgentId) -> bool {
        let removed = remove_from(&mut self.blockers, blocked, blocker);
        remove_from(&mut self.dependents, blocker, blocked);
        removed
    }

    pub fn contains_edge(&self, blocked: &AgentId, blocker: &AgentId) -> bool {
        self.blockers
            .get(blocked)
            .is_some_and(|set| set.contains(blocker))
    }

    pub fn blockers(&self, id: &AgentId) -> impl Iterator<Item = &AgentId> {
        self.blockers.get(id).into_iter().flatten()
    }

    pub fn dependents(&self, id: &AgentId) -> impl Iterator<Item = &AgentId> {
        self.dependents.get(id).into_iter().flatten()
    }

    pub fn is_blocked(&self, id: &AgentId) -> bool {
        self.blockers.get(id).is_some_and(|set| !set.is_empty())
    }

    /// Remove `finished` as a blocker everywhere.
    ///
    /// Returns the dependents whose blocker set became empty, in id order.
    pub fn unblock_cascade(&mut self, finished: &AgentId) -> Vec<AgentId> {
        let Some(dependents) = self.dependents.remove(finished) else {
            return Vec::new();
        };
        let mut freed = Vec::new();
        for dependent in dependents {
            if let Some(set) = self.blockers.get_mut(&dependent) {
                set.remove(finished);
                if set.is_empty() {
                    self.blockers.remove(&dependent);
                    freed.push(dependent);
                }
            }
        }
        freed
    }

    /// Drop a node and every edge touching it.
    pub fn remove_node(&mut self, id: &AgentId) {
        self.unblock_cascade(id);
        if let Some(blockers) = self.blockers.remove(id) {
            for blocker in blockers {
                remove_from(&mut self.dependents, &blocker, id);
            }
        }
    }

    /// Blockers ranked by how many agents they currently hold up.
    ///
    /// Ties are broken by id so the order is stable.
    pub fn high_impact_nodes(&self) -> Vec<(AgentId, usize)> {
        let mut ranked: Vec<(AgentId, usize)> = self
            .dependents
            .iter()
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(id, deps)| (id.clone(), deps.len()))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// All edges as `(blocked, blocker)` pairs, in order.
    pub fn edges(&self) -> Vec<(AgentId, AgentId)> {
        self.blockers
            .iter()
            .flat_map(|(blocked, set)| set.iter().map(|b| (blocked.clone(), b.clone())))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.blockers.values().map(BTreeSet::len).sum()
    }

    /// First cycle found, as a closed path (`a -> b -> .. -> a`).
    pub fn find_cycle(&self) -> Option<Vec<AgentId>> {
        let mut done = BTreeSet::new();
        for start in self.blockers.keys() {
            if done.contains(start) {
                continue;
            }
            let mut stack = Vec::new();
            let mut on_stack = BTreeSet::new();
            if let Some(cycle) = self.dfs_cycle(start, &mut stack, &mut on_stack, &mut done) {
                return Some(cycle);
            }
        }
        None
    }

    pub fn is_acyclic(&self) -> bool {
        self.find_cycle().is_none()
    }

    fn dfs_cycle(
        &self,
        node: &AgentId,
        stack: &mut Vec<AgentId>,
        on_stack: &mut BTreeSet<AgentId>,
        done: &mut BTreeSet<AgentId>,
    ) -> Option<Vec<AgentId>> {
        stack.push(node.clone());
        on_stack.insert(node.clone());
        for next in self.blockers(node) {
            if on_stack.contains(next) {
                let start = stack.iter().position(|n| n == next).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(next.clone());
                return Some(cycle);
            }
            if !done.contains(next) {
                if let Some(cycle) = self.dfs_cycle(next, stack, on_stack, done) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        on_stack.remove(node);
        done.insert(node.clone());
        None
    }

    /// Path `from -> .. -> to` following blocker edges, if one exists.
    fn path(&self, from: &AgentId, to: &AgentId) -> Option<Vec<AgentId>> {
        if from == to {
            return Some(vec![from.clone()]);
        }
        let mut visited = BTreeSet::new();
        let mut parent: BTreeMap<AgentId, AgentId> = BTreeMap::new();
        let mut stack = vec![from.clone()];
        visited.insert(from.clone());
        while let Some(node) = stack.pop() {
            for next in self.blockers(&node) {
                if !visited.insert(next.clone()) {
                    continue;
                }
                parent.insert(next.clone(), node.clone());
                if next == to {
                    let mut path = vec![to.clone()];
                    let mut cur = to;
                    while let Some(p) = parent.get(cur) {
                        path.push(p.clone());
                        cur = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                stack.push(next.clone());
            }
        }
        None
    }
}

fn remove_from(
    map: &mut BTreeMap<AgentId, BTreeSet<AgentId>>,
    key: &AgentId,
    value: &AgentId,
) -> bool {
    let Some(set) = map.get_mut(key) else {
        return false;
    };
    let removed = set.remove(value);
    if set.is_empty() {
        map.remove(key);
    }
    removed
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
