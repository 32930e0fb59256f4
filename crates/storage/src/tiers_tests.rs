// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctm_core::test_support::agent;

fn doc(id: &str) -> Versioned<Agent> {
    Versioned {
        version: 1,
        last_modified_ms: 0,
        modified_by: "t".into(),
        data: agent(id),
    }
}

fn id(s: &str) -> AgentId {
    AgentId::new(s)
}

fn roomy(l1_slots: usize, l2_slots: usize) -> TierConfig {
    TierConfig {
        l1_slots,
        l1_token_budget: 1_000_000,
        l2_slots,
        l2_token_budget: 1_000_000,
        pressure: 0.7,
    }
}

#[test]
fn slot_overflow_demotes_least_recent() {
    let mut mem = WorkingMemory::new(roomy(2, 8));
    mem.admit(doc("a"));
    mem.admit(doc("b"));
    let demoted = mem.admit(doc("c"));
    assert_eq!(
        demoted,
        vec![Demotion {
            id: id("a"),
            from: Tier::L1,
            to: Tier::L2
        }]
    );
    assert_eq!(mem.members(Tier::L1), vec![id("c"), id("b")]);
}

#[test]
fn focused_agent_is_pinned() {
    let mut mem = WorkingMemory::new(roomy(1, 8));
    mem.focus(doc("focus"));
    mem.admit(doc("b"));
    mem.admit(doc("c"));
    assert_eq!(mem.tier_of(&id("focus")), Some(Tier::L1));
    assert_eq!(mem.tier_of(&id("b")), Some(Tier::L2));
    assert_eq!(mem.tier_of(&id("c")), Some(Tier::L1));
}

#[test]
fn l2_overflow_goes_cold_with_summary() {
    let mut mem = WorkingMemory::new(roomy(1, 1));
    for name in ["a", "b", "c"] {
        mem.admit(doc(name));
    }
    assert_eq!(mem.tier_of(&id("a")), Some(Tier::Cold));
    assert_eq!(mem.tier_of(&id("b")), Some(Tier::L2));
    let summary = mem.cold_summaries().next().unwrap();
    assert_eq!(summary.title, "task a");
    assert_eq!(mem.usage().cold_count, 1);
}

#[test]
fn token_pressure_triggers_eviction() {
    let one = estimate_tokens(&doc("a"));
    let mut mem = WorkingMemory::new(TierConfig {
        l1_slots: 100,
        // Room for two documents at 70% pressure, not three.
        l1_token_budget: (one * 2 * 10).div_ceil(7) + 1,
        l2_slots: 100,
        l2_token_budget: 1_000_000,
        pressure: 0.7,
    });
    mem.admit(doc("a"));
    mem.admit(doc("b"));
    assert_eq!(mem.usage().l1_count, 2);
    mem.admit(doc("c"));
    assert_eq!(mem.usage().l1_count, 2);
    assert_eq!(mem.tier_of(&id("a")), Some(Tier::L2));
}

#[test]
fn l2_hit_promotes_and_counts() {
    let mut mem = WorkingMemory::new(roomy(1, 8));
    mem.admit(doc("a"));
    mem.admit(doc("b"));
    assert_eq!(mem.tier_of(&id("a")), Some(Tier::L2));

    assert!(mem.get(&id("a")).is_some());
    assert_eq!(mem.tier_of(&id("a")), Some(Tier::L1));
    assert_eq!(mem.tier_of(&id("b")), Some(Tier::L2));
    assert!(mem.get(&id("zzz")).is_none());

    let stats = mem.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[test]
fn get_or_load_reads_through_once() {
    let mut mem = WorkingMemory::new(roomy(4, 8));
    let mut loads = 0;
    for _ in 0..3 {
        let got = mem
            .get_or_load(&id("a"), |i| {
                loads += 1;
                Ok::<_, ()>(doc(i.as_str()))
            })
            .unwrap();
        assert_eq!(got.data.id, "a");
    }
    assert_eq!(loads, 1);
}

#[test]
fn cold_agent_reloads_on_access() {
    let mut mem = WorkingMemory::new(roomy(1, 1));
    for name in ["a", "b", "c"] {
        mem.admit(doc(name));
    }
    assert!(mem.get(&id("a")).is_none());
    mem.get_or_load(&id("a"), |i| Ok::<_, ()>(doc(i.as_str())))
        .unwrap();
    assert_eq!(mem.tier_of(&id("a")), Some(Tier::L1));
}

#[test]
fn refresh_and_invalidate() {
    let mut mem = WorkingMemory::new(roomy(4, 8));
    mem.focus(doc("a"));
    let mut newer = doc("a");
    newer.version = 2;
    newer.data.task.title = "renamed".into();
    mem.refresh(&newer);
    assert_eq!(mem.get(&id("a")).unwrap().version, 2);

    mem.refresh(&doc("unknown"));
    assert_eq!(mem.tier_of(&id("unknown")), None);

    mem.invalidate(&id("a"));
    assert_eq!(mem.tier_of(&id("a")), None);
    assert_eq!(mem.focused(), None);
}
