// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::patch::Change;
use crate::repository::AgentRepository;
use ctm_core::{AgentStatus, FakeClock, NewAgent, SequentialIdGen};

struct Fixture {
    _dir: tempfile::TempDir,
    clock: FakeClock,
    repo: AgentRepository<FakeClock, SequentialIdGen>,
    checkpoints: CheckpointManager<FakeClock>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::default();
    let layout = StoreLayout::new(dir.path());
    let repo =
        AgentRepository::open(layout.clone(), clock.clone(), SequentialIdGen::default()).unwrap();
    let checkpoints = CheckpointManager::new(layout, clock.clone());
    Fixture {
        _dir: dir,
        clock,
        repo,
        checkpoints,
    }
}

#[test]
fn stamp_format() {
    assert_eq!(checkpoint_stamp(1_767_225_600_123), "20260101T000000.123Z");
}

#[test]
fn capture_copies_documents_and_index() {
    let f = fixture();
    let a = f.repo.create(NewAgent::new("a")).unwrap();
    let info = f.checkpoints.capture("manual").unwrap();

    assert_eq!(info.id(), "20260101T000000.000Z");
    assert_eq!(info.manifest.agents, vec![a.data.id.clone()]);
    assert_eq!(info.manifest.reason, "manual");
    assert!(info.path.join("index.json").is_file());
    assert_eq!(
        fs::read(info.path.join("agents/agent-1.json")).unwrap(),
        fs::read(f.repo.layout().agent_path(&a.data.id)).unwrap()
    );
}

#[test]
fn same_instant_gets_suffix_and_sorts_after() {
    let f = fixture();
    let first = f.checkpoints.capture("one").unwrap();
    let second = f.checkpoints.capture("two").unwrap();
    assert_eq!(second.id(), format!("{}-2", first.id()));

    let ids: Vec<String> = f
        .checkpoints
        .list()
        .unwrap()
        .iter()
        .map(|c| c.id().to_string())
        .collect();
    assert_eq!(ids, vec![first.id().to_string(), second.id().to_string()]);
    assert_eq!(f.checkpoints.latest().unwrap().unwrap().id(), second.id());
}

#[test]
fn staging_directories_are_not_listed() {
    let f = fixture();
    fs::create_dir_all(f.repo.layout().checkpoints_dir().join(".staging-1-0/agents")).unwrap();
    assert!(f.checkpoints.list().unwrap().is_empty());
}

#[test]
fn restore_round_trips_every_field() {
    let f = fixture();
    let a = f.repo.create(NewAgent::new("a").goal("ship")).unwrap();
    f.repo
        .apply(
            &a.data.id,
            &[Change::Decision("use fs2".into()), Change::Progress(40)]
                .into_iter()
                .collect(),
        )
        .unwrap();
    let b = f.repo.create(NewAgent::new("b")).unwrap();
    let snapshot_state = f.repo.scan().unwrap().agents;
    let snapshot_index = f.repo.index().unwrap();
    let info = f.checkpoints.capture("before edits").unwrap();

    f.clock.advance(Duration::from_secs(5));
    f.repo.transition(&b.data.id, AgentStatus::Completed).unwrap();
    f.repo.create(NewAgent::new("c")).unwrap();

    let report = f
        .checkpoints
        .restore(&CheckpointSelector::Id(info.id().to_string()), true)
        .unwrap();
    assert_eq!(report.restored.len(), 2);
    assert_eq!(report.discarded, vec![AgentId::new("agent-3")]);
    assert_eq!(f.repo.scan().unwrap().agents, snapshot_state);
    assert_eq!(f.repo.index().unwrap(), snapshot_index);
}

#[test]
fn restore_requires_confirmation() {
    let f = fixture();
    f.repo.create(NewAgent::new("a")).unwrap();
    f.checkpoints.capture("x").unwrap();
    f.repo.create(NewAgent::new("b")).unwrap();

    let err = f
        .checkpoints
        .restore(&CheckpointSelector::Latest, false)
        .unwrap_err();
    assert!(matches!(err, CheckpointError::Unconfirmed));
    assert_eq!(f.repo.ids().unwrap().len(), 2);
}

#[test]
fn restore_unknown_checkpoint_fails() {
    let f = fixture();
    assert!(matches!(
        f.checkpoints.restore(&CheckpointSelector::Latest, true),
        Err(CheckpointError::NotFound(_))
    ));
    f.checkpoints.capture("x").unwrap();
    assert!(matches!(
        f.checkpoints
            .restore(&CheckpointSelector::Id("1999".into()), true),
        Err(CheckpointError::NotFound(_))
    ));
}

#[test]
fn resolve_by_prefix() {
    let f = fixture();
    f.checkpoints.capture("x").unwrap();
    f.clock.advance(Duration::from_secs(86_400));
    let later = f.checkpoints.capture("y").unwrap();
    assert_eq!(
        f.checkpoints
            .resolve(&CheckpointSelector::Id("20260102".into()))
            .unwrap()
            .id(),
        later.id()
    );
    assert!(matches!(
        f.checkpoints.resolve(&CheckpointSelector::Id("2026".into())),
        Err(CheckpointError::Ambiguous { count: 2, .. })
    ));
}

#[test]
fn prune_keeps_newest() {
    let f = fixture();
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(f.checkpoints.capture("tick").unwrap().manifest.id);
        f.clock.advance(Duration::from_secs(1));
    }
    let removed = f.checkpoints.prune(2).unwrap();
    assert_eq!(removed, ids[..3].to_vec());
    let left: Vec<String> = f
        .checkpoints
        .list()
        .unwrap()
        .into_iter()
        .map(|c| c.manifest.id)
        .collect();
    assert_eq!(left, ids[3..].to_vec());
    assert!(f.checkpoints.prune(10).unwrap().is_empty());
}

#[test]
fn find_document_skips_unreadable_copies() {
    let f = fixture();
    let a = f.repo.create(NewAgent::new("a")).unwrap();
    let good = f.checkpoints.capture("good").unwrap();
    f.clock.advance(Duration::from_secs(1));
    fs::write(f.repo.layout().agent_path(&a.data.id), b"{broken").unwrap();
    f.checkpoints.capture("bad").unwrap();

    let (found_in, doc) = f.checkpoints.find_document(&a.data.id).unwrap().unwrap();
    assert_eq!(found_in.id(), good.id());
    assert_eq!(doc.data, a.data);
    assert!(f
        .checkpoints
        .find_document(&AgentId::new("nobody"))
        .unwrap()
        .is_none());
}

#[test]
fn maybe_capture_respects_interval() {
    let f = fixture();
    let interval = Duration::from_secs(3600);
    assert!(f.checkpoints.maybe_capture(interval, "cadence").unwrap().is_some());
    f.clock.advance(Duration::from_secs(60));
    assert!(f.checkpoints.maybe_capture(interval, "cadence").unwrap().is_none());
    f.clock.advance(interval);
    assert!(f.checkpoints.maybe_capture(interval, "cadence").unwrap().is_some());
    assert_eq!(f.checkpoints.list().unwrap().len(), 2);
}
