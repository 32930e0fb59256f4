// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctm_core::{FakeClock, SequentialIdGen};
use yare::parameterized;

const DAY: Duration = Duration::from_secs(86_400);

fn mailbox() -> (tempfile::TempDir, FakeClock, Mailbox<FakeClock, SequentialIdGen>) {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::default();
    let mb = Mailbox::new(
        StoreLayout::new(dir.path()),
        clock.clone(),
        SequentialIdGen::new("msg"),
        DAY,
    );
    (dir, clock, mb)
}

#[test]
fn send_then_recv_consumes_in_order() {
    let (dir, clock, mb) = mailbox();
    mb.send("alice", "bob", "first", None).unwrap();
    clock.advance(Duration::from_millis(5));
    mb.send("carol", "bob", "second", None).unwrap();

    let got = mb.recv("bob").unwrap();
    let bodies: Vec<&str> = got.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second"]);
    assert_eq!(got[0].ttl_secs, DAY.as_secs());
    assert!(mb.recv("bob").unwrap().is_empty());
    assert_eq!(fs::read_dir(dir.path().join("mailbox/bob")).unwrap().count(), 0);
}

#[test]
fn recv_is_per_recipient() {
    let (_dir, _clock, mb) = mailbox();
    mb.send("a", "bob", "for bob", None).unwrap();
    assert!(mb.recv("alice").unwrap().is_empty());
    assert_eq!(mb.recv("bob").unwrap().len(), 1);
}

#[test]
fn expired_messages_are_dropped_unread() {
    let (_dir, clock, mb) = mailbox();
    mb.send("a", "bob", "short", Some(Duration::from_secs(10)))
        .unwrap();
    mb.send("a", "bob", "long", None).unwrap();
    clock.advance(Duration::from_secs(10));

    assert_eq!(mb.peek("bob").unwrap().len(), 1);
    let got = mb.recv("bob").unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].body, "long");
    assert!(mb.recv("bob").unwrap().is_empty());
}

#[test]
fn peek_leaves_messages_in_place() {
    let (_dir, _clock, mb) = mailbox();
    mb.send("a", "bob", "hi", None).unwrap();
    assert_eq!(mb.peek("bob").unwrap().len(), 1);
    assert_eq!(mb.peek("bob").unwrap().len(), 1);
    assert_eq!(mb.recv("bob").unwrap().len(), 1);
}

#[test]
fn already_claimed_message_is_skipped() {
    let (dir, _clock, mb) = mailbox();
    let msg = mb.send("a", "bob", "hi", None).unwrap();
    let inbox = dir.path().join("mailbox/bob");
    fs::rename(
        inbox.join(msg.file_name()),
        inbox.join(".stolen.claimed.999"),
    )
    .unwrap();
    assert!(mb.recv("bob").unwrap().is_empty());
}

#[test]
fn corrupt_message_is_discarded() {
    let (dir, _clock, mb) = mailbox();
    let inbox = dir.path().join("mailbox/bob");
    fs::create_dir_all(&inbox).unwrap();
    fs::write(inbox.join("0000000000000-bad.json"), b"not json").unwrap();
    mb.send("a", "bob", "ok", None).unwrap();

    let got = mb.recv("bob").unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(fs::read_dir(&inbox).unwrap().count(), 0);
}

#[test]
fn purge_removes_expired_across_inboxes() {
    let (_dir, clock, mb) = mailbox();
    mb.send("a", "bob", "x", Some(Duration::from_secs(1))).unwrap();
    mb.send("a", "carol", "y", Some(Duration::from_secs(1))).unwrap();
    mb.send("a", "carol", "z", None).unwrap();
    clock.advance(Duration::from_secs(2));

    assert_eq!(mb.purge_expired().unwrap(), 2);
    assert_eq!(mb.peek("carol").unwrap().len(), 1);
    assert_eq!(mb.purge_expired().unwrap(), 0);
}

#[parameterized(
    empty = { "" },
    blank = { "  " },
    hidden = { ".bob" },
    nested = { "a/b" },
    parent = { ".." },
)]
fn rejects_bad_recipient(name: &str) {
    let (_dir, _clock, mb) = mailbox();
    assert!(matches!(
        mb.send("a", name, "x", None),
        Err(MailboxError::InvalidRecipient(_))
    ));
}
