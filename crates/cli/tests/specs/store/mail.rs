//! Mailbox delivery between sessions

use crate::prelude::*;

#[test]
fn message_is_received_once() {
    let store = Store::new();
    store
        .ctm()
        .args(&["mail", "send", "reviewer", "api is ready", "--from", "builder"])
        .passes()
        .stdout_has("to reviewer");

    store
        .ctm()
        .args(&["mail", "peek", "reviewer"])
        .passes()
        .stdout_has("api is ready");
    store
        .ctm()
        .args(&["mail", "recv", "reviewer"])
        .passes()
        .stdout_has("builder")
        .stdout_has("api is ready");
    store
        .ctm()
        .args(&["mail", "recv", "reviewer"])
        .passes()
        .stdout_has("No messages");
}

#[test]
fn inboxes_are_separate() {
    let store = Store::new();
    store.ctm().args(&["mail", "send", "alice", "hi alice"]).passes();

    store
        .ctm()
        .args(&["mail", "recv", "bob"])
        .passes()
        .stdout_has("No messages");
    store
        .ctm()
        .args(&["mail", "recv", "alice"])
        .passes()
        .stdout_has("hi alice");
}

#[test]
fn recipient_must_be_a_plain_name() {
    let store = Store::new();
    store
        .ctm()
        .args(&["mail", "send", "../escape", "nope"])
        .fails_with(2);
}
