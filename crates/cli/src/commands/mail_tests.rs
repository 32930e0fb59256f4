// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctm_core::test_support::T0;
use serial_test::serial;

#[test]
#[serial]
fn message_line_shows_sender_age_and_body() {
    std::env::set_var("NO_COLOR", "1");
    let msg = Message {
        id: "m1".into(),
        from: "session-a".into(),
        to: "session-b".into(),
        body: "parser tests are green".into(),
        sent_at_ms: T0,
        ttl_secs: 3600,
    };
    assert_eq!(
        format_message(&msg, T0 + 90_000),
        "session-a 1m ago parser tests are green"
    );
}
