//! CLI help output specs

use crate::prelude::*;

#[test]
fn ctm_no_args_shows_usage_and_exits_zero() {
    cli().passes().stdout_has("Usage:");
}

#[test]
fn ctm_help_lists_commands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("spawn")
        .stdout_has("queue")
        .stdout_has("repair");
}

#[test]
fn spawn_help_shows_priority_levels() {
    cli()
        .args(&["spawn", "--help"])
        .passes()
        .stdout_has("--blocked-by")
        .stdout_has("critical");
}
