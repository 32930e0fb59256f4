//! Behavioral specifications for the ctm CLI.
//!
//! These tests are black-box: they invoke the CLI binary against a
//! temporary state directory and verify stdout, stderr, and exit codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/errors.rs"]
mod cli_errors;
#[path = "specs/cli/help.rs"]
mod cli_help;

// agent/
#[path = "specs/agent/lifecycle.rs"]
mod agent_lifecycle;
#[path = "specs/agent/scenarios.rs"]
mod agent_scenarios;

// store/
#[path = "specs/store/checkpoint.rs"]
mod store_checkpoint;
#[path = "specs/store/mail.rs"]
mod store_mail;
#[path = "specs/store/repair.rs"]
mod store_repair;
