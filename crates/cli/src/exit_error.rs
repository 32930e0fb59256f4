// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors that carry a specific process exit code.

use std::fmt;

use ctm_engine::EngineError;

/// Exit code for input the command refused to act on.
pub const VALIDATION: i32 = 2;

/// An error that `main` turns into a specific exit code.
#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Map validation failures to exit code 2, anything else to 1.
    pub fn from_validation(err: EngineError) -> anyhow::Error {
        if err.is_validation() {
            ExitError::new(VALIDATION, err.to_string()).into()
        } else {
            err.into()
        }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExitError {}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
