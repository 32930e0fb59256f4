// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.

use std::path::PathBuf;

// --- State directory ---

/// Resolve state directory: flag > CTM_STATE_DIR > XDG_STATE_HOME/ctm > ~/.local/state/ctm
pub fn state_dir(flag: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(dir) = flag {
        return Some(dir);
    }
    if let Some(dir) = non_empty("CTM_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("ctm"));
    }
    dirs::home_dir().map(|home| home.join(".local/state/ctm"))
}

// --- Focus ---

/// Lane used when `--lane` is not given.
pub fn lane() -> Option<String> {
    non_empty("CTM_LANE")
}

/// Project used when `--project` is not given.
pub fn project() -> Option<PathBuf> {
    non_empty("CTM_PROJECT").map(PathBuf::from)
}

// --- Color ---

pub fn no_color() -> bool {
    std::env::var("NO_COLOR").is_ok_and(|v| v == "1")
}

pub fn force_color() -> bool {
    std::env::var("COLOR").is_ok_and(|v| v == "1")
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
