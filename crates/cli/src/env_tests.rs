// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::path::Path;

fn clear() {
    std::env::remove_var("CTM_STATE_DIR");
    std::env::remove_var("XDG_STATE_HOME");
}

#[test]
#[serial]
fn flag_wins_over_environment() {
    std::env::set_var("CTM_STATE_DIR", "/from/env");
    let dir = state_dir(Some(PathBuf::from("/from/flag"))).unwrap();
    assert_eq!(dir, Path::new("/from/flag"));
    clear();
}

#[test]
#[serial]
fn ctm_state_dir_wins_over_xdg() {
    std::env::set_var("CTM_STATE_DIR", "/from/env");
    std::env::set_var("XDG_STATE_HOME", "/xdg");
    assert_eq!(state_dir(None).unwrap(), Path::new("/from/env"));
    clear();
}

#[test]
#[serial]
fn xdg_state_home_gets_ctm_suffix() {
    clear();
    std::env::set_var("XDG_STATE_HOME", "/xdg");
    assert_eq!(state_dir(None).unwrap(), Path::new("/xdg/ctm"));
    clear();
}

#[test]
#[serial]
fn empty_variables_are_ignored() {
    clear();
    std::env::set_var("CTM_STATE_DIR", "");
    std::env::set_var("XDG_STATE_HOME", "/xdg");
    assert_eq!(state_dir(None).unwrap(), Path::new("/xdg/ctm"));
    clear();
}

#[test]
#[serial]
fn color_flags_require_exactly_one() {
    std::env::set_var("NO_COLOR", "true");
    assert!(!no_color());
    std::env::set_var("NO_COLOR", "1");
    assert!(no_color());
    std::env::remove_var("NO_COLOR");

    std::env::set_var("COLOR", "1");
    assert!(force_color());
    std::env::remove_var("COLOR");
    assert!(!force_color());
}
