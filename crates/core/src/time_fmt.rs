// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared human-readable duration formatting.

/// Format seconds as a short human-readable duration: `"5s"`, `"2m"`, `"1h30m"`, `"3d"`.
///
/// For the hours range, minutes are included when non-zero (e.g. `"1h"` vs `"1h5m"`).
pub fn format_elapsed(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86399 => match (secs / 3600, (secs % 3600) / 60) {
            (h, 0) => format!("{h}h"),
            (h, m) => format!("{h}h{m}m"),
        },
        _ => format!("{}d", secs / 86400),
    }
}

pub fn format_elapsed_ms(ms: u64) -> String {
    format_elapsed(ms / 1000)
}

/// Age of `then_ms` relative to `now_ms`, e.g. `"5m ago"`.
pub fn format_ago(then_ms: u64, now_ms: u64) -> String {
    format!("{} ago", format_elapsed_ms(now_ms.saturating_sub(then_ms)))
}

/// Deadline relative to now: `"in 2h"` or `"3h overdue"`; `"-"` when unset.
pub fn format_deadline(deadline_ms: Option<u64>, now_ms: u64) -> String {
    match deadline_ms {
        None => "-".to_string(),
        Some(d) if d > now_ms => format!("in {}", format_elapsed_ms(d - now_ms)),
        Some(d) => format!("{} overdue", format_elapsed_ms(now_ms - d)),
    }
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
