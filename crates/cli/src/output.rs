// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format a timestamp as relative time (e.g., "5s ago", "2m ago").
pub fn format_time_ago(epoch_ms: u64, now_ms: u64) -> String {
    if epoch_ms == 0 {
        return "-".to_string();
    }
    ctm_core::format_ago(epoch_ms, now_ms)
}

/// Render a 0..=1 score with two decimals; scores above 1 carry a project boost.
pub fn format_score(score: f64) -> String {
    format!("{score:.2}")
}

/// Parse a short duration such as `90s`, `15m`, `2h` or `3d`. A bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (num, unit) = input.split_at(split);
    let n: u64 = num
        .parse()
        .map_err(|_| format!("invalid duration '{input}'"))?;
    let secs = match unit {
        "" | "s" => n,
        "m" => n.saturating_mul(60),
        "h" => n.saturating_mul(3600),
        "d" => n.saturating_mul(86_400),
        _ => return Err(format!("unknown duration unit '{unit}' (use s, m, h or d)")),
    };
    Ok(Duration::from_secs(secs))
}

/// Print prune results in text or JSON format.
pub fn print_prune_results(
    removed: &[String],
    kept: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            for id in removed {
                println!("Pruned {id}");
            }
            println!("{} checkpoint(s) pruned, {kept} kept", removed.len());
        }
        OutputFormat::Json => {
            print_json(&serde_json::json!({
                "pruned": removed,
                "kept": kept,
            }))?;
        }
    }
    Ok(())
}
