// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::IsTerminal;

use clap::builder::styling::{Ansi256Color, Color, Style, Styles};
use ctm_core::{AgentStatus, PriorityLevel};

pub mod codes {
    /// Section headers: pastel cyan / steel blue
    pub const HEADER: u8 = 74;
    /// Commands and literals: light grey
    pub const LITERAL: u8 = 250;
    /// Placeholders: medium grey
    pub const CONTEXT: u8 = 245;
    /// Secondary text: darker grey
    pub const MUTED: u8 = 240;

    #[cfg(test)]
    pub const HEADER_START: &str = "\x1b[38;5;74m";
    #[cfg(test)]
    pub const MUTED_START: &str = "\x1b[38;5;240m";
    #[cfg(test)]
    pub const RESET: &str = "\x1b[0m";
}

/// Priority: `NO_COLOR=1` disables → `COLOR=1` forces → TTY check.
pub fn should_colorize() -> bool {
    if crate::env::no_color() {
        return false;
    }
    if crate::env::force_color() {
        return true;
    }
    std::io::stdout().is_terminal()
}

/// clap help styles in the table palette.
pub fn styles() -> Styles {
    if !should_colorize() {
        return Styles::plain();
    }
    let fg = |code: u8| Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(code))));
    Styles::styled()
        .header(fg(codes::HEADER))
        .usage(fg(codes::HEADER))
        .literal(fg(codes::LITERAL))
        .placeholder(fg(codes::CONTEXT))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paint {
    Header,
    Muted,
    Good,
    Attention,
    Bad,
}

impl Paint {
    fn open(self) -> String {
        match self {
            Paint::Header => format!("\x1b[38;5;{}m", codes::HEADER),
            Paint::Muted => format!("\x1b[38;5;{}m", codes::MUTED),
            Paint::Good => "\x1b[32m".to_string(),
            Paint::Attention => "\x1b[33m".to_string(),
            Paint::Bad => "\x1b[31m".to_string(),
        }
    }

    fn wrap(self, text: &str) -> String {
        format!("{}{text}\x1b[0m", self.open())
    }

    /// Wrap only when color output is enabled.
    fn maybe(self, text: &str) -> String {
        if should_colorize() {
            self.wrap(text)
        } else {
            text.to_string()
        }
    }
}

pub fn header(text: &str) -> String {
    Paint::Header.maybe(text)
}

pub(crate) fn apply_header(text: &str) -> String {
    Paint::Header.wrap(text)
}

pub fn muted(text: &str) -> String {
    Paint::Muted.maybe(text)
}

pub(crate) fn apply_muted(text: &str) -> String {
    Paint::Muted.wrap(text)
}

/// Warnings inside otherwise normal output.
pub fn yellow(text: &str) -> String {
    Paint::Attention.maybe(text)
}

/// Color a status, priority or urgency word by what it means for the user.
///
/// Only the first word counts, so `blocked (2)` still matches. Unknown
/// words stay plain.
pub fn status(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }
    apply_status(text)
}

pub(crate) fn apply_status(text: &str) -> String {
    match paint_for(text) {
        Some(paint) => paint.wrap(text),
        None => text.to_string(),
    }
}

fn paint_for(text: &str) -> Option<Paint> {
    let lower = text.trim().to_lowercase();
    let word = lower
        .split(|c: char| !c.is_alphabetic())
        .find(|w| !w.is_empty())?;
    if let Ok(status) = word.parse::<AgentStatus>() {
        return Some(match status {
            AgentStatus::Active | AgentStatus::Completed => Paint::Good,
            AgentStatus::Paused | AgentStatus::Blocked => Paint::Attention,
            AgentStatus::Cancelled => Paint::Bad,
        });
    }
    if let Ok(level) = word.parse::<PriorityLevel>() {
        return match level {
            PriorityLevel::Critical => Some(Paint::Bad),
            PriorityLevel::High => Some(Paint::Attention),
            PriorityLevel::Medium | PriorityLevel::Low => None,
        };
    }
    match word {
        "overdue" | "corrupt" | "failed" | "missing" => Some(Paint::Bad),
        _ => None,
    }
}

#[cfg(test)]
#[path = "color_tests.rs"]
mod tests;
