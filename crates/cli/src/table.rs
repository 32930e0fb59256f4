// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Column-aligned tables for `ctm queue`, `ctm list`, `ctm impact` and
//! `ctm checkpoint list`.
//!
//! Widths are measured in chars over the truncated cell text. Styling is
//! applied after padding so escape codes never count toward a width.

use std::io::Write;
use std::path::Path;

use crate::color;

/// Agent ids are UUIDs; tables show a prefix that `ctm` still resolves.
pub const ID_WIDTH: usize = 12;

#[derive(Clone, Copy)]
pub enum Align {
    Left,
    Right,
}

#[derive(Clone, Copy)]
pub enum CellStyle {
    Plain,
    Muted,
    /// Colored by the status word it holds.
    Status,
}

pub struct Column {
    name: &'static str,
    align: Align,
    style: CellStyle,
    min_width: usize,
    max_width: Option<usize>,
}

impl Column {
    fn new(name: &'static str, align: Align, style: CellStyle) -> Self {
        Self {
            name,
            align,
            style,
            min_width: name.chars().count(),
            max_width: None,
        }
    }

    pub fn left(name: &'static str) -> Self {
        Self::new(name, Align::Left, CellStyle::Plain)
    }

    pub fn right(name: &'static str) -> Self {
        Self::new(name, Align::Right, CellStyle::Plain)
    }

    pub fn muted(name: &'static str) -> Self {
        Self::new(name, Align::Left, CellStyle::Muted)
    }

    pub fn status(name: &'static str) -> Self {
        Self::new(name, Align::Left, CellStyle::Status)
    }

    /// Muted agent-id column cut to [`ID_WIDTH`].
    pub fn id() -> Self {
        Self::muted("ID").with_max(ID_WIDTH)
    }

    /// Cells longer than `max` chars are cut.
    pub fn with_max(mut self, max: usize) -> Self {
        self.max_width = Some(max);
        self
    }

    pub fn with_min(mut self, min: usize) -> Self {
        self.min_width = self.min_width.max(min);
        self
    }

    fn fit<'a>(&self, cell: &'a str) -> &'a str {
        let Some(max) = self.max_width else {
            return cell;
        };
        match cell.char_indices().nth(max) {
            Some((end, _)) => &cell[..end],
            None => cell,
        }
    }
}

pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
    colorize: bool,
}

const GAP: &str = "  ";

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self::with_color(columns, color::should_colorize())
    }

    #[cfg(test)]
    pub fn plain(columns: Vec<Column>) -> Self {
        Self::with_color(columns, false)
    }

    #[cfg(test)]
    pub fn colored(columns: Vec<Column>) -> Self {
        Self::with_color(columns, true)
    }

    fn with_color(columns: Vec<Column>, colorize: bool) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            colorize,
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Header plus one line per row; nothing at all for an empty table.
    pub fn lines(&self) -> Vec<String> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        let widths = self.widths();
        let header = self.columns.iter().map(|c| c.name);
        let mut lines = vec![self.line(header, &widths, true)];
        for row in &self.rows {
            let cells = (0..self.columns.len()).map(|i| row.get(i).map_or("", String::as_str));
            lines.push(self.line(cells, &widths, false));
        }
        lines
    }

    /// Write [`Table::lines`]; a closed pipe is not an error worth reporting.
    pub fn render(&self, out: &mut impl Write) {
        for line in self.lines() {
            if writeln!(out, "{line}").is_err() {
                return;
            }
        }
    }

    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| col.fit(cell).chars().count())
                    .fold(col.min_width, usize::max)
            })
            .collect()
    }

    fn line<'a>(&self, cells: impl Iterator<Item = &'a str>, widths: &[usize], header: bool) -> String {
        let last = self.columns.len().saturating_sub(1);
        let mut parts = Vec::with_capacity(self.columns.len());
        for (i, (col, cell)) in self.columns.iter().zip(cells).enumerate() {
            let text = if header { cell } else { col.fit(cell) };
            // A trailing left-aligned column is left ragged.
            let padded = match col.align {
                Align::Left if i == last => text.to_string(),
                Align::Left => format!("{text:<width$}", width = widths[i]),
                Align::Right => format!("{text:>width$}", width = widths[i]),
            };
            parts.push(self.paint(padded, if header { None } else { Some(col.style) }));
        }
        parts.join(GAP)
    }

    fn paint(&self, text: String, style: Option<CellStyle>) -> String {
        if !self.colorize {
            return text;
        }
        match style {
            None => color::apply_header(&text),
            Some(CellStyle::Plain) => text,
            Some(CellStyle::Muted) => color::apply_muted(&text),
            Some(CellStyle::Status) => color::apply_status(&text),
        }
    }
}

/// A PROJECT column is worth showing once any row has a project.
pub fn should_show_project<'a>(mut projects: impl Iterator<Item = Option<&'a Path>>) -> bool {
    projects.any(|p| p.is_some())
}

pub fn project_cell(project: Option<&Path>) -> String {
    project.map_or_else(|| "-".to_string(), |p| p.display().to_string())
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
