// Copyright 2020 - 2026 LG Electronics Inc.

//! Locations (line/column) and spans between them in source code.
//!
//! Lines and columns are 1-based. Columns measure bytes into the line's
//! UTF-8 encoding, so a tab counts as one column and a multi-byte
//! character as several. This matches what tree-sitter reports (plus one)
//! and what the on-disk mutant format stores.

use std::fmt;

use serde::Serialize;

/// A (line, column) position in a source file.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct LineColumn {
    /// 1-based line number.
    pub line: usize,

    /// 1-based column, measured in bytes.
    pub column: usize,
}

impl From<tree_sitter::Point> for LineColumn {
    fn from(p: tree_sitter::Point) -> Self {
        LineColumn {
            line: p.row + 1,
            column: p.column + 1,
        }
    }
}

impl fmt::Debug for LineColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineColumn({}, {})", self.line, self.column)
    }
}

/// A contiguous text span in a file.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct Span {
    /// The *inclusive* position where the span starts.
    pub start: LineColumn,
    /// The *exclusive* position where the span ends: `end.column` is one
    /// past the last byte.
    pub end: LineColumn,
}

impl Span {
    pub fn quad(
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    ) -> Self {
        Span {
            start: LineColumn {
                line: start_line,
                column: start_column,
            },
            end: LineColumn {
                line: end_line,
                column: end_column,
            },
        }
    }

    /// True if `line` falls inside the line range covered by this span.
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start.line && line <= self.end.line
    }

    /// Return the region of a multi-line string that this span covers.
    pub fn extract(&self, s: &str) -> String {
        let mut r = String::new();
        for (idx, line) in s.split_inclusive('\n').enumerate() {
            let line_no = idx + 1;
            if line_no < self.start.line || line_no > self.end.line {
                continue;
            }
            let from = if line_no == self.start.line {
                (self.start.column - 1).min(line.len())
            } else {
                0
            };
            let to = if line_no == self.end.line {
                (self.end.column - 1).min(line.len())
            } else {
                line.len()
            };
            if from <= to {
                r.push_str(&line[from..to]);
            }
        }
        r
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A concise form, similar to ::quad
        write!(
            f,
            "Span({}, {}, {}, {})",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}
