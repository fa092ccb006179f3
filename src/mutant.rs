// Copyright 2020 - 2026 LG Electronics Inc.

//! Mutants: single syntactic edits to a source file, identified by
//! operator, location and replacement text.

use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::str::FromStr;

use anyhow::{anyhow, Context};
use camino::{Utf8Path, Utf8PathBuf};
use console::style;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use similar::TextDiff;

use crate::span::Span;
use crate::Result;

/// The closed set of mutation operators.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    /// Arithmetic operator replacement: `+ - * / %`.
    Aor,
    /// Bitwise operator replacement: `& | ^`.
    Bor,
    /// Logical connector replacement: `&& ||`, plus constant folding.
    Lcr,
    /// Relational operator replacement: `< <= > >= == !=`.
    Ror,
    /// Shift operator replacement: `<< >>`.
    Sor,
    /// Statement deletion.
    Sdl,
    /// Unary operator insertion: `((e)++)`, `((e)--)`, `(!(e))`.
    Uoi,
}

/// One syntactic edit: replace the `[first, last)` region of `path` with
/// `replacement`.
///
/// Frozen once created by the candidate collector; everything downstream
/// treats it as a value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mutant {
    /// The operator that generated this mutant.
    pub operator: Operator,

    /// Canonical absolute path of the file to edit.
    pub path: Utf8PathBuf,

    /// Fully qualified enclosing function, or empty when none could be
    /// identified. Derived at generation time and not re-validated.
    pub qualified_function: String,

    /// The replaced region. Lines and columns are 1-based; the end
    /// column is one past the final byte.
    pub span: Span,

    /// The literal text substituted for the region. May span lines.
    pub replacement: String,
}

impl Mutant {
    /// The class/namespace prefix of the qualified function: everything
    /// before the last `::`, or empty.
    pub fn class(&self) -> &str {
        match self.qualified_function.rfind("::") {
            Some(pos) => &self.qualified_function[..pos],
            None => "",
        }
    }

    /// The bare function name: everything after the last `::`.
    pub fn function(&self) -> &str {
        match self.qualified_function.rfind("::") {
            Some(pos) => &self.qualified_function[pos + 2..],
            None => &self.qualified_function,
        }
    }

    /// A one-line human description, like
    /// `src/calc.c:3:14: AOR replace with "-" in add`.
    pub fn name(&self, source_root: &Utf8Path) -> String {
        let rel = crate::path::relative_to(&self.path, source_root);
        let mut s = format!(
            "{rel}:{}:{}: {} replace with {:?}",
            self.span.start.line, self.span.start.column, self.operator, self.replacement
        );
        if !self.qualified_function.is_empty() {
            s.push_str(" in ");
            s.push_str(&self.qualified_function);
        }
        s
    }

    /// Like [Mutant::name] but with terminal colors.
    pub fn to_styled_string(&self, source_root: &Utf8Path) -> String {
        let rel = crate::path::relative_to(&self.path, source_root);
        let mut s = format!(
            "{rel}:{}:{}: {} replace with {}",
            self.span.start.line,
            self.span.start.column,
            style(self.operator).cyan(),
            style(format!("{:?}", self.replacement)).yellow(),
        );
        if !self.qualified_function.is_empty() {
            s.push_str(" in ");
            s.push_str(&style(&self.qualified_function).bright().magenta().to_string());
        }
        s
    }

    /// Return a unified diff between the original file content and the
    /// mutated content.
    pub fn diff(&self, original: &str, mutated: &str) -> String {
        let old_label = self.path.as_str();
        let new_label = format!("{} {:?}", self.operator, self.replacement);
        TextDiff::from_lines(original, mutated)
            .unified_diff()
            .context_radius(8)
            .header(old_label, &new_label)
            .to_string()
    }

    /// A filesystem-safe base for this mutant's per-scenario log file.
    pub fn log_file_name_base(&self, source_root: &Utf8Path) -> String {
        let rel = crate::path::relative_to(&self.path, source_root);
        format!(
            "{}_{}_line_{}_col_{}",
            self.operator,
            rel.as_str().replace('/', "__"),
            self.span.start.line,
            self.span.start.column,
        )
    }
}

/// One line per mutant, eight comma-separated fields:
/// `operator,path,function,first_line,first_col,last_line,last_col,replacement`.
///
/// Only the replacement may contain commas; parsing splits on the first
/// seven, so it round-trips unescaped.
impl fmt::Display for Mutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{}",
            self.operator,
            self.path,
            self.qualified_function,
            self.span.start.line,
            self.span.start.column,
            self.span.end.line,
            self.span.end.column,
            self.replacement
        )
    }
}

impl FromStr for Mutant {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Mutant> {
        let fields: Vec<&str> = line.splitn(8, ',').collect();
        if fields.len() != 8 {
            return Err(anyhow!("malformed mutant line {line:?}"));
        }
        let num = |s: &str| -> Result<usize> {
            s.parse::<usize>()
                .with_context(|| format!("bad number {s:?} in mutant line"))
        };
        Ok(Mutant {
            operator: fields[0]
                .parse()
                .map_err(|_| anyhow!("unknown operator {:?}", fields[0]))?,
            path: Utf8PathBuf::from(fields[1]),
            qualified_function: fields[2].to_owned(),
            span: Span::quad(
                num(fields[3])?,
                num(fields[4])?,
                num(fields[5])?,
                num(fields[6])?,
            ),
            replacement: fields[7].to_owned(),
        })
    }
}

impl Serialize for Mutant {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Serialized by hand so the path comes out as a plain string.
        let mut ss = serializer.serialize_struct("Mutant", 5)?;
        ss.serialize_field("file", self.path.as_str())?;
        ss.serialize_field("function", &self.qualified_function)?;
        ss.serialize_field("operator", &self.operator)?;
        ss.serialize_field("span", &self.span)?;
        ss.serialize_field("replacement", &self.replacement)?;
        ss.end()
    }
}

// The total order is lexicographic over the serialized form, so sorted
// mutant files and in-memory sorts agree.
impl Ord for Mutant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl PartialOrd for Mutant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Write a mutant list, one serialized mutant per LF-terminated line.
pub fn save_mutants(mutants: &[Mutant], path: &Utf8Path) -> Result<()> {
    let mut out = File::create(path).with_context(|| format!("create {path:?}"))?;
    for mutant in mutants {
        writeln!(out, "{mutant}").with_context(|| format!("write {path:?}"))?;
    }
    Ok(())
}

/// Read a mutant list written by [save_mutants].
pub fn load_mutants(path: &Utf8Path) -> Result<Vec<Mutant>> {
    let file = File::open(path).with_context(|| format!("open {path:?}"))?;
    let mut mutants = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("read {path:?}"))?;
        if line.is_empty() {
            continue;
        }
        mutants.push(line.parse()?);
    }
    Ok(mutants)
}
