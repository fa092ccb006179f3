// Copyright 2020 - 2026 LG Electronics Inc.

//! Walk each source file's syntax tree once, applying every operator at
//! every node that touches a target line.
//!
//! Candidates come out in traversal (preorder) order, which together
//! with the seeded shuffles upstream makes the whole pipeline
//! deterministic. Duplicates are possible here; the sampler removes
//! them.

use std::collections::{BTreeMap, HashMap};

use camino::Utf8PathBuf;
use tracing::{debug, debug_span, warn};

use crate::ast::{CompilationDb, SourceUnit};
use crate::interrupt::check_interrupted;
use crate::mutant::Mutant;
use crate::operators::ALL;
use crate::vcs::{SourceLine, SourceLines};
use crate::Result;

/// Everything discovered for one run: the candidate pool plus the
/// per-line statement depths the weighted sampler needs.
#[derive(Debug, Default)]
pub struct Discovered {
    pub mutants: Vec<Mutant>,
    pub line_depths: HashMap<SourceLine, usize>,
}

/// The result of walking a single file.
#[derive(Debug, Default)]
pub struct FileCandidates {
    pub mutants: Vec<Mutant>,
    /// Deepest statement nesting seen on each target line.
    pub line_depths: HashMap<usize, usize>,
}

/// Walk every file that has a target line.
///
/// Files are visited in path order; the per-file target lines keep the
/// order they arrived in, which does not matter here because the walk
/// is over nodes, not lines.
pub fn walk_tree(db: &CompilationDb, source_lines: &SourceLines) -> Result<Discovered> {
    let mut by_file: BTreeMap<Utf8PathBuf, Vec<usize>> = BTreeMap::new();
    for source_line in source_lines {
        by_file
            .entry(source_line.path.clone())
            .or_default()
            .push(source_line.line);
    }
    let mut discovered = Discovered::default();
    for (path, target_lines) in &by_file {
        check_interrupted()?;
        let _span = debug_span!("source_file", path = path.as_str()).entered();
        if !db.contains(path) {
            warn!(?path, "not in the compilation database; skipping");
            continue;
        }
        let dialect = db.dialect_for(path);
        let unit = SourceUnit::load(path, dialect)?;
        let file = collect(&unit, target_lines);
        debug!(mutants = file.mutants.len(), "collected candidates");
        discovered.mutants.extend(file.mutants);
        for (line, depth) in file.line_depths {
            discovered.line_depths.insert(
                SourceLine {
                    path: path.clone(),
                    line,
                },
                depth,
            );
        }
    }
    Ok(discovered)
}

/// One preorder walk over the file's named nodes.
pub fn collect(unit: &SourceUnit, target_lines: &[usize]) -> FileCandidates {
    let mut out = FileCandidates::default();
    let mut cursor = unit.root().walk();
    let mut done = false;
    while !done {
        let node = cursor.node();
        if node.is_named() {
            let span = unit.span(node);
            let on_target = target_lines.iter().any(|line| span.contains_line(*line));
            if on_target {
                for operator in ALL {
                    if operator.applicable(unit, node) {
                        operator.emit(unit, node, &mut out.mutants);
                    }
                }
                if node.kind().ends_with("_statement") {
                    let depth = unit.statement_depth(node);
                    for line in target_lines {
                        if span.contains_line(*line) {
                            let entry = out.line_depths.entry(*line).or_insert(0);
                            if depth > *entry {
                                *entry = depth;
                            }
                        }
                    }
                }
            }
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                done = true;
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod test {
    use camino::Utf8Path;
    use indoc::indoc;
    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::Dialect;
    use crate::mutant::Operator;

    const CODE: &str = indoc! {r"
        int clamp(int v, int lo, int hi) {
          if (v < lo) {
            v = lo + 1;
          }
          return v;
        }
    "};

    fn unit() -> SourceUnit {
        SourceUnit::parse(Utf8Path::new("/t/clamp.c"), CODE.to_owned(), Dialect::C).unwrap()
    }

    #[test]
    fn only_target_lines_produce_mutants() {
        let unit = unit();
        let all_lines = (1..=CODE.lines().count()).collect_vec();
        let everything = collect(&unit, &all_lines);
        assert!(!everything.mutants.is_empty());

        // Only line 3: the comparison on line 2 contributes nothing.
        let line3 = collect(&unit, &[3]);
        assert!(line3.mutants.iter().all(|m| m.span.contains_line(3)));
        assert!(line3
            .mutants
            .iter()
            .any(|m| m.operator == Operator::Aor && m.replacement == "-"));
        assert!(!line3
            .mutants
            .iter()
            .any(|m| m.operator == Operator::Ror));

        let none = collect(&unit, &[]);
        assert!(none.mutants.is_empty());
    }

    #[test]
    fn every_mutant_intersects_a_target_line() {
        let unit = unit();
        let targets = vec![2, 3];
        let found = collect(&unit, &targets);
        for m in &found.mutants {
            assert!(
                targets.iter().any(|l| m.span.contains_line(*l)),
                "{m} misses every target line"
            );
            assert_eq!(m.path, Utf8Path::new("/t/clamp.c"));
        }
    }

    #[test]
    fn line_depths_track_nesting() {
        let unit = unit();
        let found = collect(&unit, &[3, 5]);
        // Line 3 sits inside the if block; line 5 in the function body.
        assert_eq!(found.line_depths[&3], 2);
        assert_eq!(found.line_depths[&5], 1);
    }

    #[test]
    fn traversal_order_is_stable() {
        let unit = unit();
        let lines = (1..=CODE.lines().count()).collect_vec();
        let a = collect(&unit, &lines).mutants;
        let b = collect(&unit, &lines).mutants;
        assert_eq!(a, b);
    }
}
