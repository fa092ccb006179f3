// Copyright 2020 - 2026 LG Electronics Inc.

//! Select mutants from the candidate pool under a budget.
//!
//! Three policies, all deterministic for a given seed. `uniform` picks
//! at most one candidate per source line, visiting lines in the
//! (already shuffled) upstream order; `weighted` does the same but
//! visits deeper statements first; `random` shuffles the whole pool.

use std::collections::HashMap;

use tracing::debug;

use crate::mutant::Mutant;
use crate::vcs::{SourceLine, SourceLines};

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum GeneratorKind {
    /// One mutant per line, lines in upstream order.
    Uniform,
    /// One mutant per line, deepest statements first.
    Weighted,
    /// A straight sample of the whole pool.
    Random,
}

/// Choose up to `limit` mutants from `candidates`.
///
/// `source_lines` is the line visiting order for the per-line policies;
/// `line_depths` feeds the weighted policy and may be empty otherwise.
pub fn sample(
    kind: GeneratorKind,
    candidates: &[Mutant],
    source_lines: &SourceLines,
    line_depths: &HashMap<SourceLine, usize>,
    limit: usize,
    seed: u64,
) -> Vec<Mutant> {
    debug!(?kind, pool = candidates.len(), limit, seed, "sampling mutants");
    match kind {
        GeneratorKind::Uniform => one_per_line(candidates, source_lines.clone(), limit, seed),
        GeneratorKind::Weighted => {
            let mut lines = source_lines.clone();
            // Stable sort: ties keep the upstream (shuffled) order.
            lines.sort_by_key(|line| {
                std::cmp::Reverse(line_depths.get(line).copied().unwrap_or(0))
            });
            one_per_line(candidates, lines, limit, seed)
        }
        GeneratorKind::Random => {
            let mut pool: Vec<Mutant> = candidates.to_vec();
            if pool.len() > limit {
                fastrand::Rng::with_seed(seed).shuffle(&mut pool);
                pool.truncate(limit);
            }
            pool
        }
    }
}

/// Visit lines in order; on each, pick one not-yet-selected candidate
/// uniformly at random.
fn one_per_line(
    candidates: &[Mutant],
    lines: SourceLines,
    limit: usize,
    seed: u64,
) -> Vec<Mutant> {
    let mut selected: Vec<Mutant> = Vec::new();
    for line in &lines {
        if selected.len() == limit {
            break;
        }
        let mut on_line: Vec<&Mutant> = candidates
            .iter()
            .filter(|m| m.path == line.path && m.span.contains_line(line.line))
            .collect();
        if on_line.is_empty() {
            continue;
        }
        // A fresh generator per line, so the pick for one line does not
        // depend on how many candidates earlier lines had.
        fastrand::Rng::with_seed(seed).shuffle(&mut on_line);
        if let Some(pick) = on_line.iter().find(|m| !selected.contains(**m)) {
            selected.push((*pick).clone());
        }
    }
    selected
}

#[cfg(test)]
mod test {
    use camino::{Utf8Path, Utf8PathBuf};
    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mutant::Operator;
    use crate::span::Span;

    fn mutant(path: &str, line: usize, replacement: &str) -> Mutant {
        Mutant {
            operator: Operator::Aor,
            path: Utf8PathBuf::from(path),
            qualified_function: "f".to_owned(),
            span: Span::quad(line, 10, line, 11),
            replacement: replacement.to_owned(),
        }
    }

    fn line(path: &str, line: usize) -> SourceLine {
        SourceLine {
            path: Utf8PathBuf::from(path),
            line,
        }
    }

    fn pool() -> (Vec<Mutant>, SourceLines) {
        let mutants = vec![
            mutant("/s/a.c", 1, "-"),
            mutant("/s/a.c", 1, "*"),
            mutant("/s/a.c", 2, "/"),
            mutant("/s/a.c", 2, "%"),
            mutant("/s/b.c", 1, "+"),
        ];
        let lines = vec![line("/s/a.c", 1), line("/s/a.c", 2), line("/s/b.c", 1)];
        (mutants, lines)
    }

    #[test]
    fn empty_pool_returns_empty_regardless_of_budget() {
        for kind in [
            GeneratorKind::Uniform,
            GeneratorKind::Weighted,
            GeneratorKind::Random,
        ] {
            let lines = vec![line("/s/a.c", 1)];
            assert!(sample(kind, &[], &lines, &HashMap::new(), 100, 7).is_empty());
        }
    }

    #[test]
    fn uniform_takes_at_most_one_per_line() {
        let (mutants, lines) = pool();
        let picked = sample(GeneratorKind::Uniform, &mutants, &lines, &HashMap::new(), 10, 42);
        assert_eq!(picked.len(), 3);
        let keys: Vec<(&Utf8Path, usize)> = picked
            .iter()
            .map(|m| (m.path.as_path(), m.span.start.line))
            .collect();
        assert_eq!(keys.iter().unique().count(), keys.len());
    }

    #[test]
    fn uniform_respects_budget_in_line_order() {
        let (mutants, lines) = pool();
        let picked = sample(GeneratorKind::Uniform, &mutants, &lines, &HashMap::new(), 2, 42);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].span.start.line, 1);
        assert_eq!(picked[1].span.start.line, 2);
    }

    #[test]
    fn weighted_visits_deeper_lines_first() {
        let (mutants, lines) = pool();
        let depths: HashMap<SourceLine, usize> =
            [(line("/s/a.c", 1), 1), (line("/s/a.c", 2), 3), (line("/s/b.c", 1), 2)]
                .into_iter()
                .collect();
        let picked = sample(GeneratorKind::Weighted, &mutants, &lines, &depths, 2, 42);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].path, Utf8Path::new("/s/a.c"));
        assert_eq!(picked[0].span.start.line, 2);
        assert_eq!(picked[1].path, Utf8Path::new("/s/b.c"));
    }

    #[test]
    fn random_takes_everything_under_budget() {
        let (mutants, lines) = pool();
        let picked = sample(GeneratorKind::Random, &mutants, &lines, &HashMap::new(), 99, 42);
        assert_eq!(picked, mutants);
    }

    #[test]
    fn random_truncates_to_budget() {
        let (mutants, lines) = pool();
        let picked = sample(GeneratorKind::Random, &mutants, &lines, &HashMap::new(), 2, 42);
        assert_eq!(picked.len(), 2);
        for m in &picked {
            assert!(mutants.contains(m));
        }
    }

    #[test]
    fn identical_seed_gives_identical_output() {
        let (mutants, lines) = pool();
        for kind in [
            GeneratorKind::Uniform,
            GeneratorKind::Weighted,
            GeneratorKind::Random,
        ] {
            let a = sample(kind, &mutants, &lines, &HashMap::new(), 3, 1234);
            let b = sample(kind, &mutants, &lines, &HashMap::new(), 3, 1234);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn duplicate_candidates_are_not_selected_twice() {
        let twin = mutant("/s/a.c", 1, "-");
        let mutants = vec![twin.clone(), twin.clone()];
        let lines = vec![line("/s/a.c", 1), line("/s/a.c", 1)];
        let picked = sample(GeneratorKind::Uniform, &mutants, &lines, &HashMap::new(), 10, 5);
        assert_eq!(picked.len(), 1);
    }
}
