// Copyright 2020 - 2026 LG Electronics Inc.

//! Group mutation results by file and by directory, and compute the
//! coverage arithmetic the reports are built from.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

use crate::outcome::{MutationResult, MutationState};
use crate::path::{legacy_dir_key, relative_to};

/// Counts for one group (a file, a directory, or the whole run).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupStats {
    pub total: usize,
    pub detected: usize,
    pub build_failures: usize,
    pub runtime_errors: usize,
    pub timeouts: usize,
}

impl GroupStats {
    fn add(&mut self, result: &MutationResult) {
        self.total += 1;
        if result.detected() {
            self.detected += 1;
        }
        match result.state {
            MutationState::BuildFailure => self.build_failures += 1,
            MutationState::RuntimeError => self.runtime_errors += 1,
            MutationState::Timeout => self.timeouts += 1,
            MutationState::Killed | MutationState::Survived => {}
        }
    }

    /// Mutants that actually reached a comparable test run.
    pub fn denominator(&self) -> usize {
        self.total
            .saturating_sub(self.build_failures + self.runtime_errors + self.timeouts)
    }

    /// Whole-percent mutation coverage, or `None` when nothing counts.
    pub fn coverage_percent(&self) -> Option<usize> {
        let denominator = self.denominator();
        if denominator == 0 {
            None
        } else {
            Some(100 * self.detected / denominator)
        }
    }
}

/// One grouped view: stats plus the indexes of the member results.
#[derive(Debug, Default)]
pub struct Group {
    pub stats: GroupStats,
    pub result_indexes: Vec<usize>,
}

/// Results grouped by tree-relative file and directory.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// Keyed by tree-relative file path with forward slashes.
    pub by_file: BTreeMap<Utf8PathBuf, Group>,
    /// Keyed by tree-relative directory ("" for the root itself).
    pub by_dir: BTreeMap<Utf8PathBuf, Group>,
    pub totals: GroupStats,
}

impl Aggregate {
    pub fn new(results: &[MutationResult], source_root: &Utf8Path) -> Aggregate {
        let mut aggregate = Aggregate::default();
        for (index, result) in results.iter().enumerate() {
            let relative = relative_to(&result.mutant.path, source_root).to_owned();
            let dir = relative
                .parent()
                .map_or_else(Utf8PathBuf::new, Utf8Path::to_owned);

            let file_group = aggregate.by_file.entry(relative).or_default();
            file_group.stats.add(result);
            file_group.result_indexes.push(index);

            let dir_group = aggregate.by_dir.entry(dir).or_default();
            dir_group.stats.add(result);
            dir_group.result_indexes.push(index);

            aggregate.totals.add(result);
        }
        aggregate
    }

    /// Directory keys in the legacy dotted form used by the XML report
    /// consumers, paired with each group.
    pub fn legacy_dir_groups(&self) -> impl Iterator<Item = (String, &Group)> {
        self.by_dir
            .iter()
            .map(|(dir, group)| (legacy_dir_key(dir), group))
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use camino::Utf8PathBuf;
    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mutant::{Mutant, Operator};
    use crate::span::Span;

    fn result(path: &str, state: MutationState) -> MutationResult {
        MutationResult {
            mutant: Mutant {
                operator: Operator::Aor,
                path: Utf8PathBuf::from(path),
                qualified_function: "f".to_owned(),
                span: Span::quad(1, 1, 1, 2),
                replacement: "-".to_owned(),
            },
            state,
            killing_tests: BTreeSet::new(),
            erroring_tests: BTreeSet::new(),
        }
    }

    #[test]
    fn groups_by_file_and_directory() {
        let root = Utf8Path::new("/src");
        let results = vec![
            result("/src/net/tcp.c", MutationState::Killed),
            result("/src/net/tcp.c", MutationState::Survived),
            result("/src/net/udp.c", MutationState::BuildFailure),
            result("/src/main.c", MutationState::Timeout),
        ];
        let agg = Aggregate::new(&results, root);

        assert_eq!(agg.by_file.len(), 3);
        let tcp = &agg.by_file[Utf8Path::new("net/tcp.c")];
        assert_eq!(tcp.stats.total, 2);
        assert_eq!(tcp.stats.detected, 1);
        assert_eq!(tcp.result_indexes, [0, 1]);

        let net = &agg.by_dir[Utf8Path::new("net")];
        assert_eq!(net.stats.total, 3);
        assert_eq!(net.stats.build_failures, 1);

        let top = &agg.by_dir[Utf8Path::new("")];
        assert_eq!(top.stats.total, 1);
        assert_eq!(top.stats.timeouts, 1);

        assert_eq!(agg.totals.total, 4);
        assert_eq!(agg.totals.denominator(), 2);
        assert_eq!(agg.totals.coverage_percent(), Some(50));
    }

    #[test]
    fn legacy_directory_keys_use_dots() {
        let root = Utf8Path::new("/src");
        let results = vec![
            result("/src/lib/net/tcp.c", MutationState::Killed),
            result("/src/main.c", MutationState::Survived),
        ];
        let agg = Aggregate::new(&results, root);
        let keys = agg.legacy_dir_groups().map(|(k, _)| k).collect_vec();
        assert_eq!(keys, [".", "lib.net"]);
    }

    #[test]
    fn coverage_excludes_non_viable_states_from_denominator() {
        let mut stats = GroupStats::default();
        for state in [
            MutationState::Killed,
            MutationState::Survived,
            MutationState::BuildFailure,
            MutationState::RuntimeError,
            MutationState::Timeout,
        ] {
            stats.add(&result("/src/a.c", state));
        }
        assert_eq!(stats.total, 5);
        assert_eq!(stats.denominator(), 2);
        assert_eq!(stats.coverage_percent(), Some(50));
    }

    #[test]
    fn all_skipped_group_has_no_coverage() {
        let stats = {
            let mut s = GroupStats::default();
            s.add(&result("/src/a.c", MutationState::BuildFailure));
            s
        };
        assert_eq!(stats.coverage_percent(), None);
    }
}
