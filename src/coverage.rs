// Copyright 2020 - 2026 LG Electronics Inc.

//! Line-coverage filter fed by lcov `.info` files.
//!
//! The orchestrator consults this, when any coverage file was configured,
//! to skip the build/test cycle for mutants on lines the test suite never
//! reaches: they trivially survive.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::read_to_string;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::error::Error;
use crate::Result;

/// Per-file sets of line numbers with a nonzero hit count.
#[derive(Debug, Default)]
pub struct CoverageFilter {
    lines: BTreeMap<Utf8PathBuf, BTreeSet<usize>>,
}

impl CoverageFilter {
    /// Parse one or more lcov `.info` files.
    ///
    /// Only `SF:` (source file) and `DA:<line>,<count>` records are
    /// interpreted; everything else in the format is ignored.
    pub fn from_files<P: AsRef<Utf8Path>>(paths: &[P]) -> Result<CoverageFilter> {
        let mut filter = CoverageFilter::default();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                return Err(Error::config(format!(
                    "coverage file does not exist: {path}"
                ))
                .into());
            }
            let text = read_to_string(path).with_context(|| format!("read {path:?}"))?;
            filter.parse(&text);
        }
        Ok(filter)
    }

    fn parse(&mut self, text: &str) {
        let mut current: Option<Utf8PathBuf> = None;
        for line in text.lines() {
            if let Some(sf) = line.strip_prefix("SF:") {
                let path = resolve(Utf8Path::new(sf.trim()));
                current = Some(path.clone());
                self.lines.entry(path).or_default();
            } else if let Some(da) = line.strip_prefix("DA:") {
                let Some(current) = &current else {
                    debug!("DA record before any SF record; ignored");
                    continue;
                };
                let mut parts = da.trim().splitn(2, ',');
                let (Some(lineno), Some(count)) = (parts.next(), parts.next()) else {
                    debug!(?line, "malformed DA record; ignored");
                    continue;
                };
                if let (Ok(lineno), Ok(count)) = (lineno.parse::<usize>(), count.parse::<u64>()) {
                    if count > 0 {
                        if let Some(lines) = self.lines.get_mut(current) {
                            lines.insert(lineno);
                        }
                    }
                } else {
                    debug!(?line, "malformed DA record; ignored");
                }
            } else if line.trim() == "end_of_record" {
                current = None;
            }
        }
    }

    /// Is this line of this file executed by the test suite?
    ///
    /// Files absent from every coverage record are treated as not
    /// covered.
    pub fn covered(&self, path: &Utf8Path, line: usize) -> bool {
        self.lines
            .get(&resolve(path))
            .is_some_and(|lines| lines.contains(&line))
    }
}

/// Canonicalize for comparison; fall back to the path as given when it
/// does not exist (coverage data may mention deleted files).
fn resolve(path: &Utf8Path) -> Utf8PathBuf {
    crate::path::canonicalize(path).unwrap_or_else(|_| path.to_owned())
}

#[cfg(test)]
mod test {
    use std::fs::write;

    use indoc::indoc;

    use super::*;

    #[test]
    fn covered_lines_have_nonzero_hits() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("sample.cpp");
        write(&src, "int x;\n").unwrap();
        let src = Utf8PathBuf::try_from(src).unwrap();
        let info = dir.path().join("cov.info");
        write(
            &info,
            format!(
                indoc! {"
                    TN:
                    SF:{}
                    DA:1,4
                    DA:2,0
                    DA:5,1
                    end_of_record
                "},
                src
            ),
        )
        .unwrap();
        let info = Utf8PathBuf::try_from(info).unwrap();

        let filter = CoverageFilter::from_files(&[&info]).unwrap();
        assert!(filter.covered(&src, 1));
        assert!(!filter.covered(&src, 2));
        assert!(!filter.covered(&src, 3));
        assert!(filter.covered(&src, 5));
    }

    #[test]
    fn unknown_file_is_uncovered() {
        let filter = CoverageFilter::default();
        assert!(!filter.covered(Utf8Path::new("/no/such/file.c"), 1));
    }

    #[test]
    fn missing_coverage_file_is_a_config_error() {
        let err = CoverageFilter::from_files(&[Utf8Path::new("/no/such.info")]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Config(_))
        ));
    }
}
