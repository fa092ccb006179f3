// Copyright 2020 - 2026 LG Electronics Inc.

//! The git adapter: which source lines are candidates for mutation.
//!
//! `--scope all` offers every line of every tracked source file;
//! `--scope commit` offers only lines introduced since the parent of
//! HEAD, or since a tag named `devtool-base` when one exists, by
//! parsing `git diff -U0` output.

use std::fmt;
use std::fs::read_to_string;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use globset::GlobSet;
use patch::{Line, Patch};
use tracing::{debug, warn};

use crate::error::Error;
use crate::glob::build_glob_set;
use crate::process::get_command_output;
use crate::Result;

/// One candidate source line, used as a join key between the VCS
/// adapter, the collector and the sampler.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SourceLine {
    /// Canonical absolute path.
    pub path: Utf8PathBuf,
    /// 1-based line number.
    pub line: usize,
}

impl fmt::Display for SourceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

pub type SourceLines = Vec<SourceLine>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Scope {
    /// Every line of every tracked source file.
    All,
    /// Lines introduced since the parent commit (or the `devtool-base`
    /// tag).
    Commit,
}

/// A git work tree plus the file filters for mutant generation.
pub struct GitRepository {
    root: Utf8PathBuf,
    extensions: Vec<String>,
    excludes: Option<GlobSet>,
    examines: Option<GlobSet>,
}

impl GitRepository {
    pub fn open(
        root: &Utf8Path,
        extensions: &[String],
        examine_globs: &[String],
        exclude_globs: &[String],
    ) -> Result<GitRepository> {
        let root = crate::path::canonicalize(root)?;
        get_command_output(&["git", "rev-parse", "--is-inside-work-tree"], &root)
            .map_err(|_| Error::config(format!("{root} is not inside a git work tree")))?;
        Ok(GitRepository {
            root,
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
            excludes: build_glob_set(exclude_globs)?,
            examines: build_glob_set(examine_globs)?,
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// All candidate (file, line) pairs for the scope, in stable
    /// path-then-line order. The caller shuffles with its seed.
    pub fn source_lines(&self, scope: Scope) -> Result<SourceLines> {
        match scope {
            Scope::All => self.all_lines(),
            Scope::Commit => self.commit_lines(),
        }
    }

    fn eligible(&self, relative: &Utf8Path) -> bool {
        let ext_ok = relative
            .extension()
            .is_some_and(|ext| self.extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)));
        if !ext_ok {
            return false;
        }
        if let Some(excludes) = &self.excludes {
            if excludes.is_match(relative) {
                return false;
            }
        }
        if let Some(examines) = &self.examines {
            if !examines.is_match(relative) {
                return false;
            }
        }
        true
    }

    /// Tracked source files matching the extension and glob filters,
    /// as canonical absolute paths.
    pub fn tracked_files(&self) -> Result<Vec<Utf8PathBuf>> {
        let stdout = get_command_output(&["git", "ls-files"], &self.root)
            .context("list tracked files")?;
        let mut files = Vec::new();
        for line in stdout.lines() {
            let relative = Utf8Path::new(line);
            if !self.eligible(relative) {
                continue;
            }
            let absolute = self.root.join(relative);
            if !absolute.is_file() {
                // Tracked but deleted in the work tree.
                continue;
            }
            files.push(crate::path::canonicalize(&absolute)?);
        }
        Ok(files)
    }

    fn all_lines(&self) -> Result<SourceLines> {
        let mut lines = Vec::new();
        for path in self.tracked_files()? {
            let text =
                read_to_string(&path).with_context(|| format!("read {path:?}"))?;
            let count = text.lines().count();
            lines.extend((1..=count).map(|line| SourceLine {
                path: path.clone(),
                line,
            }));
        }
        debug!(lines = lines.len(), "scope all: every tracked source line");
        Ok(lines)
    }

    fn commit_lines(&self) -> Result<SourceLines> {
        let base = self.diff_base()?;
        let Some(base) = base else {
            warn!("no parent commit or devtool-base tag found; no candidate lines");
            return Ok(Vec::new());
        };
        let diff_text = get_command_output(
            &["git", "diff", "--no-color", "-U0", &base],
            &self.root,
        )
        .context("diff against base")?;
        if diff_text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let patches = Patch::from_multiple(&diff_text)
            .map_err(|err| anyhow::anyhow!("failed to parse git diff: {err}"))?;
        let mut lines = Vec::new();
        for patch in &patches {
            let relative = strip_patch_prefix(&patch.new.path);
            if relative == Utf8Path::new("/dev/null") || !self.eligible(relative) {
                continue;
            }
            let absolute = self.root.join(relative);
            if !absolute.is_file() {
                continue;
            }
            let absolute = crate::path::canonicalize(&absolute)?;
            for line in added_lines(patch) {
                lines.push(SourceLine {
                    path: absolute.clone(),
                    line,
                });
            }
        }
        lines.sort();
        lines.dedup();
        debug!(lines = lines.len(), %base, "scope commit: lines changed since base");
        Ok(lines)
    }

    /// The revision to diff against: the `devtool-base` tag when
    /// present, otherwise the parent of HEAD. `None` on a root commit.
    fn diff_base(&self) -> Result<Option<String>> {
        if get_command_output(
            &["git", "rev-parse", "-q", "--verify", "refs/tags/devtool-base"],
            &self.root,
        )
        .is_ok()
        {
            return Ok(Some("devtool-base".to_owned()));
        }
        if get_command_output(&["git", "rev-parse", "-q", "--verify", "HEAD^"], &self.root)
            .is_ok()
        {
            return Ok(Some("HEAD^".to_owned()));
        }
        Ok(None)
    }
}

/// Strip the `a/` or `b/` prefix that git puts on diff paths.
fn strip_patch_prefix(path: &str) -> &Utf8Path {
    let path = Utf8Path::new(path);
    path.strip_prefix("a").or_else(|_| path.strip_prefix("b")).unwrap_or(path)
}

/// The new-file line numbers added by this patch.
fn added_lines(patch: &Patch<'_>) -> Vec<usize> {
    let mut added = Vec::new();
    for hunk in &patch.hunks {
        let mut line_no = usize::try_from(hunk.new_range.start).unwrap_or(0);
        for line in &hunk.lines {
            match line {
                Line::Add(_) => {
                    added.push(line_no);
                    line_no += 1;
                }
                Line::Context(_) => line_no += 1,
                Line::Remove(_) => {}
            }
        }
    }
    added
}

#[cfg(test)]
mod test {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn added_lines_from_patch() {
        let diff = indoc! {r#"
            --- a/src/calc.c
            +++ b/src/calc.c
            @@ -10,0 +11,2 @@ int add(int a, int b)
            +    int carry = 0;
            +    carry += 1;
            @@ -20 +23 @@ int sub(int a, int b)
            -    return a + b;
            +    return a - b;
        "#};
        let patches = Patch::from_multiple(diff).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(added_lines(&patches[0]), vec![11, 12, 23]);
        assert_eq!(
            strip_patch_prefix(&patches[0].new.path),
            Utf8Path::new("src/calc.c")
        );
    }

    #[test]
    fn patch_prefix_stripping() {
        assert_eq!(strip_patch_prefix("b/src/x.c"), Utf8Path::new("src/x.c"));
        assert_eq!(strip_patch_prefix("/dev/null"), Utf8Path::new("/dev/null"));
    }

    #[test]
    fn eligibility_applies_extension_and_globs() {
        let repo = GitRepository {
            root: Utf8PathBuf::from("/r"),
            extensions: vec!["c".into(), "cpp".into()],
            excludes: build_glob_set(["third_party"]).unwrap(),
            examines: None,
        };
        assert!(repo.eligible(Utf8Path::new("src/a.c")));
        assert!(repo.eligible(Utf8Path::new("src/a.CPP")));
        assert!(!repo.eligible(Utf8Path::new("src/a.rs")));
        assert!(!repo.eligible(Utf8Path::new("third_party/z.c")));
        assert!(!repo.eligible(Utf8Path::new("README")));
    }
}
