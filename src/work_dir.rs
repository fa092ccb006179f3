// Copyright 2020 - 2026 LG Electronics Inc.

//! The working directory holding the three mirrors used during a run:
//! `backup/` (pending restore), `expected/` (golden test results) and
//! `actual/` (post-mutation test results, wiped per trial), plus `log/`
//! for per-scenario logs.
//!
//! Which of these pre-existed is recorded, so cleanup after a run (or
//! after an interruption) removes only directories this run created and
//! never user data.

use std::fs;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Error;
use crate::Result;

#[derive(Debug)]
pub struct WorkDir {
    pub root: Utf8PathBuf,
    pub backup: Utf8PathBuf,
    pub expected: Utf8PathBuf,
    pub actual: Utf8PathBuf,
    pub log_dir: Utf8PathBuf,
    root_pre_existed: bool,
    backup_pre_existed: bool,
    expected_pre_existed: bool,
    actual_pre_existed: bool,
}

impl WorkDir {
    /// Create (if absent) the work dir and its mirrors.
    ///
    /// A pre-existing `expected/` or `actual/` must be empty: stale
    /// results would silently poison classification. A pre-existing
    /// `backup/` may hold entries from an earlier crashed run; the
    /// caller restores them first.
    pub fn setup(path: &Utf8Path) -> Result<WorkDir> {
        let root_pre_existed = path.exists();
        if !root_pre_existed {
            fs::create_dir_all(path).with_context(|| format!("create work dir {path:?}"))?;
        }
        let root = crate::path::canonicalize(path)?;
        let backup = root.join("backup");
        let expected = root.join("expected");
        let actual = root.join("actual");
        let log_dir = root.join("log");

        let backup_pre_existed = prepare_mirror(&backup, true)?;
        let expected_pre_existed = prepare_mirror(&expected, false)?;
        let actual_pre_existed = prepare_mirror(&actual, false)?;
        if !log_dir.exists() {
            fs::create_dir(&log_dir).with_context(|| format!("create {log_dir:?}"))?;
        }
        debug!(?root, "work dir ready");
        Ok(WorkDir {
            root,
            backup,
            expected,
            actual,
            log_dir,
            root_pre_existed,
            backup_pre_existed,
            expected_pre_existed,
            actual_pre_existed,
        })
    }

    /// Empty `actual/` ahead of copying in a fresh trial's results.
    pub fn clean_actual(&self) -> Result<()> {
        fs::remove_dir_all(&self.actual).with_context(|| format!("remove {:?}", self.actual))?;
        fs::create_dir(&self.actual).with_context(|| format!("create {:?}", self.actual))?;
        Ok(())
    }

    /// Remove whatever this run created; keep whatever pre-existed.
    pub fn cleanup(&self) {
        if !self.root_pre_existed {
            remove_quietly(&self.root);
            return;
        }
        if !self.backup_pre_existed {
            remove_quietly(&self.backup);
        }
        if !self.expected_pre_existed {
            remove_quietly(&self.expected);
        }
        if !self.actual_pre_existed {
            remove_quietly(&self.actual);
        }
    }
}

/// Ensure `path` is a directory, returning whether it pre-existed.
fn prepare_mirror(path: &Utf8Path, may_be_filled: bool) -> Result<bool> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| format!("create {path:?}"))?;
        return Ok(false);
    }
    if !path.is_dir() {
        return Err(Error::config(format!("{path} must be a directory")).into());
    }
    if !may_be_filled
        && path
            .read_dir_utf8()
            .with_context(|| format!("list {path:?}"))?
            .next()
            .is_some()
    {
        return Err(Error::config(format!("{path} must be empty")).into());
    }
    Ok(true)
}

fn remove_quietly(path: &Utf8Path) {
    if let Err(err) = fs::remove_dir_all(path) {
        warn!(?path, ?err, "failed to remove work directory entry");
    }
}

/// Copy the test-result files the test command produced into a mirror,
/// preserving their relative layout.
///
/// Only files whose extension case-insensitively matches `extensions`
/// (default `xml`) are copied.
pub fn copy_test_results(
    from: &Utf8Path,
    to: &Utf8Path,
    extensions: &[String],
) -> Result<()> {
    if !from.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {from:?}"))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            continue;
        };
        let matches = path.extension().is_some_and(|ext| {
            if extensions.is_empty() {
                ext.eq_ignore_ascii_case("xml")
            } else {
                extensions.iter().any(|want| ext.eq_ignore_ascii_case(want))
            }
        });
        if !matches {
            continue;
        }
        let relative = path.strip_prefix(from).expect("walked path is under from");
        let dest = to.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {parent:?}"))?;
        }
        fs::copy(path, &dest).with_context(|| format!("copy {path:?} to {dest:?}"))?;
    }
    Ok(())
}
