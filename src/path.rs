// Copyright 2020 - 2026 LG Electronics Inc.

//! Utilities for file paths.

use std::fmt::Write as _;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};

use crate::Result;

/// Canonicalize a path, converting the result back to UTF-8.
pub fn canonicalize(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("canonicalize {path:?}"))?;
    Utf8PathBuf::try_from(canonical).context("canonical path is not UTF-8")
}

/// The path of `path` relative to `root`, or the path itself when it is
/// not under the root.
pub fn relative_to<'p>(path: &'p Utf8Path, root: &Utf8Path) -> &'p Utf8Path {
    path.strip_prefix(root).unwrap_or(path)
}

/// An extension trait that helps Utf8Path print with forward slashes,
/// even on Windows.
///
/// This makes the output more consistent across platforms and so easier
/// to test.
pub trait Utf8PathSlashes {
    fn to_slash_path(&self) -> String;
}

impl Utf8PathSlashes for Utf8Path {
    fn to_slash_path(&self) -> String {
        self.components()
            .map(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .map(|c| if c == "/" || c == "\\" { "" } else { c })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// The legacy report key for a tree-relative directory: slashes become
/// dots, and the tree root itself is rendered as a single dot.
pub fn legacy_dir_key(dir: &Utf8Path) -> String {
    if dir.as_str().is_empty() {
        return ".".to_owned();
    }
    let mut key = String::new();
    for component in dir.components() {
        if !key.is_empty() {
            key.push('.');
        }
        let _ = write!(key, "{}", component.as_str());
    }
    key
}
