// Copyright 2020 - 2026 LG Electronics Inc.

//! Build globsets from lists of strings.

use std::borrow::Cow;

use anyhow::Context;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::Result;

/// Build a [GlobSet] from patterns, or `None` when no patterns were
/// given (so callers can distinguish "no filter" from "matches nothing").
///
/// A pattern without a slash matches a file or directory name anywhere
/// in the tree; one with a slash is anchored to the whole tree-relative
/// path.
pub fn build_glob_set<S, I>(globs: I) -> Result<Option<GlobSet>>
where
    S: AsRef<str>,
    I: IntoIterator<Item = S>,
{
    let mut has_globs = false;
    let mut builder = GlobSetBuilder::new();
    for glob_str in globs {
        has_globs = true;
        let glob_str = glob_str.as_ref();
        let adjusted = if glob_str.contains('/') {
            vec![Cow::Borrowed(glob_str)]
        } else {
            vec![
                Cow::Owned(format!("**/{glob_str}")),
                Cow::Owned(format!("**/{glob_str}/**")),
            ]
        };
        for g in adjusted {
            builder.add(
                GlobBuilder::new(&g)
                    .literal_separator(true) // * does not match /
                    .build()
                    .with_context(|| format!("failed to build glob from {glob_str:?}"))?,
            );
        }
    }
    if has_globs {
        Ok(Some(builder.build().context("failed to build glob set")?))
    } else {
        Ok(None)
    }
}
