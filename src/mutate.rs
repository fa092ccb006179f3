// Copyright 2020 - 2026 LG Electronics Inc.

//! Apply one mutant to the on-disk source tree, and put the tree back.
//!
//! The backup directory mirrors the source tree's relative structure and
//! is the durable record of the pristine content: a file is always
//! copied there byte-for-byte before it is touched, and restoration
//! copies it back and removes the backup entry. The mutated content is
//! written atomically (temp file and rename in the same directory), so a
//! failure part-way leaves the source file byte-identical to before.

use std::fs;

use anyhow::{anyhow, Context};
use camino::Utf8Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Error;
use crate::mutant::Mutant;
use crate::span::Span;
use crate::Result;

/// Back up the target file and write the mutated content in its place.
pub fn apply(mutant: &Mutant, source_root: &Utf8Path, backup_root: &Utf8Path) -> Result<()> {
    let target = crate::path::canonicalize(&mutant.path)?;
    let source_root = crate::path::canonicalize(source_root)?;
    let relative = target.strip_prefix(&source_root).map_err(|_| Error::PathEscape {
        path: target.clone(),
        source_root: source_root.clone(),
    })?;

    let backup_path = backup_root.join(relative);
    if let Some(parent) = backup_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {parent:?}"))?;
    }
    fs::copy(&target, &backup_path)
        .with_context(|| format!("back up {target:?} to {backup_path:?}"))?;
    info!(backup = %backup_path, "backed up source file");

    let code = fs::read_to_string(&target).with_context(|| format!("read {target:?}"))?;
    let mutated = splice(&code, &mutant.span, &mutant.replacement)?;

    let parent = target
        .parent()
        .ok_or_else(|| anyhow!("{target:?} has no parent directory"))?;
    let temp = tempfile::Builder::new()
        .prefix(".sentinel-mutant-")
        .tempfile_in(parent)
        .with_context(|| format!("create temp file in {parent:?}"))?;
    fs::write(temp.path(), &mutated).with_context(|| format!("write mutated {target:?}"))?;
    temp.persist(&target)
        .with_context(|| format!("replace {target:?}"))?;
    debug!(mutant = %mutant, "applied mutant");
    Ok(())
}

/// Copy every backup entry back under the source root and remove it.
///
/// Used on the happy path after classification, and from the unwind path
/// on any error or interruption. Idempotent: an empty or missing backup
/// directory restores nothing.
pub fn restore(backup_root: &Utf8Path, source_root: &Utf8Path) -> Result<()> {
    if !backup_root.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(backup_root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {backup_root:?}"))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let backup_file = Utf8Path::from_path(entry.path())
            .ok_or_else(|| anyhow!("backup path is not UTF-8"))?;
        let relative = backup_file
            .strip_prefix(backup_root)
            .expect("walked path is under the backup root");
        let target = source_root.join(relative);
        fs::copy(backup_file, &target)
            .with_context(|| format!("restore {backup_file:?} to {target:?}"))?;
        info!(restored = %target, "restored source file");
    }
    // Drop the now-applied backup entries so a later restore is a no-op.
    for entry in backup_root
        .read_dir_utf8()
        .with_context(|| format!("list {backup_root:?}"))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())
                .with_context(|| format!("remove {:?}", entry.path()))?;
        } else {
            fs::remove_file(entry.path())
                .with_context(|| format!("remove {:?}", entry.path()))?;
        }
    }
    Ok(())
}

/// Replace the `[first, last)` region of `code` with `replacement`,
/// walking lines so original line terminators are preserved outside the
/// mutated region.
fn splice(code: &str, span: &Span, replacement: &str) -> Result<String> {
    let first = span.start;
    let last = span.end;
    let mut out = String::with_capacity(code.len() + replacement.len());
    let mut line_count = 0;
    for (idx, line) in code.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        line_count = line_no;
        if line_no < first.line || line_no > last.line {
            out.push_str(line);
            continue;
        }
        if line_no == first.line {
            let cut = first.column - 1;
            let prefix = line
                .get(..cut)
                .ok_or_else(|| anyhow!("column {} is outside line {}", first.column, line_no))?;
            out.push_str(prefix);
            out.push_str(replacement);
        }
        if line_no == last.line {
            let cut = last.column - 1;
            let suffix = line
                .get(cut..)
                .ok_or_else(|| anyhow!("column {} is outside line {}", last.column, line_no))?;
            out.push_str(suffix);
        }
        // Lines strictly between first and last are dropped.
    }
    if first.line > line_count || last.line > line_count {
        return Err(anyhow!(
            "mutant range {}..{} is outside the file's {} lines",
            first.line,
            last.line,
            line_count
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use std::fs;

    use camino::{Utf8Path, Utf8PathBuf};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mutant::Operator;

    const SAMPLE: &str = indoc! { r"
        int f() {
            return 1 + 2;
        }
    " };

    fn scratch() -> (tempfile::TempDir, Utf8PathBuf, Utf8PathBuf, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_owned()).unwrap();
        let src = root.join("src");
        fs::create_dir(&src).unwrap();
        let file = src.join("sample.cpp");
        fs::write(&file, SAMPLE).unwrap();
        let backup = root.join("backup");
        fs::create_dir(&backup).unwrap();
        (dir, root, file, backup)
    }

    fn mutant_at(path: &Utf8Path, span: Span, replacement: &str) -> Mutant {
        Mutant {
            operator: Operator::Aor,
            path: path.to_owned(),
            qualified_function: "f".to_owned(),
            span,
            replacement: replacement.to_owned(),
        }
    }

    #[test]
    fn splice_single_line() {
        let out = splice(SAMPLE, &Span::quad(2, 14, 2, 15), "-").unwrap();
        assert_eq!(out, "int f() {\n    return 1 - 2;\n}\n");
    }

    #[test]
    fn splice_zero_width_span_inserts() {
        let out = splice(SAMPLE, &Span::quad(2, 5, 2, 5), "/*x*/").unwrap();
        assert_eq!(out, "int f() {\n    /*x*/return 1 + 2;\n}\n");
    }

    #[test]
    fn splice_multi_line_drops_interior_lines() {
        let code = "a(\n  b,\n  c,\n  d);\n";
        let out = splice(code, &Span::quad(1, 1, 4, 6), "{}").unwrap();
        assert_eq!(out, "{}\n");
    }

    #[test]
    fn splice_range_outside_file_is_an_error() {
        assert!(splice(SAMPLE, &Span::quad(9, 1, 9, 2), "x").is_err());
        assert!(splice(SAMPLE, &Span::quad(1, 1, 1, 999), "x").is_err());
    }

    #[test]
    fn apply_backs_up_and_mutates() {
        let (_dir, root, file, backup) = scratch();
        let mutant = mutant_at(&file, Span::quad(2, 14, 2, 15), "-");
        apply(&mutant, &root, &backup).unwrap();

        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "int f() {\n    return 1 - 2;\n}\n"
        );
        assert_eq!(
            fs::read_to_string(backup.join("src/sample.cpp")).unwrap(),
            SAMPLE
        );
    }

    #[test]
    fn restore_round_trips_bytes_and_empties_backup() {
        let (_dir, root, file, backup) = scratch();
        let mutant = mutant_at(&file, Span::quad(2, 14, 2, 15), "%");
        apply(&mutant, &root, &backup).unwrap();
        restore(&backup, &root).unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), SAMPLE);
        assert_eq!(backup.read_dir_utf8().unwrap().count(), 0);

        // A second restore is a no-op.
        restore(&backup, &root).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), SAMPLE);
    }

    #[test]
    fn path_outside_source_root_is_rejected() {
        let (_dir, root, _file, backup) = scratch();
        let outside = tempfile::NamedTempFile::new().unwrap();
        fs::write(outside.path(), "int x;\n").unwrap();
        let outside_path = Utf8PathBuf::try_from(outside.path().to_owned()).unwrap();
        let mutant = mutant_at(&outside_path, Span::quad(1, 1, 1, 2), "y");
        let err = apply(&mutant, &root, &backup).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PathEscape { .. })
        ));
        // The stray file was not touched.
        assert_eq!(fs::read_to_string(outside.path()).unwrap(), "int x;\n");
    }

    #[test]
    fn failed_apply_leaves_source_untouched() {
        let (_dir, root, file, backup) = scratch();
        // Range beyond the end of the file: the splice fails after the
        // backup was taken, and the source must be unmodified.
        let mutant = mutant_at(&file, Span::quad(99, 1, 99, 2), "x");
        assert!(apply(&mutant, &root, &backup).is_err());
        assert_eq!(fs::read_to_string(&file).unwrap(), SAMPLE);
    }
}
