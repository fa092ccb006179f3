// Copyright 2020 - 2026 LG Electronics Inc.

//! Read test-result XML files into sets of passed and failed test names.
//!
//! Three dialects are understood, tried in order until one accepts the
//! document: GoogleTest (`<testsuites>` root), CTest (`<testsuite>` root,
//! `status` attributes), and QtTest (`<testsuite>` root, `result`
//! attributes). A file that fails every parser is logged at debug level
//! and ignored; names are unioned across files.

use std::collections::BTreeSet;
use std::fs::read_to_string;

use camino::Utf8Path;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;
use walkdir::WalkDir;

use crate::Result;

/// The outcome of one test run: which tests passed and which failed.
///
/// Test names have the form `suite.test`. Duplicates across result files
/// collapse by set union.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestOutcome {
    pub passed: BTreeSet<String>,
    pub failed: BTreeSet<String>,
}

impl TestOutcome {
    fn absorb(&mut self, passed: Vec<String>, failed: Vec<String>) {
        self.passed.extend(passed);
        self.failed.extend(failed);
    }
}

/// Recursively read every test-result file under `dir`.
///
/// `extensions` are matched case-insensitively against file extensions;
/// an empty list means `xml` only.
pub fn read_dir(dir: &Utf8Path, extensions: &[String]) -> Result<TestOutcome> {
    let mut outcome = TestOutcome::default();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(?err, "error walking test result dir");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                if extensions.is_empty() {
                    ext.eq_ignore_ascii_case("xml")
                } else {
                    extensions.iter().any(|want| ext.eq_ignore_ascii_case(want))
                }
            });
        if !matches_ext {
            continue;
        }
        let text = match read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                debug!(?path, ?err, "failed to read test result file");
                continue;
            }
        };
        match parse_document(&text) {
            Some((passed, failed)) => outcome.absorb(passed, failed),
            None => debug!(?path, "file matches no known test result format"),
        }
    }
    Ok(outcome)
}

/// Try each dialect in order; `None` if none accepts the document.
pub fn parse_document(text: &str) -> Option<(Vec<String>, Vec<String>)> {
    parse_googletest(text)
        .or_else(|| parse_ctest(text))
        .or_else(|| parse_qtest(text))
}

fn last_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().is_some_and(|top| top.as_slice() == name)
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// GoogleTest: `<testsuites>` / `<testsuite>` / `<testcase status="run"
/// classname="C" name="T">`, with a `<failure>` child marking failure.
/// Cases whose status is not `run` (skipped/disabled) are ignored.
fn parse_googletest(text: &str) -> Option<(Vec<String>, Vec<String>)> {
    let mut reader = Reader::from_str(text);
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    // The case currently open, and whether a <failure> child was seen.
    let mut current: Option<(String, bool)> = None;
    let mut saw_suite = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if stack.is_empty() && name != b"testsuites" {
                    return None;
                }
                if name == b"testsuite" && last_is(&stack, b"testsuites") {
                    saw_suite = true;
                }
                if name == b"testcase"
                    && last_is(&stack, b"testsuite")
                {
                    current = open_googletest_case(&e)?;
                }
                if name == b"failure" {
                    if let Some(case) = &mut current {
                        case.1 = true;
                    }
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = e.name().as_ref().to_vec();
                if stack.is_empty() {
                    return None;
                }
                if name == b"testcase"
                    && last_is(&stack, b"testsuite")
                {
                    if let Some((case, _)) = open_googletest_case(&e)? {
                        passed.push(case);
                    }
                } else if name == b"failure" {
                    if let Some(case) = &mut current {
                        case.1 = true;
                    }
                }
            }
            Ok(Event::End(e)) => {
                stack.pop();
                if e.name().as_ref() == b"testcase" {
                    if let Some((name, case_failed)) = current.take() {
                        if case_failed {
                            failed.push(name);
                        } else {
                            passed.push(name);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    if saw_suite {
        Some((passed, failed))
    } else {
        None
    }
}

/// Interpret one GoogleTest `<testcase>` element.
///
/// Outer `None` rejects the whole document (required attribute missing);
/// inner `None` skips the case (`status` other than `run`).
#[allow(clippy::option_option)]
fn open_googletest_case(e: &BytesStart<'_>) -> Option<Option<(String, bool)>> {
    let status = attr(e, "status")?;
    if status != "run" {
        return Some(None);
    }
    let classname = attr(e, "classname")?;
    let name = attr(e, "name")?;
    Some(Some((format!("{classname}.{name}"), false)))
}

/// CTest: `<testsuite>` root, `<testcase status="run"|"fail" name="T">`
/// with no classname; the name alone identifies the test. Failure is
/// still decided by the presence of a `<failure>` child.
fn parse_ctest(text: &str) -> Option<(Vec<String>, Vec<String>)> {
    let mut reader = Reader::from_str(text);
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<(String, bool)> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if stack.is_empty() && name != b"testsuite" {
                    return None;
                }
                if name == b"testcase"
                    && last_is(&stack, b"testsuite")
                {
                    let status = attr(&e, "status")?;
                    if status == "run" || status == "fail" {
                        current = Some((attr(&e, "name")?, false));
                    }
                }
                if name == b"failure" {
                    if let Some(case) = &mut current {
                        case.1 = true;
                    }
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = e.name().as_ref().to_vec();
                if stack.is_empty() {
                    return None;
                }
                if name == b"testcase"
                    && last_is(&stack, b"testsuite")
                {
                    let status = attr(&e, "status")?;
                    if status == "run" || status == "fail" {
                        passed.push(attr(&e, "name")?);
                    }
                } else if name == b"failure" {
                    if let Some(case) = &mut current {
                        case.1 = true;
                    }
                }
            }
            Ok(Event::End(e)) => {
                stack.pop();
                if e.name().as_ref() == b"testcase" {
                    if let Some((name, case_failed)) = current.take() {
                        if case_failed {
                            failed.push(name);
                        } else {
                            passed.push(name);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    Some((passed, failed))
}

/// QtTest: `<testsuite name="S">` root with `<testcase result="pass"|
/// "fail" name="T">`; the identifier is `S.T`. Results other than pass
/// or fail are ignored.
fn parse_qtest(text: &str) -> Option<(Vec<String>, Vec<String>)> {
    let mut reader = Reader::from_str(text);
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut suite_name: Option<String> = None;
    let mut handle = |e: &BytesStart<'_>,
                      stack: &[Vec<u8>],
                      suite_name: &mut Option<String>|
     -> Option<()> {
        let name_binding = e.name();
        let name = name_binding.as_ref();
        if stack.is_empty() {
            if name != b"testsuite" {
                return None;
            }
            *suite_name = attr(e, "name");
        }
        if name == b"testcase" && last_is(&stack, b"testsuite") {
            let result = attr(e, "result")?;
            let suite = suite_name.clone()?;
            let case = attr(e, "name")?;
            let full = format!("{suite}.{case}");
            match result.as_str() {
                "pass" => passed.push(full),
                "fail" => failed.push(full),
                _ => {}
            }
        }
        Some(())
    };
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                handle(&e, &stack, &mut suite_name)?;
                stack.push(e.name().as_ref().to_vec());
            }
            Ok(Event::Empty(e)) => {
                handle(&e, &stack, &mut suite_name)?;
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    Some((passed, failed))
}

#[cfg(test)]
mod test {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    const GTEST: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <testsuites tests="3" failures="1" name="AllTests">
          <testsuite name="Calc" tests="3" failures="1">
            <testcase name="adds" status="run" classname="Calc">
            </testcase>
            <testcase name="subtracts" status="run" classname="Calc">
              <failure message="expected 1, got 3" type=""/>
            </testcase>
            <testcase name="skipped" status="notrun" classname="Calc"/>
          </testsuite>
        </testsuites>
    "#};

    const CTEST: &str = indoc! {r#"
        <testsuite name="project" tests="2">
          <testcase status="run" name="smoke"/>
          <testcase status="fail" name="regress">
            <failure/>
          </testcase>
        </testsuite>
    "#};

    const QTEST: &str = indoc! {r#"
        <testsuite name="WidgetTest">
          <testcase result="pass" name="paints"/>
          <testcase result="fail" name="resizes"/>
          <testcase result="skip" name="maybe"/>
        </testsuite>
    "#};

    #[test]
    fn googletest_dialect() {
        let (passed, failed) = parse_document(GTEST).unwrap();
        assert_eq!(passed, ["Calc.adds"]);
        assert_eq!(failed, ["Calc.subtracts"]);
    }

    #[test]
    fn googletest_rejects_missing_status() {
        let doc = indoc! {r#"
            <testsuites>
              <testsuite name="S">
                <testcase name="t" classname="S"/>
              </testsuite>
            </testsuites>
        "#};
        assert!(parse_googletest(doc).is_none());
    }

    #[test]
    fn ctest_dialect() {
        // Not a googletest document, so the chain falls through.
        assert!(parse_googletest(CTEST).is_none());
        let (passed, failed) = parse_document(CTEST).unwrap();
        assert_eq!(passed, ["smoke"]);
        assert_eq!(failed, ["regress"]);
    }

    #[test]
    fn qtest_dialect() {
        // CTest wants status attributes, so a QtTest file falls through.
        assert!(parse_ctest(QTEST).is_none());
        let (passed, failed) = parse_document(QTEST).unwrap();
        assert_eq!(passed, ["WidgetTest.paints"]);
        assert_eq!(failed, ["WidgetTest.resizes"]);
    }

    #[test]
    fn garbage_matches_no_dialect() {
        assert!(parse_document("this is not xml").is_none());
        assert!(parse_document("<report><case/></report>").is_none());
    }

    #[test]
    fn read_dir_unions_files_and_skips_unparseable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.xml"), GTEST).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.XML"), QTEST).unwrap();
        std::fs::write(dir.path().join("junk.xml"), "not xml at all").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let outcome = read_dir(
            Utf8Path::from_path(dir.path()).unwrap(),
            &["xml".to_owned()],
        )
        .unwrap();
        assert_eq!(
            outcome.passed.iter().collect::<Vec<_>>(),
            ["Calc.adds", "WidgetTest.paints"]
        );
        assert_eq!(
            outcome.failed.iter().collect::<Vec<_>>(),
            ["Calc.subtracts", "WidgetTest.resizes"]
        );
    }

    #[test]
    fn duplicate_names_across_files_collapse() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.xml"), GTEST).unwrap();
        std::fs::write(dir.path().join("b.xml"), GTEST).unwrap();
        let outcome = read_dir(Utf8Path::from_path(dir.path()).unwrap(), &[]).unwrap();
        assert_eq!(outcome.passed.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
    }
}
