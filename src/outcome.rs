// Copyright 2020 - 2026 LG Electronics Inc.

//! Classify a mutant trial from the golden and post-mutation test
//! outcomes, and persist mutation results.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::str::FromStr;

use anyhow::{anyhow, Context};
use camino::Utf8Path;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Error;
use crate::mutant::Mutant;
use crate::test_results::{read_dir, TestOutcome};
use crate::Result;

/// The bottom line of one mutant trial.
///
/// The discriminants are the on-disk state codes of the evaluation log.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationState {
    Killed = 0,
    Survived = 1,
    RuntimeError = 2,
    BuildFailure = 3,
    Timeout = 4,
}

impl MutationState {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<MutationState> {
        match code {
            0 => Ok(MutationState::Killed),
            1 => Ok(MutationState::Survived),
            2 => Ok(MutationState::RuntimeError),
            3 => Ok(MutationState::BuildFailure),
            4 => Ok(MutationState::Timeout),
            _ => Err(anyhow!("unknown mutation state code {code}")),
        }
    }
}

/// What the orchestrator observed before classification: the outcome of
/// the build/test cycle, or that the cycle was skipped as uncovered.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum TrialState {
    Success,
    BuildFailure,
    Timeout,
    Uncovered,
}

/// The classification of one mutant, with its evidence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MutationResult {
    pub mutant: Mutant,
    pub state: MutationState,
    /// Tests that passed in the golden run and failed after the mutant.
    pub killing_tests: BTreeSet<String>,
    /// Tests that passed in the golden run and are absent afterwards.
    pub erroring_tests: BTreeSet<String>,
}

impl MutationResult {
    pub fn detected(&self) -> bool {
        self.state == MutationState::Killed
    }

    /// States that never reached a comparable test run and are excluded
    /// from the coverage denominator.
    pub fn skipped_in_coverage(&self) -> bool {
        matches!(
            self.state,
            MutationState::BuildFailure | MutationState::RuntimeError | MutationState::Timeout
        )
    }
}

/// One line per result: killing tests, erroring tests (each joined with
/// `", "`), the numeric state, then a triple-tab and the serialized
/// mutant.
impl fmt::Display for MutationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t\t\t{}",
            self.killing_tests.iter().join(", "),
            self.erroring_tests.iter().join(", "),
            self.state.code(),
            self.mutant
        )
    }
}

impl FromStr for MutationResult {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<MutationResult> {
        let (prefix, mutant) = line
            .split_once("\t\t\t")
            .ok_or_else(|| anyhow!("malformed mutation result line {line:?}"))?;
        let fields: Vec<&str> = prefix.splitn(3, '\t').collect();
        if fields.len() != 3 {
            return Err(anyhow!("malformed mutation result line {line:?}"));
        }
        let parse_set = |s: &str| -> BTreeSet<String> {
            if s.is_empty() {
                BTreeSet::new()
            } else {
                s.split(", ").map(str::to_owned).collect()
            }
        };
        Ok(MutationResult {
            mutant: mutant.parse()?,
            state: MutationState::from_code(
                fields[2]
                    .parse()
                    .with_context(|| format!("bad state code {:?}", fields[2]))?,
            )?,
            killing_tests: parse_set(fields[0]),
            erroring_tests: parse_set(fields[1]),
        })
    }
}

/// Append one result to an evaluation log.
pub fn append_result(result: &MutationResult, path: &Utf8Path) -> Result<()> {
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {path:?} for append"))?;
    writeln!(out, "{result}").with_context(|| format!("write {path:?}"))
}

/// Load an evaluation log written by [append_result].
pub fn load_results(path: &Utf8Path) -> Result<Vec<MutationResult>> {
    let file = File::open(path).with_context(|| format!("open {path:?}"))?;
    let mut results = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("read {path:?}"))?;
        if line.is_empty() {
            continue;
        }
        results.push(line.parse()?);
    }
    Ok(results)
}

/// Apply the classification rules, in order.
///
/// `RUNTIME_ERROR` deliberately takes precedence over `KILLED` when both
/// kinds of evidence exist: a test runner that crashed is a different
/// signal from an assertion that disagreed.
pub fn classify(
    golden: &TestOutcome,
    post: &TestOutcome,
    trial: TrialState,
) -> (MutationState, BTreeSet<String>, BTreeSet<String>) {
    match trial {
        TrialState::BuildFailure => {
            return (MutationState::BuildFailure, BTreeSet::new(), BTreeSet::new())
        }
        TrialState::Timeout => {
            return (MutationState::Timeout, BTreeSet::new(), BTreeSet::new())
        }
        TrialState::Uncovered => {
            return (MutationState::Survived, BTreeSet::new(), BTreeSet::new())
        }
        TrialState::Success => {}
    }
    let killing: BTreeSet<String> = golden
        .passed
        .iter()
        .filter(|t| post.failed.contains(*t))
        .cloned()
        .collect();
    let erroring: BTreeSet<String> = golden
        .passed
        .iter()
        .filter(|t| !post.passed.contains(*t) && !post.failed.contains(*t))
        .cloned()
        .collect();
    let state = if !erroring.is_empty() {
        MutationState::RuntimeError
    } else if !killing.is_empty() {
        MutationState::Killed
    } else {
        MutationState::Survived
    };
    (state, killing, erroring)
}

/// Holds the golden outcome and classifies each mutant trial against it.
pub struct Evaluator {
    golden: TestOutcome,
    test_result_extensions: Vec<String>,
    results: Vec<MutationResult>,
}

impl Evaluator {
    /// Read the golden outcome from the expected-results directory.
    ///
    /// A golden run with no passing tests cannot kill anything, so it is
    /// rejected up front as [Error::GoldenEmpty].
    pub fn new(expected_dir: &Utf8Path, test_result_extensions: &[String]) -> Result<Evaluator> {
        let golden = read_dir(expected_dir, test_result_extensions)?;
        debug!(
            passed = golden.passed.len(),
            failed = golden.failed.len(),
            "loaded expected test results"
        );
        if golden.passed.is_empty() {
            return Err(Error::GoldenEmpty.into());
        }
        Ok(Evaluator {
            golden,
            test_result_extensions: test_result_extensions.to_vec(),
            results: Vec::new(),
        })
    }

    pub fn golden(&self) -> &TestOutcome {
        &self.golden
    }

    /// Classify one mutant from the actual-results directory and record
    /// the result.
    pub fn evaluate(
        &mut self,
        mutant: &Mutant,
        actual_dir: &Utf8Path,
        trial: TrialState,
    ) -> Result<&MutationResult> {
        let post = if trial == TrialState::Success {
            read_dir(actual_dir, &self.test_result_extensions)?
        } else {
            TestOutcome::default()
        };
        let (state, killing_tests, erroring_tests) = classify(&self.golden, &post, trial);
        if trial == TrialState::Uncovered {
            info!(mutant = %mutant, "mutant line is uncovered; counted as SURVIVED");
        } else {
            info!(mutant = %mutant, %state, "evaluated mutant");
        }
        self.results.push(MutationResult {
            mutant: mutant.clone(),
            state,
            killing_tests,
            erroring_tests,
        });
        Ok(self.results.last().expect("result was just pushed"))
    }

    pub fn results(&self) -> &[MutationResult] {
        &self.results
    }
}

#[cfg(test)]
mod test {
    use camino::Utf8PathBuf;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mutant::Operator;
    use crate::span::Span;

    fn outcome(passed: &[&str], failed: &[&str]) -> TestOutcome {
        TestOutcome {
            passed: passed.iter().map(|s| (*s).to_owned()).collect(),
            failed: failed.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    fn mutant() -> Mutant {
        Mutant {
            operator: Operator::Aor,
            path: Utf8PathBuf::from("/w/sample.cpp"),
            qualified_function: "f".to_owned(),
            span: Span::quad(1, 20, 1, 21),
            replacement: "-".to_owned(),
        }
    }

    #[test]
    fn killed_when_a_passing_test_fails() {
        let golden = outcome(&["T.t", "T.u"], &[]);
        let post = outcome(&["T.u"], &["T.t"]);
        let (state, killing, erroring) = classify(&golden, &post, TrialState::Success);
        assert_eq!(state, MutationState::Killed);
        assert_eq!(killing.iter().collect::<Vec<_>>(), ["T.t"]);
        assert!(erroring.is_empty());
    }

    #[test]
    fn survived_when_everything_still_passes() {
        let golden = outcome(&["T.t"], &["T.broken"]);
        let post = outcome(&["T.t"], &["T.broken"]);
        let (state, killing, erroring) = classify(&golden, &post, TrialState::Success);
        assert_eq!(state, MutationState::Survived);
        assert!(killing.is_empty() && erroring.is_empty());
    }

    #[test]
    fn runtime_error_when_a_passing_test_disappears() {
        let golden = outcome(&["T.t"], &[]);
        let post = outcome(&[], &[]);
        let (state, killing, erroring) = classify(&golden, &post, TrialState::Success);
        assert_eq!(state, MutationState::RuntimeError);
        assert!(killing.is_empty());
        assert_eq!(erroring.iter().collect::<Vec<_>>(), ["T.t"]);
    }

    #[test]
    fn runtime_error_takes_precedence_over_killed() {
        let golden = outcome(&["T.a", "T.b"], &[]);
        let post = outcome(&[], &["T.a"]);
        let (state, killing, erroring) = classify(&golden, &post, TrialState::Success);
        assert_eq!(state, MutationState::RuntimeError);
        assert_eq!(killing.iter().collect::<Vec<_>>(), ["T.a"]);
        assert_eq!(erroring.iter().collect::<Vec<_>>(), ["T.b"]);
    }

    #[test]
    fn tests_failing_before_the_mutant_are_not_evidence() {
        let golden = outcome(&[], &["T.broken"]);
        let post = outcome(&[], &["T.broken"]);
        let (state, killing, erroring) = classify(&golden, &post, TrialState::Success);
        assert_eq!(state, MutationState::Survived);
        assert!(killing.is_empty() && erroring.is_empty());
    }

    #[test]
    fn build_failure_and_timeout_carry_no_evidence() {
        let golden = outcome(&["T.t"], &[]);
        let post = outcome(&[], &["T.t"]);
        let (state, killing, erroring) = classify(&golden, &post, TrialState::BuildFailure);
        assert_eq!(state, MutationState::BuildFailure);
        assert!(killing.is_empty() && erroring.is_empty());
        let (state, ..) = classify(&golden, &post, TrialState::Timeout);
        assert_eq!(state, MutationState::Timeout);
    }

    #[test]
    fn uncovered_counts_as_survived() {
        let golden = outcome(&["T.t"], &[]);
        let (state, killing, erroring) =
            classify(&golden, &TestOutcome::default(), TrialState::Uncovered);
        assert_eq!(state, MutationState::Survived);
        assert!(killing.is_empty() && erroring.is_empty());
    }

    #[test]
    fn classification_is_deterministic() {
        let golden = outcome(&["T.a", "T.b", "T.c"], &[]);
        let post = outcome(&["T.c"], &["T.a"]);
        let first = classify(&golden, &post, TrialState::Success);
        let second = classify(&golden, &post, TrialState::Success);
        assert_eq!(first, second);
    }

    #[test]
    fn result_line_round_trip() {
        let result = MutationResult {
            mutant: mutant(),
            state: MutationState::Killed,
            killing_tests: ["T.t".to_owned(), "T.u".to_owned()].into(),
            erroring_tests: BTreeSet::new(),
        };
        let line = result.to_string();
        assert_eq!(line, "T.t, T.u\t\t0\t\t\tAOR,/w/sample.cpp,f,1,20,1,21,-");
        assert_eq!(line.parse::<MutationResult>().unwrap(), result);
    }

    #[test]
    fn append_and_load_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("evaluation")).unwrap();
        let a = MutationResult {
            mutant: mutant(),
            state: MutationState::Survived,
            killing_tests: BTreeSet::new(),
            erroring_tests: BTreeSet::new(),
        };
        let b = MutationResult {
            mutant: mutant(),
            state: MutationState::RuntimeError,
            killing_tests: BTreeSet::new(),
            erroring_tests: ["T.t".to_owned()].into(),
        };
        append_result(&a, &path).unwrap();
        append_result(&b, &path).unwrap();
        assert_eq!(load_results(&path).unwrap(), vec![a, b]);
    }

    #[test]
    fn state_codes_are_stable() {
        assert_eq!(MutationState::Killed.code(), 0);
        assert_eq!(MutationState::Survived.code(), 1);
        assert_eq!(MutationState::RuntimeError.code(), 2);
        assert_eq!(MutationState::BuildFailure.code(), 3);
        assert_eq!(MutationState::Timeout.code(), 4);
        assert_eq!(MutationState::RuntimeError.to_string(), "RUNTIME_ERROR");
    }
}
