// Copyright 2020 - 2026 LG Electronics Inc.

//! The trial orchestrator: golden run, mutant population, and the
//! apply-build-test-classify-restore loop for every selected mutant.

use std::collections::BTreeMap;
use std::fs;
use std::time::{Duration, Instant};

use anyhow::Context;
use camino::Utf8Path;
use itertools::Itertools;
use tracing::{error, info, warn};

use crate::ast::CompilationDb;
use crate::console::{style_state, Console};
use crate::coverage::CoverageFilter;
use crate::error::Error;
use crate::interrupt::check_interrupted;
use crate::log_file::LogFile;
use crate::mutant::Mutant;
use crate::options::{Options, TimeoutSetting};
use crate::outcome::{Evaluator, MutationResult, TrialState};
use crate::process::run_command;
use crate::sample::sample;
use crate::vcs::GitRepository;
use crate::work_dir::{copy_test_results, WorkDir};
use crate::{mutate, visit, Result};

/// Restores the source tree from the backup unless disarmed.
///
/// Armed before a mutant is applied and disarmed only after the happy
/// path restored the tree itself, so any unwind (error, interrupt,
/// panic) puts the pristine bytes back on the way out.
struct RestoreGuard<'a> {
    backup: &'a Utf8Path,
    source_root: &'a Utf8Path,
    armed: bool,
}

impl<'a> RestoreGuard<'a> {
    fn arm(backup: &'a Utf8Path, source_root: &'a Utf8Path) -> RestoreGuard<'a> {
        RestoreGuard {
            backup,
            source_root,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = mutate::restore(self.backup, self.source_root) {
                error!(?err, "failed to restore source tree from backup");
            }
        }
    }
}

/// Run the whole experiment and return every mutation result.
pub fn run_lab(options: &Options, console: &Console) -> Result<Vec<MutationResult>> {
    let work = WorkDir::setup(&options.work_dir)?;
    let outcome = run_lab_inner(options, console, &work);
    // Whatever happened, put any pending backup entries back and remove
    // the directories this run created.
    if let Err(err) = mutate::restore(&work.backup, &options.source_root) {
        error!(?err, "failed to restore source tree during cleanup");
    }
    work.cleanup();
    outcome
}

fn run_lab_inner(
    options: &Options,
    console: &Console,
    work: &WorkDir,
) -> Result<Vec<MutationResult>> {
    // A backup left behind by an interrupted earlier run is restored
    // before anything else reads the tree.
    mutate::restore(&work.backup, &options.source_root)?;

    prepare_test_result_dir(&options.test_result_dir)?;

    // Golden trial.
    let mut golden_log = LogFile::create_in(&work.log_dir, "baseline")?;
    let activity = console.start_activity("baseline build and test");
    let build = run_command(
        &options.build_command,
        &options.build_dir,
        None,
        Duration::ZERO,
        &mut golden_log,
    )?;
    if !build.success() {
        activity.clear();
        console.error("build command failed on unmutated source; see the baseline log");
        return Err(Error::GoldenBuildFail.into());
    }
    let golden_timeout = match options.timeout {
        TimeoutSetting::Fixed(limit) => Some(limit),
        TimeoutSetting::Auto | TimeoutSetting::Never => None,
    };
    let test_start = Instant::now();
    let golden_test = run_command(
        &options.test_command,
        &options.build_dir,
        golden_timeout,
        options.kill_after,
        &mut golden_log,
    )?;
    let golden_elapsed = test_start.elapsed();
    if golden_test.timed_out {
        activity.clear();
        return Err(anyhow::anyhow!(
            "test command timed out on unmutated source"
        ));
    }
    activity.finish(console::style("ok").green());
    check_test_results_present(&options.test_result_dir)?;
    copy_test_results(
        &options.test_result_dir,
        &work.expected,
        &options.test_result_extensions,
    )?;
    clear_dir(&options.test_result_dir)?;
    let mut evaluator = Evaluator::new(&work.expected, &options.test_result_extensions)?;
    info!(
        golden_passed = evaluator.golden().passed.len(),
        golden_failed = evaluator.golden().failed.len(),
        elapsed = ?golden_elapsed,
        "golden run complete"
    );

    let operative_timeout = match options.timeout {
        TimeoutSetting::Never => None,
        TimeoutSetting::Fixed(limit) => Some(limit),
        TimeoutSetting::Auto => {
            let limit = auto_timeout(golden_elapsed, options.timeout_multiplier);
            console.message(&format!(
                "test timeout auto-set to {}",
                humantime::format_duration(limit)
            ));
            Some(limit)
        }
    };

    // Mutant population.
    let mutants = populate_mutants(options, console)?;
    if mutants.is_empty() {
        console.message("no mutants to test");
        return Ok(Vec::new());
    }

    let coverage = if options.coverage_files.is_empty() {
        None
    } else {
        Some(CoverageFilter::from_files(&options.coverage_files)?)
    };

    // Trial loop.
    let total = mutants.len();
    for (index, mutant) in mutants.iter().enumerate() {
        check_interrupted()?;
        if let Some(coverage) = &coverage {
            if !coverage.covered(&mutant.path, mutant.span.start.line) {
                let result = evaluator.evaluate(mutant, &work.actual, TrialState::Uncovered)?;
                console.message(&format!(
                    "mutant {}/{}: {} ... {} (uncovered)",
                    index + 1,
                    total,
                    mutant.name(&options.source_root),
                    style_state(result.state),
                ));
                continue;
            }
        }
        let result = run_trial(options, console, work, &mut evaluator, mutant, index, total,
            operative_timeout)?;
        console.message(&format!(
            "mutant {}/{}: {} ... {}",
            index + 1,
            total,
            mutant.name(&options.source_root),
            style_state(result.state),
        ));
    }
    Ok(evaluator.results().to_vec())
}

/// One backup-apply-build-test-classify-restore cycle.
#[allow(clippy::too_many_arguments)]
fn run_trial<'r>(
    options: &Options,
    console: &Console,
    work: &WorkDir,
    evaluator: &'r mut Evaluator,
    mutant: &Mutant,
    index: usize,
    total: usize,
    timeout: Option<Duration>,
) -> Result<&'r MutationResult> {
    let mut log_file = LogFile::create_in(
        &work.log_dir,
        &mutant.log_file_name_base(&options.source_root),
    )?;
    log_file.message(&mutant.to_string());
    let mut activity = console.start_activity(&format!(
        "mutant {}/{}: {}",
        index + 1,
        total,
        mutant.name(&options.source_root)
    ));

    let original = fs::read_to_string(&mutant.path)
        .with_context(|| format!("read {:?}", mutant.path))?;
    log_file.message(&format!(
        "replacing {:?} with {:?}",
        mutant.span.extract(&original),
        mutant.replacement
    ));
    let guard = RestoreGuard::arm(&work.backup, &options.source_root);
    mutate::apply(mutant, &options.source_root, &work.backup)?;
    if let Ok(mutated) = fs::read_to_string(&mutant.path) {
        log_file.message(&mutant.diff(&original, &mutated));
    }

    activity.set_phase("build");
    let build = run_command(
        &options.build_command,
        &options.build_dir,
        None,
        Duration::ZERO,
        &mut log_file,
    )?;
    let trial_state = if build.success() {
        activity.set_phase("test");
        clear_dir(&options.test_result_dir)?;
        let test = run_command(
            &options.test_command,
            &options.build_dir,
            timeout,
            options.kill_after,
            &mut log_file,
        )?;
        if test.timed_out {
            // Partial output from a killed run proves nothing.
            clear_dir(&options.test_result_dir)?;
            work.clean_actual()?;
            TrialState::Timeout
        } else {
            work.clean_actual()?;
            copy_test_results(
                &options.test_result_dir,
                &work.actual,
                &options.test_result_extensions,
            )?;
            clear_dir(&options.test_result_dir)?;
            TrialState::Success
        }
    } else {
        info!("build failed for this mutant");
        TrialState::BuildFailure
    };

    activity.set_phase("restore");
    let result = evaluator.evaluate(mutant, &work.actual, trial_state)?;
    mutate::restore(&work.backup, &options.source_root)?;
    guard.disarm();
    activity.clear();
    Ok(result)
}

fn populate_mutants(options: &Options, console: &Console) -> Result<Vec<Mutant>> {
    let repo = GitRepository::open(
        &options.source_root,
        &options.extensions,
        &options.examine_globs,
        &options.exclude_globs,
    )?;
    let mut source_lines = repo.source_lines(options.scope)?;
    fastrand::Rng::with_seed(options.seed).shuffle(&mut source_lines);

    let db = CompilationDb::load(&options.build_dir)?;
    let activity = console.start_activity("discovering mutants");
    let discovered = visit::walk_tree(&db, &source_lines)?;
    activity.clear();

    let mutants = sample(
        options.generator,
        &discovered.mutants,
        &source_lines,
        &discovered.line_depths,
        options.limit,
        options.seed,
    );

    let per_file: BTreeMap<&Utf8Path, usize> = mutants
        .iter()
        .map(|m| crate::path::relative_to(&m.path, &options.source_root))
        .counts()
        .into_iter()
        .collect();
    info!(
        candidates = discovered.mutants.len(),
        selected = mutants.len(),
        "mutant population"
    );
    for (path, count) in &per_file {
        info!("  {path}: {count} mutants");
    }
    console.message(&format!(
        "{} mutants selected from {} candidates in {} files",
        mutants.len(),
        discovered.mutants.len(),
        per_file.len(),
    ));
    Ok(mutants)
}

fn prepare_test_result_dir(path: &Utf8Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(
                Error::config(format!("test result path {path} is not a directory")).into(),
            );
        }
        if path
            .read_dir_utf8()
            .with_context(|| format!("list {path:?}"))?
            .next()
            .is_some()
        {
            return Err(Error::config(format!("test result path {path} is not empty")).into());
        }
    } else {
        fs::create_dir_all(path).with_context(|| format!("create {path:?}"))?;
    }
    Ok(())
}

fn check_test_results_present(path: &Utf8Path) -> Result<()> {
    if !path.is_dir()
        || path
            .read_dir_utf8()
            .with_context(|| format!("list {path:?}"))?
            .next()
            .is_none()
    {
        warn!(?path, "test command wrote no result files");
        return Err(Error::config(format!(
            "the test command produced no files under {path}"
        ))
        .into());
    }
    Ok(())
}

/// The operative timeout derived from the golden run, never below one
/// second.
fn auto_timeout(golden_elapsed: Duration, multiplier: f64) -> Duration {
    let secs = (golden_elapsed.as_secs_f64() * multiplier).ceil();
    Duration::from_secs((secs as u64).max(1))
}

fn clear_dir(path: &Utf8Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).with_context(|| format!("remove {path:?}"))?;
    }
    fs::create_dir_all(path).with_context(|| format!("create {path:?}"))?;
    Ok(())
}
