// Copyright 2020 - 2026 LG Electronics Inc.

//! Command-line argument structs and the resolved in-process options.
//!
//! Arguments are merged with the source tree's `.sentinel.toml` (the
//! command line wins) into an [Options] value that the orchestrator
//! reads; nothing downstream looks at clap types.

use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Args;
use tracing::info;

use crate::config::Config;
use crate::error::Error;
use crate::sample::GeneratorKind;
use crate::vcs::Scope;
use crate::Result;

/// File extensions mutated when neither the command line nor the config
/// file names any.
pub const DEFAULT_EXTENSIONS: &[&str] = &["cxx", "cpp", "cc", "c", "c++", "cu"];

/// Arguments shared by `populate` and `run`.
#[derive(Args, Debug)]
pub struct PopulateArgs {
    /// Root of the source tree to mutate.
    #[arg(long, default_value = ".")]
    pub source_root: Utf8PathBuf,

    /// Directory where compile_commands.json lives.
    #[arg(long, short = 'b', default_value = ".")]
    pub build_dir: Utf8PathBuf,

    /// Which lines are candidates: every tracked line, or the lines
    /// changed since the parent commit.
    #[arg(long, short = 's', value_enum, default_value = "all")]
    pub scope: Scope,

    /// Extensions of source files to be mutated (repeatable).
    #[arg(long = "extension", short = 't')]
    pub extensions: Vec<String>,

    /// Generate mutants only in files matching these globs (repeatable).
    #[arg(long = "pattern", short = 'p')]
    pub examine_globs: Vec<String>,

    /// Generate no mutants in files matching these globs (repeatable).
    #[arg(long = "exclude", short = 'e')]
    pub exclude_globs: Vec<String>,

    /// Maximum number of mutants to select.
    #[arg(long, short = 'l', default_value_t = 10)]
    pub limit: usize,

    /// Sampling policy for selecting mutants from the candidate pool.
    #[arg(long, value_enum, default_value = "uniform")]
    pub generator: GeneratorKind,

    /// Random seed; a fresh one is drawn (and logged) when not given.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments specific to `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub populate: PopulateArgs,

    /// Working directory for the backup/expected/actual mirrors.
    #[arg(long, default_value = "sentinel_tmp")]
    pub work_dir: Utf8PathBuf,

    /// Where to write the XML and HTML reports; when absent only the
    /// console summary is printed.
    #[arg(long, short = 'o')]
    pub output_dir: Option<Utf8PathBuf>,

    /// Shell command that builds the project.
    #[arg(long)]
    pub build_command: Option<String>,

    /// Shell command that runs the tests.
    #[arg(long)]
    pub test_command: Option<String>,

    /// Directory where the test command writes its result files.
    #[arg(long)]
    pub test_result_dir: Option<Utf8PathBuf>,

    /// Extensions of test result files (repeatable; default xml).
    #[arg(long = "test-result-extension")]
    pub test_result_extensions: Vec<String>,

    /// Time limit in seconds for the test command, or `auto` to derive
    /// one from the golden run. 0 disables the limit.
    #[arg(long, default_value = "auto")]
    pub timeout: String,

    /// Send SIGKILL this many seconds after a timeout's SIGTERM.
    /// 0 never escalates.
    #[arg(long, default_value_t = 60)]
    pub kill_after: u64,

    /// lcov-format coverage files; mutants on uncovered lines skip the
    /// build/test cycle (repeatable).
    #[arg(long = "coverage")]
    pub coverage_files: Vec<Utf8PathBuf>,
}

/// The test timeout policy for mutant trials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutSetting {
    /// `max(1, ceil(multiplier × golden elapsed))`.
    Auto,
    /// Wait forever.
    Never,
    /// A fixed limit.
    Fixed(Duration),
}

impl TimeoutSetting {
    pub fn parse(s: &str) -> Result<TimeoutSetting> {
        if s == "auto" {
            return Ok(TimeoutSetting::Auto);
        }
        match s.parse::<u64>() {
            Ok(0) => Ok(TimeoutSetting::Never),
            Ok(secs) => Ok(TimeoutSetting::Fixed(Duration::from_secs(secs))),
            Err(_) => Err(Error::config(format!(
                "invalid --timeout value {s:?}: expected seconds or \"auto\""
            ))
            .into()),
        }
    }
}

/// Resolved options for a whole run.
#[derive(Debug)]
pub struct Options {
    pub source_root: Utf8PathBuf,
    pub build_dir: Utf8PathBuf,
    pub work_dir: Utf8PathBuf,
    pub output_dir: Option<Utf8PathBuf>,
    pub scope: Scope,
    pub extensions: Vec<String>,
    pub examine_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub limit: usize,
    pub generator: GeneratorKind,
    pub seed: u64,
    pub build_command: String,
    pub test_command: String,
    pub test_result_dir: Utf8PathBuf,
    pub test_result_extensions: Vec<String>,
    pub timeout: TimeoutSetting,
    pub kill_after: Duration,
    pub timeout_multiplier: f64,
    pub coverage_files: Vec<Utf8PathBuf>,
}

impl Options {
    pub fn new(args: &RunArgs, config: &Config) -> Result<Options> {
        let populate = &args.populate;
        let source_root = crate::path::canonicalize(&populate.source_root)?;
        let build_dir = crate::path::canonicalize(&populate.build_dir)?;

        let build_command = args
            .build_command
            .clone()
            .or_else(|| config.build_command.clone())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::config("--build-command must not be empty"))?;
        let test_command = args
            .test_command
            .clone()
            .or_else(|| config.test_command.clone())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::config("--test-command must not be empty"))?;
        let test_result_dir = args
            .test_result_dir
            .clone()
            .ok_or_else(|| Error::config("--test-result-dir is required"))?;

        let seed = resolve_seed(populate.seed);
        Ok(Options {
            source_root,
            build_dir,
            work_dir: args.work_dir.clone(),
            output_dir: args.output_dir.clone(),
            scope: populate.scope,
            extensions: resolve_extensions(&populate.extensions, config),
            examine_globs: merge(&populate.examine_globs, &config.examine_globs),
            exclude_globs: merge(&populate.exclude_globs, &config.exclude_globs),
            limit: populate.limit,
            generator: populate.generator,
            seed,
            build_command,
            test_command,
            test_result_dir,
            test_result_extensions: args.test_result_extensions.clone(),
            timeout: TimeoutSetting::parse(&args.timeout)?,
            kill_after: Duration::from_secs(args.kill_after),
            timeout_multiplier: config.timeout_multiplier.unwrap_or(1.1),
            coverage_files: args.coverage_files.clone(),
        })
    }
}

/// Draw a seed when the user gave none, and always log it so the run
/// can be replayed.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    let seed = seed.unwrap_or_else(|| fastrand::u64(..));
    info!(seed, "random seed");
    seed
}

/// The command line wins entirely when it names any extension.
pub fn resolve_extensions(from_args: &[String], config: &Config) -> Vec<String> {
    if !from_args.is_empty() {
        return from_args.to_vec();
    }
    if let Some(from_config) = &config.extensions {
        if !from_config.is_empty() {
            return from_config.clone();
        }
    }
    DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_owned()).collect()
}

fn merge(from_args: &[String], from_config: &[String]) -> Vec<String> {
    let mut merged = from_args.to_vec();
    merged.extend(from_config.iter().cloned());
    merged
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn timeout_parsing() {
        assert_eq!(TimeoutSetting::parse("auto").unwrap(), TimeoutSetting::Auto);
        assert_eq!(TimeoutSetting::parse("0").unwrap(), TimeoutSetting::Never);
        assert_eq!(
            TimeoutSetting::parse("90").unwrap(),
            TimeoutSetting::Fixed(Duration::from_secs(90))
        );
        assert!(TimeoutSetting::parse("soon").is_err());
    }

    #[test]
    fn extensions_fall_back_to_defaults() {
        let config = Config::default();
        let exts = resolve_extensions(&[], &config);
        assert_eq!(exts, DEFAULT_EXTENSIONS);

        let cli = vec!["c".to_owned()];
        assert_eq!(resolve_extensions(&cli, &config), ["c"]);

        let config = Config {
            extensions: Some(vec!["cc".to_owned()]),
            ..Config::default()
        };
        assert_eq!(resolve_extensions(&[], &config), ["cc"]);
        assert_eq!(resolve_extensions(&cli, &config), ["c"]);
    }

    #[test]
    fn globs_merge_from_both_sources() {
        assert_eq!(
            merge(
                &["third_party".to_owned()],
                &["generated/**".to_owned()]
            ),
            ["third_party", "generated/**"]
        );
    }
}
