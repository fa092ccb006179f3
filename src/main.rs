// Copyright 2020 - 2026 LG Electronics Inc.

//! `sentinel`: mutation testing for C/C++ projects.
//!
//! Inject small syntactic faults into a source tree, rebuild and retest
//! each one, and report where the test suite is blind.

mod aggregate;
mod ast;
mod config;
mod console;
mod coverage;
mod error;
mod exit_code;
mod glob;
mod interrupt;
mod lab;
mod list;
mod log_file;
mod mutant;
mod mutate;
mod operators;
mod options;
mod outcome;
mod path;
mod process;
mod report;
mod sample;
mod span;
mod test_results;
mod vcs;
mod visit;
mod work_dir;

use std::fs;
use std::process::exit;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::aggregate::Aggregate;
use crate::ast::CompilationDb;
use crate::config::Config;
use crate::console::{style_state, Console};
use crate::error::exit_code_for;
use crate::mutant::Mutant;
use crate::options::{Options, PopulateArgs, RunArgs};
use crate::outcome::{Evaluator, TrialState};
use crate::vcs::GitRepository;

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;

#[derive(Parser, Debug)]
#[command(name = "sentinel", version, about, max_term_width = 100)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log debug detail to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate and select mutants, writing them to a file.
    Populate(PopulateCmd),
    /// Apply one serialized mutant to the source tree, backing the
    /// original up under the work dir.
    Mutate(MutateCmd),
    /// Classify one mutant from expected and actual test results.
    Evaluate(EvaluateCmd),
    /// Render XML and HTML reports from an evaluation log.
    Report(ReportCmd),
    /// End to end: populate, trial every mutant, aggregate and report.
    Run(RunCmd),
}

#[derive(clap::Args, Debug)]
struct PopulateCmd {
    #[command(flatten)]
    populate: PopulateArgs,

    /// File to write the selected mutants to.
    #[arg(long, short = 'o', default_value = "mutants.db")]
    output: Utf8PathBuf,

    /// Print the selection as JSON instead of styled lines.
    #[arg(long)]
    json: bool,
}

/// Ways of naming one mutant: inline, or by index into a mutant list
/// written by `populate`.
#[derive(clap::Args, Debug)]
struct MutantSelection {
    /// The mutant itself, in the serialized one-line form.
    #[arg(long, conflicts_with_all = ["mutants_file", "index"])]
    mutant: Option<String>,

    /// A mutant list written by `populate`.
    #[arg(long, requires = "index")]
    mutants_file: Option<Utf8PathBuf>,

    /// Zero-based index into the mutants file.
    #[arg(long)]
    index: Option<usize>,
}

impl MutantSelection {
    fn resolve(&self) -> Result<Mutant> {
        if let Some(serialized) = &self.mutant {
            return parse_mutant_arg(serialized);
        }
        if let (Some(file), Some(index)) = (&self.mutants_file, self.index) {
            let mutants = mutant::load_mutants(file)?;
            return mutants.get(index).cloned().ok_or_else(|| {
                crate::error::Error::config(format!(
                    "index {index} is out of range; {file} holds {} mutants",
                    mutants.len()
                ))
                .into()
            });
        }
        Err(crate::error::Error::config(
            "give --mutant, or --mutants-file together with --index",
        )
        .into())
    }
}

#[derive(clap::Args, Debug)]
struct MutateCmd {
    #[command(flatten)]
    selection: MutantSelection,

    /// Root of the source tree to mutate.
    #[arg(long, default_value = ".")]
    source_root: Utf8PathBuf,

    /// Work dir; the backup lands in its backup/ subdirectory.
    #[arg(long, default_value = "sentinel_tmp")]
    work_dir: Utf8PathBuf,
}

#[derive(clap::Args, Debug)]
struct EvaluateCmd {
    #[command(flatten)]
    selection: MutantSelection,

    /// Directory of golden test results.
    #[arg(long)]
    expected: Utf8PathBuf,

    /// Directory of post-mutation test results.
    #[arg(long)]
    actual: Utf8PathBuf,

    /// What the build/test cycle observed.
    #[arg(long, value_enum, default_value = "success")]
    test_state: TrialState,

    /// Extensions of test result files (repeatable; default xml).
    #[arg(long = "test-result-extension")]
    test_result_extensions: Vec<String>,

    /// Evaluation log to append the result to.
    #[arg(long, short = 'o', default_value = "evaluation")]
    output: Utf8PathBuf,
}

#[derive(clap::Args, Debug)]
struct ReportCmd {
    /// Evaluation log produced by `evaluate` or `run`.
    #[arg(long)]
    evaluation_file: Utf8PathBuf,

    /// Root of the source tree the log refers to.
    #[arg(long, default_value = ".")]
    source_root: Utf8PathBuf,

    /// Where to write mutations.xml and the HTML pages; when absent
    /// only the console summary is printed.
    #[arg(long, short = 'o')]
    output_dir: Option<Utf8PathBuf>,
}

#[derive(clap::Args, Debug)]
struct RunCmd {
    #[command(flatten)]
    run: RunArgs,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);
    interrupt::install_handler();
    let console = Console::new();
    match dispatch(&args, &console) {
        Ok(()) => exit(exit_code::SUCCESS),
        Err(err) => {
            console.error(&format!("{err:#}"));
            exit(exit_code_for(&err));
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let default_filter = if verbose { "sentinel=debug" } else { "sentinel=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(args: &Args, console: &Console) -> Result<()> {
    match &args.command {
        Command::Populate(cmd) => populate(cmd, console),
        Command::Mutate(cmd) => mutate_one(cmd, console),
        Command::Evaluate(cmd) => evaluate_one(cmd, console),
        Command::Report(cmd) => render_report(cmd, console),
        Command::Run(cmd) => run(cmd, console),
    }
}

fn populate(cmd: &PopulateCmd, console: &Console) -> Result<()> {
    let source_root = path::canonicalize(&cmd.populate.source_root)?;
    let config = Config::read_tree_config(&source_root)?;
    let seed = options::resolve_seed(cmd.populate.seed);
    let selected = populate_from_args(&cmd.populate, &source_root, &config, seed)?;
    mutant::save_mutants(&selected, &cmd.output)?;
    let listing = list::list_mutants(&selected, &source_root, cmd.json)?;
    if cmd.json {
        println!("{listing}");
    } else {
        print!("{listing}");
        console.message(&format!(
            "wrote {} mutants to {}",
            selected.len(),
            cmd.output
        ));
    }
    Ok(())
}

/// The populate pipeline shared by the `populate` command; `run` goes
/// through [lab::run_lab], which repeats it with its own options.
fn populate_from_args(
    args: &PopulateArgs,
    source_root: &camino::Utf8Path,
    config: &Config,
    seed: u64,
) -> Result<Vec<Mutant>> {
    let extensions = options::resolve_extensions(&args.extensions, config);
    let mut examine = args.examine_globs.clone();
    examine.extend(config.examine_globs.iter().cloned());
    let mut excludes = args.exclude_globs.clone();
    excludes.extend(config.exclude_globs.iter().cloned());

    let repo = GitRepository::open(source_root, &extensions, &examine, &excludes)?;
    let mut source_lines = repo.source_lines(args.scope)?;
    fastrand::Rng::with_seed(seed).shuffle(&mut source_lines);

    let build_dir = path::canonicalize(&args.build_dir)?;
    let db = CompilationDb::load(&build_dir)?;
    let discovered = visit::walk_tree(&db, &source_lines)?;
    Ok(sample::sample(
        args.generator,
        &discovered.mutants,
        &source_lines,
        &discovered.line_depths,
        args.limit,
        seed,
    ))
}

fn mutate_one(cmd: &MutateCmd, console: &Console) -> Result<()> {
    let mutant = cmd.selection.resolve()?;
    let source_root = path::canonicalize(&cmd.source_root)?;
    let backup = cmd.work_dir.join("backup");
    fs::create_dir_all(&backup)
        .map_err(|err| anyhow::anyhow!("create {backup:?}: {err}"))?;
    mutate::apply(&mutant, &source_root, &backup)?;
    console.message(&format!("applied {}", mutant.name(&source_root)));
    Ok(())
}

fn evaluate_one(cmd: &EvaluateCmd, console: &Console) -> Result<()> {
    let mutant = cmd.selection.resolve()?;
    let mut evaluator = Evaluator::new(&cmd.expected, &cmd.test_result_extensions)?;
    let result = evaluator.evaluate(&mutant, &cmd.actual, cmd.test_state)?;
    outcome::append_result(result, &cmd.output)?;
    console.message(&format!(
        "{} ... {}",
        result.mutant.name(camino::Utf8Path::new("/")),
        style_state(result.state)
    ));
    Ok(())
}

fn render_report(cmd: &ReportCmd, _console: &Console) -> Result<()> {
    let results = outcome::load_results(&cmd.evaluation_file)?;
    let source_root = path::canonicalize(&cmd.source_root)?;
    let aggregate = Aggregate::new(&results, &source_root);
    if let Some(output_dir) = &cmd.output_dir {
        report::write_xml_report(&results, &source_root, output_dir)?;
        report::write_html_report(&results, &aggregate, &source_root, output_dir)?;
    }
    report::print_summary(&aggregate, &source_root);
    Ok(())
}

/// A malformed `--mutant` string is an argument mistake, not a runtime
/// failure.
fn parse_mutant_arg(arg: &str) -> Result<Mutant> {
    arg.parse()
        .map_err(|err| crate::error::Error::config(format!("bad --mutant value: {err}")).into())
}

fn run(cmd: &RunCmd, console: &Console) -> Result<()> {
    let source_root = path::canonicalize(&cmd.run.populate.source_root)?;
    let config = Config::read_tree_config(&source_root)?;
    let options = Options::new(&cmd.run, &config)?;
    let results = lab::run_lab(&options, console)?;
    let aggregate = Aggregate::new(&results, &options.source_root);
    if let Some(output_dir) = &options.output_dir {
        report::write_xml_report(&results, &options.source_root, output_dir)?;
        report::write_html_report(&results, &aggregate, &options.source_root, output_dir)?;
        let evaluation = output_dir.join("evaluation");
        if evaluation.exists() {
            fs::remove_file(&evaluation)
                .map_err(|err| anyhow::anyhow!("remove stale {evaluation:?}: {err}"))?;
        }
        for result in &results {
            outcome::append_result(result, &evaluation)?;
        }
    }
    report::print_summary(&aggregate, &options.source_root);
    Ok(())
}
