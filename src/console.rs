// Copyright 2020 - 2026 LG Electronics Inc.

//! Print messages and progress on the terminal.

use std::time::Instant;

use console::{style, StyledObject};
use indicatif::ProgressBar;

use crate::outcome::MutationState;

/// Top-level UI object: a spinner for the current activity plus plain
/// printed conclusions, so the output reads well both live and in CI
/// logs.
pub struct Console {
    show_spinners: bool,
}

impl Console {
    pub fn new() -> Console {
        Console {
            show_spinners: console::Term::stderr().is_term(),
        }
    }

    /// Start a spinner-backed activity like "build mutant 3/10".
    pub fn start_activity(&self, task: &str) -> Activity {
        let progress_bar = if self.show_spinners {
            let pb = ProgressBar::new_spinner();
            pb.set_message(task.to_owned());
            pb.enable_steady_tick(std::time::Duration::from_millis(120));
            pb
        } else {
            ProgressBar::hidden()
        };
        Activity {
            task: task.to_owned(),
            progress_bar,
            start_time: Instant::now(),
        }
    }

    pub fn message(&self, message: &str) {
        println!("{message}");
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}: {}", style("error").bold().red(), message);
    }
}

impl Default for Console {
    fn default() -> Self {
        Console::new()
    }
}

pub struct Activity {
    task: String,
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl Activity {
    pub fn set_phase(&mut self, phase: &str) {
        self.progress_bar
            .set_message(format!("{} ({})", self.task, phase));
    }

    /// Finish with a styled status and print a one-line conclusion.
    pub fn finish(self, status: StyledObject<&str>) {
        self.progress_bar.finish_and_clear();
        println!(
            "{} ... {} in {:.1}s",
            self.task,
            status,
            self.start_time.elapsed().as_secs_f64()
        );
    }

    /// Finish quietly (for activities whose conclusion is logged
    /// elsewhere).
    pub fn clear(self) {
        self.progress_bar.finish_and_clear();
    }
}

/// A styled string reflecting the moral value of this state: killing
/// mutants is good, missing them is the finding.
pub fn style_state(state: MutationState) -> StyledObject<&'static str> {
    match state {
        MutationState::Killed => style("KILLED").green(),
        MutationState::Survived => style("SURVIVED").red().bold(),
        MutationState::BuildFailure => style("BUILD_FAILURE").yellow(),
        MutationState::RuntimeError => style("RUNTIME_ERROR").yellow(),
        MutationState::Timeout => style("TIMEOUT").yellow(),
    }
}
