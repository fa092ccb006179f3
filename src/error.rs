// Copyright 2020 - 2026 LG Electronics Inc.

//! The error taxonomy, and its mapping to process exit codes.
//!
//! Most call sites propagate `anyhow::Result` with context strings; the
//! variants here exist so the top level can tell configuration mistakes
//! (exit 1) apart from runtime failures (exit 2), and so tests can assert
//! on the kind of failure rather than on message text.

use camino::Utf8PathBuf;

use crate::exit_code;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing configuration: absent compilation database,
    /// invalid option value, nonexistent path.
    #[error("config error: {0}")]
    Config(String),

    /// A mutant's path resolves outside the configured source root.
    #[error("{path} is outside the source root {source_root}")]
    PathEscape {
        path: Utf8PathBuf,
        source_root: Utf8PathBuf,
    },

    /// The build command failed on the pristine source.
    #[error("build command failed on unmutated source")]
    GoldenBuildFail,

    /// The golden test run produced no passing tests, so there is no
    /// baseline to compare mutated runs against.
    #[error("expected test results contain no passing tests")]
    GoldenEmpty,

    /// A second supervised subprocess was started while one was active.
    #[error("another supervised command is already running")]
    ConcurrentRun,

    /// The process was interrupted by a signal; the source tree has been
    /// restored on the way out.
    #[error("interrupted")]
    Interrupted,
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Error {
        Error::Config(msg.into())
    }
}

/// Map any error chain to the process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::Config(_)) => exit_code::USAGE,
        Some(_) => exit_code::FAILURE,
        None => exit_code::FAILURE,
    }
}
