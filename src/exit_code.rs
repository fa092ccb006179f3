// Copyright 2020 - 2026 LG Electronics Inc.

//! Exit codes from sentinel.
//!
//! Per-mutant outcomes never influence the exit code: surviving mutants
//! are findings, not failures. Only problems running the tool itself do.

/// Everything worked.
pub const SUCCESS: i32 = 0;

/// The wrong arguments, a bad configuration, or a missing compilation
/// database.
///
/// (1 is also the value returned by Clap.)
pub const USAGE: i32 = 1;

/// A runtime failure: the golden build or test failed, or an I/O error.
pub const FAILURE: i32 = 2;
