// Copyright 2020 - 2026 LG Electronics Inc.

//! `.sentinel.toml` configuration file.
//!
//! The config file is read after parsing command line arguments, because
//! the arguments determine the source root where it lives. Command line
//! options take precedence over the file.

use std::fs::read_to_string;
use std::str::FromStr;

use anyhow::Context;
use camino::Utf8Path;
use serde::Deserialize;

use crate::Result;

/// Configuration read from a config file.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Generate mutants only in files matching these globs.
    pub examine_globs: Vec<String>,
    /// Generate no mutants in files matching these globs.
    pub exclude_globs: Vec<String>,
    /// Source file extensions eligible for mutation.
    pub extensions: Option<Vec<String>>,
    /// Scale the automatic test timeout derived from the golden run.
    pub timeout_multiplier: Option<f64>,
    /// Default build command, overridden by `--build-command`.
    pub build_command: Option<String>,
    /// Default test command, overridden by `--test-command`.
    pub test_command: Option<String>,
}

impl Config {
    pub fn read_file(path: &Utf8Path) -> Result<Config> {
        let toml = read_to_string(path).with_context(|| format!("read config {path:?}"))?;
        Config::from_str(&toml).with_context(|| format!("parse toml from {path:?}"))
    }

    /// Read the config from a source root's `.sentinel.toml`, returning a
    /// default (empty) Config if the file does not exist.
    pub fn read_tree_config(source_root: &Utf8Path) -> Result<Config> {
        let path = source_root.join(".sentinel.toml");
        if path.exists() {
            Config::read_file(&path)
        } else {
            Ok(Config::default())
        }
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Config> {
        toml::de::from_str(s).context("parse toml")
    }
}
