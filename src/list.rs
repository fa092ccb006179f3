// Copyright 2020 - 2026 LG Electronics Inc.

//! Render a list of selected mutants for humans or machines.

use camino::Utf8Path;

use crate::mutant::Mutant;
use crate::Result;

/// One mutant per line, styled for the terminal; or a JSON array when
/// `json` is set.
pub fn list_mutants(mutants: &[Mutant], source_root: &Utf8Path, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(mutants)?)
    } else {
        let mut out = String::new();
        for mutant in mutants {
            out.push_str(&mutant.to_styled_string(source_root));
            out.push('\n');
        }
        Ok(out)
    }
}
