// Copyright 2020 - 2026 LG Electronics Inc.

//! Handle ctrl-c and termination signals by setting a global atomic and
//! checking it from long-running operations.
//!
//! The supervised runner polls this flag between waits on its child; on
//! interruption it kills the child's process group and unwinds, so the
//! orchestrator's restore guard puts the source tree back before exit.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;
use crate::Result;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub fn install_handler() {
    ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst))
        .expect("install termination handler");
}

/// Return an error if the program was interrupted and should exit.
pub fn check_interrupted() -> Result<()> {
    if INTERRUPTED.load(Ordering::SeqCst) {
        Err(Error::Interrupted.into())
    } else {
        Ok(())
    }
}
