// Copyright 2020 - 2026 LG Electronics Inc.

//! Run the build and test commands as supervised subprocesses, with a
//! timeout, a kill-after escalation, and interrupt forwarding.
//!
//! This module sits above the external `subprocess` crate and has no
//! knowledge of what the commands do. On Unix the child runs in its own
//! process group so grandchildren (test binaries spawned by the test
//! driver) are signalled together with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use camino::Utf8Path;
use subprocess::{ExitStatus, Popen, PopenConfig, Redirection};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::interrupt::check_interrupted;
use crate::log_file::LogFile;
use crate::Result;

/// How frequently to check whether the child finished.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for helper commands like `git ls-files`.
const HELPER_TIMEOUT: Duration = Duration::from_secs(20);

/// Set while a supervised run is active: only one child may be alive
/// under core control at any time.
static RUN_ACTIVE: AtomicBool = AtomicBool::new(false);

struct RunGuard;

impl RunGuard {
    fn acquire() -> Result<RunGuard> {
        if RUN_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(Error::ConcurrentRun.into());
        }
        Ok(RunGuard)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUN_ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// The observable result of one supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// The child's raw exit status, distinguishing exit codes from
    /// termination by signal.
    pub status: ExitStatus,
    /// The run hit its timeout and the child group was signalled.
    pub timed_out: bool,
}

impl RunResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }
}

/// Run one shell command under supervision.
///
/// The command executes via `/bin/sh -c` in `cwd`, with stdout and
/// stderr appended to `log_file`. A `timeout` of `None` waits for
/// natural exit. On expiry the child's process group receives SIGTERM;
/// if it is still alive `kill_after` later it receives SIGKILL
/// (`kill_after` of zero never escalates).
///
/// An interrupt observed while waiting kills the child group and
/// propagates [Error::Interrupted], so callers' restore guards unwind.
pub fn run_command(
    command: &str,
    cwd: &Utf8Path,
    timeout: Option<Duration>,
    kill_after: Duration,
    log_file: &mut LogFile,
) -> Result<RunResult> {
    let _guard = RunGuard::acquire()?;
    let start = Instant::now();
    log_file.message(&format!("run {command}"));
    debug!(%command, %cwd, ?timeout, "start supervised command");
    let mut child = Popen::create(
        &["/bin/sh", "-c", command],
        PopenConfig {
            stdin: Redirection::None,
            stdout: Redirection::File(log_file.open_append()?),
            stderr: Redirection::Merge,
            cwd: Some(cwd.as_os_str().to_owned()),
            ..setpgid_on_unix()
        },
    )
    .with_context(|| format!("failed to spawn {command:?}"))?;

    let mut timed_out = false;
    let mut termed_at: Option<Instant> = None;
    let mut killed = false;
    let status = loop {
        if let Some(status) = child
            .wait_timeout(WAIT_POLL_INTERVAL)
            .context("wait for child")?
        {
            break status;
        }
        if let Err(e) = check_interrupted() {
            log_file.message("interrupted; killing child process group");
            warn!("interrupted, killing child process group");
            signal_group(&mut child, TermSignal::Kill)?;
            let _ = child.wait_timeout(Duration::from_secs(10));
            return Err(e);
        }
        match termed_at {
            None => {
                if let Some(timeout) = timeout {
                    if start.elapsed() > timeout {
                        info!(
                            "timeout after {:.1}s, terminating child process group",
                            start.elapsed().as_secs_f32()
                        );
                        log_file.message("timeout; sending SIGTERM to child process group");
                        timed_out = true;
                        termed_at = Some(Instant::now());
                        signal_group(&mut child, TermSignal::Term)?;
                    }
                }
            }
            Some(when) => {
                if !killed && !kill_after.is_zero() && when.elapsed() > kill_after {
                    warn!(
                        "child survived SIGTERM for {}; sending SIGKILL",
                        humantime::format_duration(kill_after)
                    );
                    log_file.message("kill-after expired; sending SIGKILL to child process group");
                    killed = true;
                    signal_group(&mut child, TermSignal::Kill)?;
                }
            }
        }
    };
    log_file.message(&format!(
        "result: {:?} in {:.3}s",
        status,
        start.elapsed().as_secs_f64()
    ));
    debug!(?status, timed_out, "supervised command finished");
    Ok(RunResult { status, timed_out })
}

enum TermSignal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &mut Popen, signal: TermSignal) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.pid() else {
        return Ok(()); // already reaped
    };
    let pid = Pid::from_raw(i32::try_from(pid).context("pid out of range")?);
    let signal = match signal {
        TermSignal::Term => Signal::SIGTERM,
        TermSignal::Kill => Signal::SIGKILL,
    };
    match killpg(pid, signal) {
        Ok(()) => Ok(()),
        // We may have raced with a normal exit.
        Err(Errno::ESRCH) => Ok(()),
        Err(errno) => {
            let message = format!("failed to signal child process group: {errno}");
            warn!("{}", message);
            Err(anyhow!(message))
        }
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Popen, _signal: TermSignal) -> Result<()> {
    // No process groups; terminate just the immediate child.
    let _ = child.terminate();
    Ok(())
}

#[cfg(unix)]
fn setpgid_on_unix() -> PopenConfig {
    PopenConfig {
        setpgid: true,
        ..Default::default()
    }
}

#[cfg(not(unix))]
fn setpgid_on_unix() -> PopenConfig {
    Default::default()
}

/// Run a helper command and return its stdout as a string.
///
/// If the command exits non-zero the error includes anything it wrote to
/// stderr. The runtime is capped by [HELPER_TIMEOUT]. This does not
/// count as a supervised run: it is for quick metadata commands like
/// `git ls-files`.
pub fn get_command_output(argv: &[&str], cwd: &Utf8Path) -> Result<String> {
    use std::io::Read;

    debug!(?argv, "get_command_output");
    let mut child = Popen::create(
        argv,
        PopenConfig {
            stdin: Redirection::None,
            stdout: Redirection::Pipe,
            stderr: Redirection::Pipe,
            cwd: Some(cwd.as_os_str().to_owned()),
            ..Default::default()
        },
    )
    .with_context(|| format!("failed to spawn {argv:?}"))?;
    match child.wait_timeout(HELPER_TIMEOUT) {
        Err(e) => return Err(anyhow!("failed to wait for {argv:?}: {e}")),
        Ok(None) => {
            let _ = child.kill();
            return Err(anyhow!("{argv:?} timed out"));
        }
        Ok(Some(status)) if status.success() => {}
        Ok(Some(status)) => {
            let mut stderr = String::new();
            if let Some(mut f) = child.stderr.take() {
                let _ = f.read_to_string(&mut stderr);
            }
            return Err(anyhow!("{argv:?} failed with status {status:?}: {stderr}"));
        }
    }
    let mut stdout = String::new();
    child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("child has no stdout"))?
        .read_to_string(&mut stdout)
        .context("failed to read child stdout")?;
    Ok(stdout)
}
