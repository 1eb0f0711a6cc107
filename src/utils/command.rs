use std::{
    path::Path,
    process::{Child, ExitStatus},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Replace `placeholder` in each argument; append the path when no argument
/// mentions it.
pub fn substitute(argv: &[String], placeholder: &str, path: &Path) -> Vec<String> {
    let path = path.to_string_lossy();
    let mut found = false;
    let mut out: Vec<String> = argv
        .iter()
        .map(|arg| {
            if arg.contains(placeholder) {
                found = true;
                arg.replace(placeholder, &path)
            } else {
                arg.clone()
            }
        })
        .collect();
    if !found {
        out.push(path.into_owned());
    }
    out
}

/// Wait for `child` to exit. Once `timeout` has elapsed the child is killed
/// and reaped, and `None` is returned.
pub fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().context("failed to poll child process")? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            if let Err(err) = child.kill() {
                // InvalidInput: the child exited between the poll and the kill.
                if err.kind() != std::io::ErrorKind::InvalidInput {
                    return Err(err).context("failed to kill child process");
                }
            }
            child.wait().context("failed to reap killed child process")?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
