//! Window-system and screen-capture collaborators.
//!
//! Both shell out to configurable commands (by default `hyprctl` and `grim`)
//! so the sampler itself never depends on a particular compositor.

use std::{
    fs,
    io::ErrorKind,
    path::Path,
    process::{Command, Stdio},
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::utils::command::{substitute, wait_with_deadline};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Title recorded when the window system cannot be queried.
pub const UNKNOWN_TITLE: &str = "Unknown";

pub trait WindowProbe: Send + Sync {
    fn active_window_title(&self) -> Result<String>;
}

pub trait ScreenGrabber: Send + Sync {
    /// Write a full-screen image to `output`.
    fn capture_to(&self, output: &Path) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ActiveWindow {
    #[serde(default)]
    title: String,
}

/// Runs a command that prints the active window as JSON with a `title`
/// field. An empty body means no window has focus.
#[derive(Debug, Clone)]
pub struct CommandWindowProbe {
    argv: Vec<String>,
}

impl CommandWindowProbe {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl WindowProbe for CommandWindowProbe {
    fn active_window_title(&self) -> Result<String> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| anyhow!("window command is empty"))?;
        let output = Command::new(program)
            .args(args)
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn {program}"))?;
        if !output.status.success() {
            bail!("{program} exited with {}", output.status);
        }
        parse_active_window(&output.stdout)
    }
}

fn parse_active_window(stdout: &[u8]) -> Result<String> {
    let body = String::from_utf8_lossy(stdout);
    let body = body.trim();
    if body.is_empty() || body == "{}" || body.starts_with("Invalid") {
        return Ok(String::new());
    }
    let window: ActiveWindow =
        serde_json::from_str(body).context("failed to parse active window JSON")?;
    Ok(window.title)
}

/// Runs a screenshot command with `{output}` replaced by the target path.
/// A command still running at `timeout` is killed and its partial output
/// removed, so no writer outlives the capture cycle.
#[derive(Debug, Clone)]
pub struct CommandGrabber {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandGrabber {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }
}

impl ScreenGrabber for CommandGrabber {
    fn capture_to(&self, output: &Path) -> Result<()> {
        let argv = substitute(&self.argv, "{output}", output);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("screenshot command is empty"))?;
        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let Some(status) = wait_with_deadline(&mut child, self.timeout)? else {
            if let Err(err) = fs::remove_file(output) {
                if err.kind() != ErrorKind::NotFound {
                    log_warn!("failed to remove partial capture {}: {err}", output.display());
                }
            }
            bail!("{program} killed after {}ms", self.timeout.as_millis());
        };
        if !status.success() {
            bail!("{program} exited with {status}");
        }
        if !output.is_file() {
            bail!("{program} succeeded but wrote no file at {}", output.display());
        }
        Ok(())
    }
}
