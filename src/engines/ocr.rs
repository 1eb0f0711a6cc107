use std::{
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{anyhow, bail, Context, Result};

use crate::utils::command::substitute;

use super::OcrEngine;

/// Runs an OCR command (tesseract by default) that prints recognised text
/// to stdout. Each non-blank output line is one fragment.
#[derive(Debug, Clone)]
pub struct CommandOcr {
    argv: Vec<String>,
}

impl CommandOcr {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl OcrEngine for CommandOcr {
    fn recognize(&self, image: &Path) -> Result<Vec<String>> {
        let argv = substitute(&self.argv, "{image}", image);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("OCR command is empty"))?;
        let output = Command::new(program)
            .args(args)
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn {program}"))?;
        if !output.status.success() {
            bail!("{program} exited with {}", output.status);
        }
        Ok(fragments(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn fragments(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_output_into_fragments() {
        // tesseract ends its output with a form feed
        assert_eq!(fragments("cpu\n\n  usage  \n\x0c"), vec!["cpu", "usage"]);
        assert!(fragments("").is_empty());
    }

    #[test]
    fn reads_stdout_of_configured_command() {
        let dir = tempfile::TempDir::new().unwrap();
        let image = dir.path().join("frame.png");
        std::fs::write(&image, "cpu\nusage\n").unwrap();

        // `cat` stands in for an OCR binary that echoes recognised lines.
        let ocr = CommandOcr::new(vec!["cat".into(), "{image}".into()]);
        assert_eq!(ocr.recognize(&image).unwrap(), vec!["cpu", "usage"]);
    }

    #[test]
    fn failing_command_is_an_error() {
        let ocr = CommandOcr::new(vec!["false".into()]);
        assert!(ocr.recognize(Path::new("/nonexistent.png")).is_err());
    }
}
