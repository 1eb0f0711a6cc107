use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// Presence-based capture switch. Only the marker's existence matters.
#[derive(Debug, Clone)]
pub struct PauseGate {
    marker: PathBuf,
}

impl PauseGate {
    pub fn new(marker: PathBuf) -> Self {
        Self { marker }
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    pub fn is_paused(&self) -> bool {
        self.marker.exists()
    }

    pub fn pause(&self) -> Result<()> {
        if let Some(parent) = self.marker.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&self.marker, "paused")
            .with_context(|| format!("failed to write pause marker {}", self.marker.display()))
    }

    pub fn resume(&self) -> Result<()> {
        match fs::remove_file(&self.marker) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove pause marker {}", self.marker.display())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pause_and_resume_toggle_marker() {
        let dir = TempDir::new().unwrap();
        let gate = PauseGate::new(dir.path().join("state").join("recall.pause"));
        assert!(!gate.is_paused());

        gate.pause().unwrap();
        assert!(gate.is_paused());

        gate.resume().unwrap();
        assert!(!gate.is_paused());
        gate.resume().unwrap();
    }

    #[test]
    fn marker_content_is_ignored() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("recall.pause");
        fs::write(&marker, "").unwrap();
        assert!(PauseGate::new(marker).is_paused());
    }
}
