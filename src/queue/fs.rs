use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use super::{Frame, FrameQueue};

/// Local-disk queue: `inbox/` holds pending frames, `archive/` committed
/// ones. The staging file lives inside the inbox so publish is a
/// same-filesystem rename.
#[derive(Debug, Clone)]
pub struct FsQueue {
    inbox: PathBuf,
    archive: PathBuf,
    temp_filename: String,
    extensions: Vec<String>,
}

impl FsQueue {
    pub fn new(
        inbox: PathBuf,
        archive: PathBuf,
        temp_filename: impl Into<String>,
        extensions: &[String],
    ) -> Self {
        Self {
            inbox,
            archive,
            temp_filename: temp_filename.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    /// Create the inbox and archive directories if needed.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.inbox, &self.archive] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    fn is_candidate(&self, name: &str) -> bool {
        if name == self.temp_filename || name.starts_with("temp_") || name.starts_with('.') {
            return false;
        }
        let Some((_, ext)) = name.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|allowed| *allowed == ext)
    }

    fn frame(&self, name: &str) -> Frame {
        Frame {
            name: name.to_string(),
            path: self.inbox.join(name),
        }
    }
}

impl FrameQueue for FsQueue {
    fn staging_path(&self) -> PathBuf {
        self.inbox.join(&self.temp_filename)
    }

    fn enqueue(&self, staged: &Path, name: &str) -> Result<Frame> {
        if !self.is_candidate(name) {
            bail!("refusing to publish frame under reserved or unsupported name '{name}'");
        }
        let frame = self.frame(name);
        if frame.path.exists() {
            bail!("frame {} already pending", frame.name);
        }
        fs::rename(staged, &frame.path).with_context(|| {
            format!(
                "failed to publish {} as {}",
                staged.display(),
                frame.path.display()
            )
        })?;
        Ok(frame)
    }

    fn dequeue_batch(&self) -> Result<Vec<Frame>> {
        let entries = fs::read_dir(&self.inbox)
            .with_context(|| format!("failed to list inbox {}", self.inbox.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.context("failed to read inbox entry")?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if self.is_candidate(&name) {
                names.push(name);
            }
        }
        names.sort();

        Ok(names.iter().map(|name| self.frame(name)).collect())
    }

    fn contains(&self, frame: &Frame) -> bool {
        frame.path.is_file()
    }

    fn archive_path(&self, frame: &Frame) -> PathBuf {
        self.archive.join(&frame.name)
    }

    fn is_archived(&self, frame: &Frame) -> bool {
        self.archive_path(frame).is_file()
    }

    fn ack(&self, frame: &Frame) -> Result<PathBuf> {
        let dest = self.archive_path(frame);
        fs::rename(&frame.path, &dest).with_context(|| {
            format!("failed to archive {} to {}", frame.name, dest.display())
        })?;
        Ok(dest)
    }

    fn reject(&self, frame: &Frame) -> Result<()> {
        match fs::remove_file(&frame.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to delete {}", frame.path.display()))
            }
        }
    }
}
