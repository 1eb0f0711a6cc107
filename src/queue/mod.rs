//! Handoff between the capture sampler and the ingestion pipeline.
//!
//! The producer stages a frame at [`FrameQueue::staging_path`] and publishes
//! it with [`FrameQueue::enqueue`]; the consumer drains with
//! [`FrameQueue::dequeue_batch`] and commits with [`FrameQueue::ack`].
//! A frame is visible to the consumer only after publish completes.

mod fs;

use std::path::{Path, PathBuf};

use anyhow::Result;

pub use fs::FsQueue;

/// A published frame. Identity is the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub name: String,
    pub path: PathBuf,
}

pub trait FrameQueue: Send + Sync {
    /// Reserved location the producer writes to before publishing. Never
    /// returned by `dequeue_batch`.
    fn staging_path(&self) -> PathBuf;

    /// Atomically publish the staged file under `name`.
    fn enqueue(&self, staged: &Path, name: &str) -> Result<Frame>;

    /// Pending frames in name order (chronological under the capture naming
    /// scheme).
    fn dequeue_batch(&self) -> Result<Vec<Frame>>;

    /// Whether the frame is still pending.
    fn contains(&self, frame: &Frame) -> bool;

    /// Where the frame lives once acknowledged.
    fn archive_path(&self, frame: &Frame) -> PathBuf;

    fn is_archived(&self, frame: &Frame) -> bool;

    /// Move the frame to the archive. This is the commit point.
    fn ack(&self, frame: &Frame) -> Result<PathBuf>;

    /// Drop the pending copy without archiving it.
    fn reject(&self, frame: &Frame) -> Result<()>;

    /// Number of pending frames.
    fn backlog(&self) -> Result<usize> {
        Ok(self.dequeue_batch()?.len())
    }
}
