use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::pipeline::{IngestPipeline, ProcessOutcome};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Per-pass tally of [`drain_once`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub archived: usize,
    pub reconciled: usize,
    pub discarded: usize,
    pub missing: usize,
    pub failed: usize,
}

impl DrainReport {
    pub fn attempted(&self) -> usize {
        self.archived + self.reconciled + self.discarded + self.missing + self.failed
    }

    /// Whether any frame left the inbox.
    pub fn made_progress(&self) -> bool {
        self.archived + self.reconciled + self.discarded + self.missing > 0
    }
}

/// Process one snapshot of the inbox, oldest first. A failing frame is
/// logged and left for the next pass; it never blocks the rest.
pub async fn drain_once(
    pipeline: &IngestPipeline,
    cancel_token: &CancellationToken,
) -> DrainReport {
    let mut report = DrainReport::default();
    let frames = match pipeline.queue().dequeue_batch() {
        Ok(frames) => frames,
        Err(err) => {
            log_error!("failed to list inbox: {err:#}");
            return report;
        }
    };

    for frame in frames {
        if cancel_token.is_cancelled() {
            break;
        }
        match pipeline.process(&frame).await {
            Ok(ProcessOutcome::Archived { .. }) => report.archived += 1,
            Ok(ProcessOutcome::Reconciled { .. }) => report.reconciled += 1,
            Ok(ProcessOutcome::Discarded) => report.discarded += 1,
            Ok(ProcessOutcome::Missing) => report.missing += 1,
            Err(err) => {
                report.failed += 1;
                log_error!("Failed to process {}: {err:#}", frame.name);
            }
        }
    }

    report
}

/// Poll the inbox until cancelled. Sleeps `poll_interval` when the inbox is
/// empty or when a whole pass failed, so a stuck frame does not spin.
pub async fn drain_loop(
    pipeline: IngestPipeline,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    log_info!("Ingestion worker ready, watching inbox");

    while !cancel_token.is_cancelled() {
        let report = drain_once(&pipeline, &cancel_token).await;
        if report.attempted() > 0 {
            log_debug!("drain pass: {report:?}");
        }
        if report.made_progress() {
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = cancel_token.cancelled() => break,
        }
    }

    log_info!("ingestion worker shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Distance;
    use crate::db::Database;
    use crate::engines::{EmbeddingEngine, OcrEngine};
    use crate::queue::{FrameQueue, FsQueue};
    use crate::vector::{MemoryVectorStore, VectorStore};
    use anyhow::{bail, Result};
    use std::{fs, path::Path, sync::Arc};
    use tempfile::TempDir;

    struct WordOcr;

    impl OcrEngine for WordOcr {
        fn recognize(&self, image: &Path) -> Result<Vec<String>> {
            let name = image.file_name().unwrap().to_string_lossy().into_owned();
            if name.contains("corrupt") {
                bail!("cannot decode {name}");
            }
            Ok(vec![name])
        }
    }

    struct UnitEmbedder;

    impl EmbeddingEngine for UnitEmbedder {
        fn embed(&self, _image: &Path) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    fn setup() -> (TempDir, Arc<FsQueue>, Database, Arc<MemoryVectorStore>, IngestPipeline) {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(FsQueue::new(
            dir.path().join("inbox"),
            dir.path().join("archive"),
            "temp_capture.png",
            &["png".to_string()],
        ));
        queue.ensure_dirs().unwrap();
        let db = Database::new(dir.path().join("recall.sqlite3")).unwrap();
        let vectors = Arc::new(MemoryVectorStore::new());
        vectors.ensure_collection(3, Distance::Cosine).unwrap();
        let pipeline = IngestPipeline::new(
            queue.clone(),
            db.clone(),
            vectors.clone(),
            Arc::new(WordOcr),
            Arc::new(UnitEmbedder),
            3,
        );
        (dir, queue, db, vectors, pipeline)
    }

    #[tokio::test]
    async fn failing_frame_does_not_block_later_frames() {
        let (_dir, queue, db, vectors, pipeline) = setup();
        for name in [
            "2024-01-01_10-00-00.png",
            "2024-01-01_10-00-01-corrupt.png",
            "2024-01-01_10-00-02.png",
            "temp_capture.png",
        ] {
            fs::write(queue.inbox().join(name), b"frame").unwrap();
        }

        let report = drain_once(&pipeline, &CancellationToken::new()).await;
        assert_eq!(report.archived, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(db.count_screenshots().await.unwrap(), 2);
        assert_eq!(vectors.len(), 2);

        let pending: Vec<_> = queue
            .dequeue_batch()
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(pending, vec!["2024-01-01_10-00-01-corrupt.png"]);
        assert!(queue.inbox().join("temp_capture.png").exists());
    }

    #[tokio::test]
    async fn cancelled_pass_processes_nothing() {
        let (_dir, queue, _db, _vectors, pipeline) = setup();
        fs::write(queue.inbox().join("2024-01-01_10-00-00.png"), b"frame").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let report = drain_once(&pipeline, &token).await;
        assert_eq!(report.attempted(), 0);
        assert_eq!(queue.backlog().unwrap(), 1);
    }

    #[tokio::test]
    async fn loop_drains_and_stops_on_cancel() {
        let (_dir, queue, db, _vectors, pipeline) = setup();
        fs::write(queue.inbox().join("2024-01-01_10-00-00.png"), b"frame").unwrap();
        let token = CancellationToken::new();
        let handle = tokio::spawn(drain_loop(
            pipeline,
            Duration::from_millis(10),
            token.clone(),
        ));

        for _ in 0..200 {
            if queue.backlog().unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        token.cancel();
        handle.await.unwrap();

        assert_eq!(queue.backlog().unwrap(), 0);
        assert_eq!(db.count_screenshots().await.unwrap(), 1);
    }
}
