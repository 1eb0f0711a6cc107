use std::{path::Path, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use tokio::time::Instant;

use crate::capture::FRAME_NAME_FORMAT;
use crate::db::{models::screenshot::UNKNOWN_APP, Database, InsertOutcome, NewScreenshot};
use crate::engines::{join_fragments, EmbeddingEngine, OcrEngine};
use crate::queue::{Frame, FrameQueue};
use crate::vector::{PointPayload, VectorPoint, VectorStore};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The frame left the inbox before it could be processed.
    Missing,
    /// New record, vector entry and archive move.
    Archived { id: i64 },
    /// A record for this archive path already existed but the file was never
    /// archived; the vector entry was rewritten under the existing id and the
    /// file archived.
    Reconciled { id: i64 },
    /// The archive already holds this file; the inbox copy was deleted.
    Discarded,
}

/// Timestamp encoded in a frame name, if it follows the capture convention.
pub fn frame_timestamp(name: &str) -> Option<NaiveDateTime> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    NaiveDateTime::parse_from_str(stem, FRAME_NAME_FORMAT).ok()
}

pub struct IngestPipeline {
    queue: Arc<dyn FrameQueue>,
    db: Database,
    vectors: Arc<dyn VectorStore>,
    ocr: Arc<dyn OcrEngine>,
    embedder: Arc<dyn EmbeddingEngine>,
    vector_size: usize,
}

impl IngestPipeline {
    pub fn new(
        queue: Arc<dyn FrameQueue>,
        db: Database,
        vectors: Arc<dyn VectorStore>,
        ocr: Arc<dyn OcrEngine>,
        embedder: Arc<dyn EmbeddingEngine>,
        vector_size: usize,
    ) -> Self {
        Self {
            queue,
            db,
            vectors,
            ocr,
            embedder,
            vector_size,
        }
    }

    pub fn queue(&self) -> &Arc<dyn FrameQueue> {
        &self.queue
    }

    /// Enrich, persist and archive one frame.
    ///
    /// On error the frame stays in the inbox and is retried on a later poll.
    pub async fn process(&self, frame: &Frame) -> Result<ProcessOutcome> {
        if !self.queue.contains(frame) {
            log_debug!("{} vanished before processing", frame.name);
            return Ok(ProcessOutcome::Missing);
        }

        let started = Instant::now();
        let text = self.extract_text(frame).await?;
        let vector = self.embed(frame).await?;

        let filepath = self
            .queue
            .archive_path(frame)
            .to_string_lossy()
            .into_owned();
        let timestamp =
            frame_timestamp(&frame.name).unwrap_or_else(|| Local::now().naive_local());
        let record = NewScreenshot {
            filepath: filepath.clone(),
            timestamp,
            app_name: Some(UNKNOWN_APP.to_string()),
            window_title: None,
            ocr_text: text.clone(),
        };

        match self.db.insert_screenshot(&record).await? {
            InsertOutcome::Inserted(id) => {
                self.upsert_vector(id, vector, text, &frame.name).await?;
                self.queue.ack(frame)?;
                log_info!(
                    "Processed: {} (id {id}, {}ms)",
                    frame.name,
                    started.elapsed().as_millis()
                );
                Ok(ProcessOutcome::Archived { id })
            }
            InsertOutcome::DuplicateFilepath => {
                self.resolve_duplicate(frame, &filepath, vector).await
            }
        }
    }

    async fn resolve_duplicate(
        &self,
        frame: &Frame,
        filepath: &str,
        vector: Vec<f32>,
    ) -> Result<ProcessOutcome> {
        if self.queue.is_archived(frame) {
            log_warn!("Duplicate detected. Deleting duplicate file: {}", frame.name);
            self.queue.reject(frame)?;
            return Ok(ProcessOutcome::Discarded);
        }

        let existing = self
            .db
            .find_screenshot_by_filepath(filepath)
            .await?
            .ok_or_else(|| anyhow!("record for {filepath} disappeared after duplicate insert"))?;
        let text = existing.ocr_text.clone().unwrap_or_default();
        self.upsert_vector(existing.id, vector, text, &frame.name)
            .await?;
        self.queue.ack(frame)?;
        log_warn!(
            "Reconciled {} with existing record {} left by an interrupted run",
            frame.name,
            existing.id
        );
        Ok(ProcessOutcome::Reconciled { id: existing.id })
    }

    async fn extract_text(&self, frame: &Frame) -> Result<String> {
        let ocr = Arc::clone(&self.ocr);
        let path = frame.path.clone();
        let fragments = tokio::task::spawn_blocking(move || ocr.recognize(&path))
            .await
            .context("OCR worker join failed")?
            .with_context(|| format!("OCR failed for {}", frame.name))?;
        Ok(join_fragments(&fragments))
    }

    async fn embed(&self, frame: &Frame) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let path = frame.path.clone();
        let vector = tokio::task::spawn_blocking(move || embedder.embed(&path))
            .await
            .context("embedding worker join failed")?
            .with_context(|| format!("embedding failed for {}", frame.name))?;
        if vector.len() != self.vector_size {
            bail!(
                "embedding for {} has dimension {}, expected {}",
                frame.name,
                vector.len(),
                self.vector_size
            );
        }
        Ok(vector)
    }

    async fn upsert_vector(
        &self,
        id: i64,
        vector: Vec<f32>,
        text: String,
        name: &str,
    ) -> Result<()> {
        let point = VectorPoint {
            id: u64::try_from(id).map_err(|_| anyhow!("record id {id} is negative"))?,
            vector,
            payload: PointPayload {
                text,
                path: name.to_string(),
            },
        };
        let vectors = Arc::clone(&self.vectors);
        tokio::task::spawn_blocking(move || vectors.upsert(&point))
            .await
            .context("vector store worker join failed")?
            .with_context(|| format!("failed to index {name}"))
    }
}
