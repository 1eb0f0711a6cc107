//! Startup wait for the relational and vector stores.
//!
//! Either store may come up after the ingestion process, so every failure is
//! retried after a fixed delay for as long as it takes.

use std::{future::Future, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::VectorSettings;
use crate::db::Database;
use crate::vector::VectorStore;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Retry `op` until it succeeds. Returns `None` only when cancelled.
pub async fn wait_for<T, F, Fut>(
    label: &str,
    delay: Duration,
    cancel_token: &CancellationToken,
    mut op: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                log_info!("Connected to {label}");
                return Some(value);
            }
            Err(err) => log_warn!("Waiting for {label} (attempt {attempt}): {err:#}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_token.cancelled() => return None,
        }
    }
}

/// Open the database and run migrations, retrying until it works.
pub async fn connect_database(
    path: PathBuf,
    delay: Duration,
    cancel_token: &CancellationToken,
) -> Option<Database> {
    wait_for("database", delay, cancel_token, || {
        let path = path.clone();
        async move {
            tokio::task::spawn_blocking(move || Database::new(path))
                .await
                .context("database open worker join failed")?
        }
    })
    .await
}

/// Make sure the target collection exists with the configured dimension and
/// metric, retrying until the vector store answers.
pub async fn prepare_collection(
    store: Arc<dyn VectorStore>,
    settings: &VectorSettings,
    delay: Duration,
    cancel_token: &CancellationToken,
) -> Option<()> {
    let size = settings.size;
    let distance = settings.distance;
    let label = format!("vector store (collection '{}')", settings.collection);
    wait_for(&label, delay, cancel_token, || {
        let store = Arc::clone(&store);
        async move {
            tokio::task::spawn_blocking(move || store.ensure_collection(size, distance))
                .await
                .context("vector store worker join failed")?
        }
    })
    .await
}
