pub mod bootstrap;
pub mod capture;
pub mod cli;
pub mod config;
pub mod db;
pub mod engines;
pub mod ingest;
pub mod queue;
pub mod utils;
pub mod vector;

use std::{future::Future, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use capture::{capture_loop, CaptureSampler, CommandGrabber, CommandWindowProbe, PauseGate};
use cli::{Cli, Commands};
use config::Config;
use engines::{CommandOcr, HttpEmbedder};
use ingest::{drain_loop, IngestPipeline};
use queue::{FrameQueue, FsQueue};
use vector::{QdrantStore, VectorStore};

const ENABLE_LOGS: bool = true;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    utils::logging::init(cli.verbose);

    let config = Config::load(&cli.config)?;
    log_debug!("Loaded config from {}", cli.config.display());

    match cli.command {
        Commands::Capture => run_until_interrupted(|token| run_capture(config, token)),
        Commands::Ingest => run_until_interrupted(|token| run_ingest(config, token)),
        Commands::Pause => {
            let gate = PauseGate::new(config.pause_marker());
            gate.pause()?;
            println!("Capture paused ({})", gate.marker().display());
            Ok(())
        }
        Commands::Resume => {
            PauseGate::new(config.pause_marker()).resume()?;
            println!("Capture resumed");
            Ok(())
        }
        Commands::Status => print_status(&config),
    }
}

/// Drive `task` on a fresh multi-threaded runtime; Ctrl-C cancels the token
/// handed to it.
fn run_until_interrupted<F, Fut>(task: F) -> Result<()>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let token = CancellationToken::new();
        let signal_token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => log_info!("Interrupt received, finishing current work"),
                Err(err) => log_error!("failed to listen for Ctrl-C: {err}"),
            }
            signal_token.cancel();
        });
        task(token).await
    })
}

fn frame_queue(config: &Config) -> FsQueue {
    FsQueue::new(
        config.inbox_dir(),
        config.archive_dir(),
        config.capture.temp_filename.as_str(),
        &config.ingest.extensions,
    )
}

async fn run_capture(config: Config, cancel_token: CancellationToken) -> Result<()> {
    let queue = Arc::new(frame_queue(&config));
    queue.ensure_dirs()?;

    let ext = config.capture.image_extension.to_ascii_lowercase();
    if !config
        .ingest
        .extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    {
        log_warn!("capture.image_extension '{ext}' is not in ingest.extensions; frames will not be ingested");
    }

    let sampler = CaptureSampler::new(
        config.capture.clone(),
        Arc::new(CommandWindowProbe::new(config.capture.window_command.clone())),
        Arc::new(CommandGrabber::new(
            config.capture.screenshot_command.clone(),
            Duration::from_secs(config.capture.command_timeout_secs),
        )),
        queue,
        PauseGate::new(config.pause_marker()),
    );
    capture_loop(sampler, cancel_token).await;
    Ok(())
}

async fn run_ingest(config: Config, cancel_token: CancellationToken) -> Result<()> {
    let queue = Arc::new(frame_queue(&config));
    queue.ensure_dirs()?;

    let retry = Duration::from_secs(config.ingest.bootstrap_retry_secs.max(1));
    let Some(db) = bootstrap::connect_database(config.database_path(), retry, &cancel_token).await
    else {
        return Ok(());
    };

    let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(&config.vector));
    if bootstrap::prepare_collection(Arc::clone(&store), &config.vector, retry, &cancel_token)
        .await
        .is_none()
    {
        return Ok(());
    }

    let pipeline = IngestPipeline::new(
        queue,
        db,
        store,
        Arc::new(CommandOcr::new(config.ocr.command.clone())),
        Arc::new(HttpEmbedder::new(&config.embedding)),
        config.vector.size,
    );
    let poll = Duration::from_secs(config.ingest.poll_interval_secs.max(1));
    drain_loop(pipeline, poll, cancel_token).await;
    Ok(())
}

fn print_status(config: &Config) -> Result<()> {
    let gate = PauseGate::new(config.pause_marker());
    let queue = frame_queue(config);

    println!(
        "capture:  {}",
        if gate.is_paused() { "paused" } else { "running" }
    );
    if queue.inbox().is_dir() {
        println!("backlog:  {} frame(s) in {}", queue.backlog()?, queue.inbox().display());
    } else {
        println!("backlog:  inbox {} not created yet", queue.inbox().display());
    }
    println!("database: {}", config.database_path().display());
    Ok(())
}
