use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::CaptureSettings;
use crate::queue::FrameQueue;

use super::bridge::{ScreenGrabber, WindowProbe, UNKNOWN_TITLE};
use super::pause::PauseGate;
use super::phash::{compute_phash, is_near_duplicate, Fingerprint};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Naming convention for published frames (local time).
pub const FRAME_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Paused,
    /// The active window matched a blocklist entry.
    Blocked { title: String },
    /// Too close to the last accepted frame.
    Duplicate { distance: u32 },
    Published { name: String },
}

pub struct CaptureSampler {
    settings: CaptureSettings,
    blocklist: Vec<String>,
    probe: Arc<dyn WindowProbe>,
    grabber: Arc<dyn ScreenGrabber>,
    queue: Arc<dyn FrameQueue>,
    gate: PauseGate,
    last_fingerprint: Option<Fingerprint>,
}

impl CaptureSampler {
    pub fn new(
        settings: CaptureSettings,
        probe: Arc<dyn WindowProbe>,
        grabber: Arc<dyn ScreenGrabber>,
        queue: Arc<dyn FrameQueue>,
        gate: PauseGate,
    ) -> Self {
        let blocklist = settings
            .window_blocklist
            .iter()
            .map(|entry| entry.to_lowercase())
            .filter(|entry| !entry.is_empty())
            .collect();
        Self {
            settings,
            blocklist,
            probe,
            grabber,
            queue,
            gate,
            last_fingerprint: None,
        }
    }

    /// Fingerprint of the most recently published frame.
    pub fn last_fingerprint(&self) -> Option<&Fingerprint> {
        self.last_fingerprint.as_ref()
    }

    /// Returns the matching blocklist entry, if any.
    pub fn blocked_by(&self, title: &str) -> Option<&str> {
        let title = title.to_lowercase();
        self.blocklist
            .iter()
            .find(|entry| title.contains(entry.as_str()))
            .map(String::as_str)
    }

    /// Run one capture cycle stamped with the current local time.
    pub async fn tick(&mut self) -> Result<CycleOutcome> {
        self.tick_at(Local::now().naive_local()).await
    }

    pub async fn tick_at(&mut self, now: NaiveDateTime) -> Result<CycleOutcome> {
        if self.gate.is_paused() {
            return Ok(CycleOutcome::Paused);
        }

        let probe = Arc::clone(&self.probe);
        let title = match tokio::task::spawn_blocking(move || probe.active_window_title())
            .await
            .context("window query worker join failed")?
        {
            Ok(title) => title,
            Err(err) => {
                log_debug!("window query failed, treating title as unknown: {err:#}");
                UNKNOWN_TITLE.to_string()
            }
        };

        if let Some(entry) = self.blocked_by(&title) {
            log_info!("Privacy block: active window '{title}' matches '{entry}'");
            return Ok(CycleOutcome::Blocked { title });
        }

        let staged = self.queue.staging_path();
        let grabber = Arc::clone(&self.grabber);
        let target = staged.clone();
        let capture_start = Instant::now();
        let captured = tokio::task::spawn_blocking(move || grabber.capture_to(&target))
            .await
            .context("screenshot worker join failed")?;
        if let Err(err) = captured {
            discard(&staged);
            return Err(err.context("screen capture failed"));
        }
        let screenshot_ms = capture_start.elapsed().as_millis();

        let hash_target = staged.clone();
        let fingerprint = match tokio::task::spawn_blocking(move || compute_phash(&hash_target))
            .await
            .context("phash worker join failed")?
        {
            Ok(fp) => fp,
            Err(err) => {
                discard(&staged);
                return Err(err);
            }
        };

        if is_near_duplicate(
            self.last_fingerprint.as_ref(),
            &fingerprint,
            self.settings.similarity_threshold,
        ) {
            let distance = self
                .last_fingerprint
                .as_ref()
                .map(|prev| prev.distance(&fingerprint))
                .unwrap_or_default();
            discard(&staged);
            log_debug!("Suppressed near-duplicate frame (distance {distance})");
            return Ok(CycleOutcome::Duplicate { distance });
        }

        let name = frame_name(now, &self.settings.image_extension);
        if let Err(err) = self.queue.enqueue(&staged, &name) {
            discard(&staged);
            return Err(err);
        }
        self.last_fingerprint = Some(fingerprint);
        log_info!("Saved: {name} (screenshot {screenshot_ms}ms)");

        Ok(CycleOutcome::Published { name })
    }
}

pub fn frame_name(at: NaiveDateTime, extension: &str) -> String {
    format!("{}.{}", at.format(FRAME_NAME_FORMAT), extension)
}

fn discard(staged: &Path) {
    if let Err(err) = fs::remove_file(staged) {
        if err.kind() != std::io::ErrorKind::NotFound {
            log_warn!("failed to discard staged frame {}: {err}", staged.display());
        }
    }
}

/// Capture every `interval_secs` until cancelled. Per-cycle failures and
/// timeouts are logged and the next cycle proceeds on schedule.
pub async fn capture_loop(mut sampler: CaptureSampler, cancel_token: CancellationToken) {
    let interval = Duration::from_secs(sampler.settings.interval_secs);
    let timeout = Duration::from_secs(sampler.settings.timeout_secs.max(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "Capture sampler started (every {}s, saving to {})",
        interval.as_secs(),
        staging_dir(&sampler.queue.staging_path()).display()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match tokio::time::timeout(timeout, sampler.tick()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => log_error!("capture cycle failed: {err:#}"),
                    Err(_) => {
                        discard(&sampler.queue.staging_path());
                        log_warn!("capture cycle timed out (> {}s)", timeout.as_secs());
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("capture sampler shutting down");
                break;
            }
        }
    }
}

fn staging_dir(staged: &Path) -> PathBuf {
    staged
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::FsQueue;
    use anyhow::bail;
    use chrono::NaiveDate;
    use image::{ImageBuffer, Rgb};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedTitle(Mutex<Result<String, String>>);

    impl FixedTitle {
        fn ok(title: &str) -> Arc<Self> {
            Arc::new(Self(Mutex::new(Ok(title.to_string()))))
        }

        fn set(&self, title: &str) {
            *self.0.lock().unwrap() = Ok(title.to_string());
        }
    }

    impl WindowProbe for FixedTitle {
        fn active_window_title(&self) -> Result<String> {
            match &*self.0.lock().unwrap() {
                Ok(title) => Ok(title.clone()),
                Err(msg) => bail!("{msg}"),
            }
        }
    }

    #[derive(Clone, Copy)]
    enum Scene {
        LeftLit,
        TopLit,
        Broken,
    }

    struct SceneGrabber {
        scene: Mutex<Scene>,
        calls: Mutex<usize>,
    }

    impl SceneGrabber {
        fn new(scene: Scene) -> Arc<Self> {
            Arc::new(Self {
                scene: Mutex::new(scene),
                calls: Mutex::new(0),
            })
        }

        fn show(&self, scene: Scene) {
            *self.scene.lock().unwrap() = scene;
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl ScreenGrabber for SceneGrabber {
        fn capture_to(&self, output: &Path) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            let scene = *self.scene.lock().unwrap();
            let img = match scene {
                Scene::LeftLit => ImageBuffer::from_fn(64, 64, |x, _| {
                    if x < 32 {
                        Rgb([255u8, 255, 255])
                    } else {
                        Rgb([0, 0, 0])
                    }
                }),
                Scene::TopLit => ImageBuffer::from_fn(64, 64, |_, y| {
                    if y < 32 {
                        Rgb([255u8, 255, 255])
                    } else {
                        Rgb([0, 0, 0])
                    }
                }),
                Scene::Broken => bail!("grim exited with status 1"),
            };
            img.save(output)?;
            Ok(())
        }
    }

    struct Harness {
        _dir: TempDir,
        queue: Arc<FsQueue>,
        gate: PauseGate,
        probe: Arc<FixedTitle>,
        grabber: Arc<SceneGrabber>,
    }

    impl Harness {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let queue = Arc::new(FsQueue::new(
                dir.path().join("inbox"),
                dir.path().join("archive"),
                "temp_capture.png",
                &["png".to_string()],
            ));
            queue.ensure_dirs().unwrap();
            let gate = PauseGate::new(dir.path().join("recall.pause"));
            Self {
                _dir: dir,
                queue,
                gate,
                probe: FixedTitle::ok("Terminal"),
                grabber: SceneGrabber::new(Scene::LeftLit),
            }
        }

        fn sampler(&self, threshold: u32, blocklist: &[&str]) -> CaptureSampler {
            let settings = CaptureSettings {
                similarity_threshold: threshold,
                window_blocklist: blocklist.iter().map(|s| s.to_string()).collect(),
                ..CaptureSettings::default()
            };
            CaptureSampler::new(
                settings,
                self.probe.clone(),
                self.grabber.clone(),
                self.queue.clone(),
                self.gate.clone(),
            )
        }

        fn inbox_names(&self) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(self.queue.inbox())
                .unwrap()
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect();
            names.sort();
            names
        }
    }

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, second)
            .unwrap()
    }

    #[tokio::test]
    async fn first_capture_is_published_under_timestamp_name() {
        let h = Harness::new();
        let mut sampler = h.sampler(8, &[]);

        let outcome = sampler.tick_at(at(0)).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Published {
                name: "2024-01-01_10-00-00.png".into()
            }
        );
        assert_eq!(h.inbox_names(), vec!["2024-01-01_10-00-00.png"]);
        assert!(sampler.last_fingerprint().is_some());
    }

    #[tokio::test]
    async fn near_duplicate_is_suppressed_and_fingerprint_kept() {
        let h = Harness::new();
        let mut sampler = h.sampler(1, &[]);

        sampler.tick_at(at(0)).await.unwrap();
        let first = sampler.last_fingerprint().cloned();

        let outcome = sampler.tick_at(at(5)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Duplicate { distance: 0 });
        assert_eq!(h.inbox_names(), vec!["2024-01-01_10-00-00.png"]);
        assert_eq!(sampler.last_fingerprint().cloned(), first);
    }

    #[tokio::test]
    async fn distance_at_threshold_is_published() {
        let h = Harness::new();
        // Identical frames have distance 0, which is not below a threshold of 0.
        let mut sampler = h.sampler(0, &[]);

        sampler.tick_at(at(0)).await.unwrap();
        let outcome = sampler.tick_at(at(5)).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Published { .. }));
        assert_eq!(h.inbox_names().len(), 2);
    }

    #[tokio::test]
    async fn changed_scene_is_published() {
        let h = Harness::new();
        let mut sampler = h.sampler(1, &[]);

        sampler.tick_at(at(0)).await.unwrap();
        let first = sampler.last_fingerprint().cloned();
        h.grabber.show(Scene::TopLit);

        let outcome = sampler.tick_at(at(5)).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Published {
                name: "2024-01-01_10-00-05.png".into()
            }
        );
        assert_ne!(sampler.last_fingerprint().cloned(), first);
    }

    #[tokio::test]
    async fn blocklisted_window_skips_capture_entirely() {
        let h = Harness::new();
        let mut sampler = h.sampler(8, &["bitwarden", "Private Browsing"]);
        sampler.tick_at(at(0)).await.unwrap();
        let before = sampler.last_fingerprint().cloned();
        let calls = h.grabber.calls();

        h.probe.set("Vault - BITWARDEN");
        h.grabber.show(Scene::TopLit);
        let outcome = sampler.tick_at(at(5)).await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Blocked {
                title: "Vault - BITWARDEN".into()
            }
        );
        assert_eq!(h.grabber.calls(), calls);
        assert_eq!(h.inbox_names(), vec!["2024-01-01_10-00-00.png"]);
        assert_eq!(sampler.last_fingerprint().cloned(), before);
    }

    #[tokio::test]
    async fn window_query_failure_is_unknown_title() {
        let h = Harness::new();
        *h.probe.0.lock().unwrap() = Err("hyprctl not running".into());
        let mut sampler = h.sampler(8, &["secret"]);

        let outcome = sampler.tick_at(at(0)).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Published { .. }));

        let mut strict = h.sampler(8, &["unknown"]);
        let outcome = strict.tick_at(at(1)).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Blocked { .. }));
    }

    #[tokio::test]
    async fn pause_marker_suppresses_every_cycle() {
        let h = Harness::new();
        let mut sampler = h.sampler(0, &[]);
        h.gate.pause().unwrap();

        for second in 0..5 {
            assert_eq!(
                sampler.tick_at(at(second)).await.unwrap(),
                CycleOutcome::Paused
            );
        }
        assert!(h.inbox_names().is_empty());
        assert_eq!(h.grabber.calls(), 0);

        h.gate.resume().unwrap();
        let outcome = sampler.tick_at(at(10)).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Published { .. }));
    }

    #[tokio::test]
    async fn capture_failure_leaves_inbox_untouched() {
        let h = Harness::new();
        h.grabber.show(Scene::Broken);
        let mut sampler = h.sampler(8, &[]);

        assert!(sampler.tick_at(at(0)).await.is_err());
        assert!(h.inbox_names().is_empty());
        assert!(sampler.last_fingerprint().is_none());

        h.grabber.show(Scene::LeftLit);
        assert!(sampler.tick_at(at(5)).await.is_ok());
        assert_eq!(h.inbox_names(), vec!["2024-01-01_10-00-05.png"]);
    }

    #[test]
    fn frame_name_follows_capture_convention() {
        assert_eq!(frame_name(at(7), "jpg"), "2024-01-01_10-00-07.jpg");
    }
}
