use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_FILE: &str = "recall.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    /// Deadline for the screenshot command; it is killed when exceeded.
    /// Must be shorter than `timeout_secs`.
    pub command_timeout_secs: u64,
    /// Minimum Hamming distance from the last accepted frame for a new frame
    /// to be published.
    pub similarity_threshold: u32,
    pub window_blocklist: Vec<String>,
    pub temp_filename: String,
    pub image_extension: String,
    /// `{output}` is replaced with the staging path.
    pub screenshot_command: Vec<String>,
    pub window_command: Vec<String>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: 10,
            command_timeout_secs: 5,
            similarity_threshold: 8,
            window_blocklist: Vec::new(),
            temp_filename: "temp_capture.png".into(),
            image_extension: "png".into(),
            screenshot_command: ["grim", "-t", "png", "-l", "0", "{output}"]
                .into_iter()
                .map(String::from)
                .collect(),
            window_command: ["hyprctl", "activewindow", "-j"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub poll_interval_secs: u64,
    pub bootstrap_retry_secs: u64,
    pub extensions: Vec<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            bootstrap_retry_secs: 2,
            extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// `{image}` is replaced with the frame path.
    pub command: Vec<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            command: vec!["tesseract".into(), "{image}".into(), "stdout".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/embed".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub url: String,
    pub collection: String,
    pub size: usize,
    pub distance: Distance,
    pub timeout_secs: u64,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".into(),
            collection: "screenshots".into(),
            size: 512,
            distance: Distance::Cosine,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub inbox_dir: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
    pub pause_marker: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub capture: CaptureSettings,
    pub ingest: IngestSettings,
    pub ocr: OcrSettings,
    pub embedding: EmbeddingSettings,
    pub vector: VectorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            inbox_dir: None,
            archive_dir: None,
            pause_marker: None,
            database_path: None,
            capture: CaptureSettings::default(),
            ingest: IngestSettings::default(),
            ocr: OcrSettings::default(),
            embedding: EmbeddingSettings::default(),
            vector: VectorSettings::default(),
        }
    }
}

impl Config {
    /// Loads the config at `path`, falling back to defaults when the file is
    /// absent. Relative paths are anchored at the config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        } else {
            Config::default()
        };

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.anchor(&base);
        config.validate()?;
        Ok(config)
    }

    fn anchor(&mut self, base: &Path) {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        self.data_dir = resolve(&self.data_dir);
        for slot in [
            &mut self.inbox_dir,
            &mut self.archive_dir,
            &mut self.pause_marker,
            &mut self.database_path,
        ] {
            if let Some(p) = slot.as_mut() {
                *p = resolve(p);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.interval_secs == 0 {
            bail!("capture.interval_secs must be at least 1");
        }
        if self.capture.command_timeout_secs == 0
            || self.capture.command_timeout_secs >= self.capture.timeout_secs
        {
            bail!("capture.command_timeout_secs must be at least 1 and below capture.timeout_secs");
        }
        if self.vector.size == 0 {
            bail!("vector.size must be at least 1");
        }
        if self.capture.temp_filename.trim().is_empty() {
            bail!("capture.temp_filename must not be empty");
        }
        if self.capture.screenshot_command.is_empty() {
            bail!("capture.screenshot_command must not be empty");
        }
        if self.capture.window_command.is_empty() {
            bail!("capture.window_command must not be empty");
        }
        if self.ocr.command.is_empty() {
            bail!("ocr.command must not be empty");
        }
        Ok(())
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.inbox_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("inbox"))
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("archive"))
    }

    pub fn pause_marker(&self) -> PathBuf {
        self.pause_marker
            .clone()
            .unwrap_or_else(|| self.data_dir.join("recall.pause"))
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("recall.sqlite3"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults_anchored_at_config_dir() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("recall.json")).unwrap();

        assert_eq!(config.capture.interval_secs, 5);
        assert_eq!(config.vector.size, 512);
        assert_eq!(config.vector.distance, Distance::Cosine);
        assert_eq!(config.inbox_dir(), dir.path().join("data").join("inbox"));
        assert_eq!(config.pause_marker(), dir.path().join("data").join("recall.pause"));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recall.json");
        fs::write(
            &path,
            r#"{
                "archive_dir": "/srv/recall/archive",
                "capture": { "similarity_threshold": 3, "window_blocklist": ["Bank"] }
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.capture.similarity_threshold, 3);
        assert_eq!(config.capture.window_blocklist, vec!["Bank".to_string()]);
        assert_eq!(config.capture.temp_filename, "temp_capture.png");
        assert_eq!(config.archive_dir(), PathBuf::from("/srv/recall/archive"));
        assert_eq!(config.inbox_dir(), dir.path().join("data").join("inbox"));
    }

    #[test]
    fn rejects_zero_interval() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recall.json");
        fs::write(&path, r#"{ "capture": { "interval_secs": 0 } }"#).unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn screenshot_deadline_must_fit_inside_cycle_timeout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recall.json");
        fs::write(
            &path,
            r#"{ "capture": { "timeout_secs": 4, "command_timeout_secs": 4 } }"#,
        )
        .unwrap();
        assert!(Config::load(&path).is_err());

        fs::write(
            &path,
            r#"{ "capture": { "timeout_secs": 4, "command_timeout_secs": 3 } }"#,
        )
        .unwrap();
        assert_eq!(Config::load(&path).unwrap().capture.command_timeout_secs, 3);
    }
}
