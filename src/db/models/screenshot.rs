//! Relational record of an ingested frame.
//!
//! One row per archived file; `filepath` is unique and rows are never
//! updated once written.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// App name recorded for frames; the frame file carries no window metadata.
pub const UNKNOWN_APP: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    pub id: i64,
    pub filepath: String,
    pub timestamp: NaiveDateTime,
    pub app_name: Option<String>,
    pub window_title: Option<String>,
    pub ocr_text: Option<String>,
}

/// Insert payload; the store assigns `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScreenshot {
    pub filepath: String,
    pub timestamp: NaiveDateTime,
    pub app_name: Option<String>,
    pub window_title: Option<String>,
    pub ocr_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// A record with the same `filepath` already exists.
    DuplicateFilepath,
}
