use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row, ToSql};

use crate::db::{
    helpers::{format_timestamp, is_unique_violation, parse_timestamp, to_u64},
    models::{InsertOutcome, NewScreenshot, ScreenshotRecord},
    Database,
};

const SELECT_COLUMNS: &str =
    "SELECT id, filepath, timestamp, app_name, window_title, ocr_text FROM screenshots";

fn record_from_row(row: &Row<'_>) -> Result<ScreenshotRecord> {
    let timestamp: String = row.get(2)?;
    Ok(ScreenshotRecord {
        id: row.get(0)?,
        filepath: row.get(1)?,
        timestamp: parse_timestamp(&timestamp, "timestamp")?,
        app_name: row.get(3)?,
        window_title: row.get(4)?,
        ocr_text: row.get(5)?,
    })
}

fn select_one(
    conn: &Connection,
    clause: &str,
    value: &dyn ToSql,
) -> Result<Option<ScreenshotRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE {clause}"))?;
    let mut rows = stmt.query(&[value])?;
    match rows.next()? {
        Some(row) => Ok(Some(record_from_row(row)?)),
        None => Ok(None),
    }
}

impl Database {
    /// Insert a record and return its store-assigned id. A `filepath` that is
    /// already recorded yields [`InsertOutcome::DuplicateFilepath`] instead of
    /// an error.
    pub async fn insert_screenshot(&self, screenshot: &NewScreenshot) -> Result<InsertOutcome> {
        let record = screenshot.clone();
        self.execute(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO screenshots (filepath, timestamp, app_name, window_title, ocr_text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.filepath,
                    format_timestamp(&record.timestamp),
                    record.app_name,
                    record.window_title,
                    record.ocr_text,
                ],
            );

            match inserted {
                Ok(_) => Ok(InsertOutcome::Inserted(conn.last_insert_rowid())),
                Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::DuplicateFilepath),
                Err(err) => Err(err).context("failed to insert screenshot"),
            }
        })
        .await
    }

    pub async fn find_screenshot_by_filepath(
        &self,
        filepath: &str,
    ) -> Result<Option<ScreenshotRecord>> {
        let filepath = filepath.to_string();
        self.execute(move |conn| select_one(conn, "filepath = ?1", &filepath))
            .await
    }

    pub async fn get_screenshot(&self, id: i64) -> Result<Option<ScreenshotRecord>> {
        self.execute(move |conn| select_one(conn, "id = ?1", &id)).await
    }

    pub async fn count_screenshots(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM screenshots", [], |row| {
                row.get(0)
            })?;
            to_u64(count, "screenshot count")
        })
        .await
    }
}
