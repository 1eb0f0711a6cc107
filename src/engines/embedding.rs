use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use ureq::Agent;

use crate::config::EmbeddingSettings;

use super::EmbeddingEngine;

/// Posts raw image bytes to an embedding service. The service must encode
/// text queries into the same vector space; that side is used by search
/// only.
pub struct HttpEmbedder {
    agent: Agent,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Wrapped { embedding: Vec<f32> },
    Bare(Vec<f32>),
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(settings.timeout_secs.max(1))))
            .build()
            .into();
        Self {
            agent,
            url: settings.url.clone(),
        }
    }
}

fn content_type(image: &Path) -> &'static str {
    match image
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn parse_embedding(body: &str) -> Result<Vec<f32>> {
    let parsed: EmbeddingResponse =
        serde_json::from_str(body).context("failed to parse embedding response")?;
    let vector = match parsed {
        EmbeddingResponse::Wrapped { embedding } => embedding,
        EmbeddingResponse::Bare(vector) => vector,
    };
    if vector.is_empty() {
        bail!("embedding service returned an empty vector");
    }
    Ok(vector)
}

impl EmbeddingEngine for HttpEmbedder {
    fn embed(&self, image: &Path) -> Result<Vec<f32>> {
        let bytes =
            fs::read(image).with_context(|| format!("failed to read {}", image.display()))?;
        let mut response = self
            .agent
            .post(&self.url)
            .header("Content-Type", content_type(image))
            .send(&bytes[..])
            .with_context(|| format!("embedding request to {} failed", self.url))?;
        let body = response
            .body_mut()
            .read_to_string()
            .context("failed to read embedding response")?;
        parse_embedding(&body)
    }
}
