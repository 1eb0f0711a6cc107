//! Text-extraction and embedding collaborators used by ingestion.

mod embedding;
mod ocr;

use std::path::Path;

use anyhow::Result;

pub use embedding::HttpEmbedder;
pub use ocr::CommandOcr;

pub trait OcrEngine: Send + Sync {
    /// Recognised text fragments in reading order. Geometry is not kept.
    fn recognize(&self, image: &Path) -> Result<Vec<String>>;
}

pub trait EmbeddingEngine: Send + Sync {
    fn embed(&self, image: &Path) -> Result<Vec<f32>>;
}

/// Join fragments with single spaces, dropping blank ones.
pub fn join_fragments(fragments: &[String]) -> String {
    fragments
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_non_blank_fragments() {
        let fragments = vec!["cpu".to_string(), "  ".to_string(), " usage ".to_string()];
        assert_eq!(join_fragments(&fragments), "cpu usage");
        assert_eq!(join_fragments(&[]), "");
    }
}
