//! Vector index collaborators.

mod memory;
mod qdrant;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::Distance;

pub use memory::MemoryVectorStore;
pub use qdrant::QdrantStore;

/// Denormalised copy of the record fields a search hit needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub text: String,
    /// Frame file name (not the full archive path).
    pub path: String,
}

/// A vector entry. `id` is always the id of the relational record it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist yet.
    fn ensure_collection(&self, size: usize, distance: Distance) -> Result<()>;

    /// Insert or replace the point with the same id.
    fn upsert(&self, point: &VectorPoint) -> Result<()>;
}
