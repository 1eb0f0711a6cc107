use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use ureq::Agent;

use crate::config::{Distance, VectorSettings};

use super::{VectorPoint, VectorStore};

/// Qdrant over its REST API.
pub struct QdrantStore {
    agent: Agent,
    base_url: String,
    collection: String,
}

impl QdrantStore {
    pub fn new(settings: &VectorSettings) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(settings.timeout_secs.max(1))))
            .build()
            .into();
        Self {
            agent,
            base_url: settings.url.trim_end_matches('/').to_string(),
            collection: settings.collection.clone(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Existing collection info, or `None` when Qdrant reports 404.
    fn fetch_collection(&self) -> Result<Option<Value>> {
        match self.agent.get(&self.collection_url()).call() {
            Ok(mut response) => {
                let body = response
                    .body_mut()
                    .read_to_string()
                    .context("failed to read collection info")?;
                let info: Value =
                    serde_json::from_str(&body).context("failed to parse collection info")?;
                Ok(Some(info))
            }
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(err) => Err(err).context("failed to query Qdrant collection"),
        }
    }

    fn put_json(&self, url: &str, body: &Value) -> Result<()> {
        let body = serde_json::to_string(body).context("failed to serialize request")?;
        self.agent
            .put(url)
            .header("Content-Type", "application/json")
            .send(body.as_bytes())
            .with_context(|| format!("Qdrant request to {url} failed"))?;
        Ok(())
    }
}

fn configured_size(info: &Value) -> Option<u64> {
    info.pointer("/result/config/params/vectors/size")
        .and_then(Value::as_u64)
}

pub(crate) fn create_collection_body(size: usize, distance: Distance) -> Value {
    json!({
        "vectors": {
            "size": size,
            "distance": distance.as_str(),
        }
    })
}

pub(crate) fn upsert_body(point: &VectorPoint) -> Value {
    json!({
        "points": [{
            "id": point.id,
            "vector": point.vector,
            "payload": point.payload,
        }]
    })
}

impl VectorStore for QdrantStore {
    fn ensure_collection(&self, size: usize, distance: Distance) -> Result<()> {
        if let Some(info) = self.fetch_collection()? {
            if let Some(existing) = configured_size(&info) {
                if existing != size as u64 {
                    bail!(
                        "collection '{}' has dimension {existing}, expected {size}",
                        self.collection
                    );
                }
            }
            return Ok(());
        }

        self.put_json(&self.collection_url(), &create_collection_body(size, distance))
            .with_context(|| format!("failed to create collection '{}'", self.collection))
    }

    fn upsert(&self, point: &VectorPoint) -> Result<()> {
        let url = format!("{}/points?wait=true", self.collection_url());
        self.put_json(&url, &upsert_body(point))
            .with_context(|| format!("failed to upsert point {}", point.id))
    }
}
