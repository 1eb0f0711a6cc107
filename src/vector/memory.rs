use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use anyhow::{bail, Result};

use crate::config::Distance;

use super::{VectorPoint, VectorStore};

#[derive(Debug, Default)]
struct Collection {
    size: usize,
    distance: Option<Distance>,
    points: BTreeMap<u64, VectorPoint>,
}

/// In-process store with the same upsert-by-id semantics as Qdrant.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    inner: Mutex<Option<Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Collection>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, id: u64) -> Option<VectorPoint> {
        self.lock()
            .as_ref()
            .and_then(|c| c.points.get(&id).cloned())
    }

    pub fn len(&self) -> usize {
        self.lock().as_ref().map(|c| c.points.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn distance(&self) -> Option<Distance> {
        self.lock().as_ref().and_then(|c| c.distance)
    }
}

impl VectorStore for MemoryVectorStore {
    fn ensure_collection(&self, size: usize, distance: Distance) -> Result<()> {
        let mut guard = self.lock();
        match guard.as_ref() {
            Some(existing) if existing.size != size => {
                bail!(
                    "collection exists with dimension {}, expected {size}",
                    existing.size
                )
            }
            Some(_) => Ok(()),
            None => {
                *guard = Some(Collection {
                    size,
                    distance: Some(distance),
                    points: BTreeMap::new(),
                });
                Ok(())
            }
        }
    }

    fn upsert(&self, point: &VectorPoint) -> Result<()> {
        let mut guard = self.lock();
        let Some(collection) = guard.as_mut() else {
            bail!("collection does not exist");
        };
        if point.vector.len() != collection.size {
            bail!(
                "vector dimension {} does not match collection dimension {}",
                point.vector.len(),
                collection.size
            );
        }
        collection.points.insert(point.id, point.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::PointPayload;

    fn point(id: u64, text: &str) -> VectorPoint {
        VectorPoint {
            id,
            vector: vec![0.5; 4],
            payload: PointPayload {
                text: text.into(),
                path: format!("{id}.png"),
            },
        }
    }

    #[test]
    fn upsert_replaces_by_id() {
        let store = MemoryVectorStore::new();
        store.ensure_collection(4, Distance::Cosine).unwrap();
        store.upsert(&point(1, "first")).unwrap();
        store.upsert(&point(1, "second")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().payload.text, "second");
        assert_eq!(store.distance(), Some(Distance::Cosine));
    }

    #[test]
    fn rejects_missing_collection_and_wrong_dimension() {
        let store = MemoryVectorStore::new();
        assert!(store.upsert(&point(1, "x")).is_err());

        store.ensure_collection(4, Distance::Cosine).unwrap();
        store.ensure_collection(4, Distance::Cosine).unwrap();
        assert!(store.ensure_collection(8, Distance::Cosine).is_err());

        let mut wrong = point(2, "y");
        wrong.vector.push(1.0);
        assert!(store.upsert(&wrong).is_err());
        assert!(store.is_empty());
    }
}
