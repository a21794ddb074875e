//! Saving and loading embedding stores.
//!
//! A store is written as one [`ModelRecord`]: both embedding maps, the
//! temporal-triple snapshot and the dimension. The codec follows the file
//! extension: `.json` is human-readable `serde_json`, anything else is
//! `bincode`. Both round-trip `f32` values bit-exactly.
//!
//! Loading validates the whole record before a store is built from it, so a
//! rejected file never produces a half-populated store.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::embedding::Dimension;
use crate::embedding::store::EmbeddingStore;
use crate::error::PersistenceError;
use crate::graph::TemporalTriple;

pub type PersistResult<T> = std::result::Result<T, PersistenceError>;

/// The serialized form of an [`EmbeddingStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub entity_embeddings: BTreeMap<String, Vec<f32>>,
    pub relation_embeddings: BTreeMap<String, Vec<f32>>,
    #[serde(default)]
    pub temporal_triples: Vec<TemporalTriple>,
    pub dim: usize,
}

impl ModelRecord {
    /// Check the dimension and every vector length.
    pub fn validate(&self) -> PersistResult<()> {
        if self.dim == 0 {
            return Err(PersistenceError::InvalidDimension { dim: self.dim });
        }
        for (id, v) in self.entity_embeddings.iter().chain(&self.relation_embeddings) {
            if v.len() != self.dim {
                return Err(PersistenceError::DimensionMismatch {
                    id: id.clone(),
                    expected: self.dim,
                    actual: v.len(),
                });
            }
        }
        Ok(())
    }
}

impl EmbeddingStore {
    /// Snapshot the store as a record.
    pub fn to_record(&self) -> ModelRecord {
        ModelRecord {
            entity_embeddings: self
                .iter_entities()
                .map(|(id, v)| (id.to_string(), v.to_vec()))
                .collect(),
            relation_embeddings: self
                .iter_relations()
                .map(|(id, v)| (id.to_string(), v.to_vec()))
                .collect(),
            temporal_triples: self.temporal_triples().to_vec(),
            dim: self.dim().0,
        }
    }

    /// Build a store from a validated record. Ids are registered in the
    /// record's (lexical) key order.
    pub fn from_record(record: ModelRecord) -> PersistResult<Self> {
        record.validate()?;
        let invalid = |e: crate::error::StoreError| PersistenceError::Serialization {
            message: e.to_string(),
        };
        let mut store = EmbeddingStore::new(Dimension(record.dim)).map_err(invalid)?;
        for (id, v) in record.entity_embeddings {
            store.register_entity(id, v).map_err(invalid)?;
        }
        for (id, v) in record.relation_embeddings {
            store.register_relation(id, v).map_err(invalid)?;
        }
        store.set_temporal_triples(record.temporal_triples);
        Ok(store)
    }
}

/// On-disk encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Json,
    Bincode,
}

impl Codec {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Codec::Json,
            _ => Codec::Bincode,
        }
    }

    fn encode(self, record: &ModelRecord) -> PersistResult<Vec<u8>> {
        let result = match self {
            Codec::Json => serde_json::to_vec_pretty(record).map_err(|e| e.to_string()),
            Codec::Bincode => bincode::serialize(record).map_err(|e| e.to_string()),
        };
        result.map_err(|message| PersistenceError::Serialization { message })
    }

    fn decode(self, bytes: &[u8]) -> PersistResult<ModelRecord> {
        let result = match self {
            Codec::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            Codec::Bincode => bincode::deserialize(bytes).map_err(|e| e.to_string()),
        };
        result.map_err(|message| PersistenceError::Serialization { message })
    }
}

/// Write `store` to `path`, creating parent directories.
pub fn save_store(store: &EmbeddingStore, path: &Path) -> PersistResult<()> {
    let bytes = Codec::for_path(path).encode(&store.to_record())?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PersistenceError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    std::fs::write(path, bytes).map_err(|e| PersistenceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    tracing::info!(
        path = %path.display(),
        entities = store.entities().len(),
        relations = store.relations().len(),
        "saved embedding store"
    );
    Ok(())
}

/// Read and decode a record without validating it.
pub fn read_record(path: &Path) -> PersistResult<ModelRecord> {
    let bytes = std::fs::read(path).map_err(|e| PersistenceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Codec::for_path(path).decode(&bytes)
}

/// Read, validate and rebuild a store.
pub fn load_store(path: &Path) -> PersistResult<EmbeddingStore> {
    let store = read_record(path).and_then(EmbeddingStore::from_record);
    match &store {
        Ok(store) => tracing::info!(
            path = %path.display(),
            entities = store.entities().len(),
            relations = store.relations().len(),
            dim = store.dim().0,
            "loaded embedding store"
        ),
        Err(e) => tracing::error!(path = %path.display(), error = %e, "rejected model file"),
    }
    store
}
