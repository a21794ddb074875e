//! The embedding store: one vector per known entity and relation type.
//!
//! A store is created once with vectors drawn independently from
//! `Normal(0, σ²)` and is afterwards mutated only by a training loop (in
//! place) or replaced wholesale by a load. Vectors are never deleted and the
//! dimension never changes.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{IdentifierKind, StoreError};
use crate::graph::TemporalTriple;

use super::registry::Registry;
use super::{Dimension, Embedding};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Default standard deviation of the initial draw.
pub const DEFAULT_INIT_STD_DEV: f32 = 0.1;

/// Owned entity and relation vectors plus the temporal-triple snapshot they
/// were trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingStore {
    dim: Dimension,
    entities: Registry,
    entity_vectors: Vec<Embedding>,
    relations: Registry,
    relation_vectors: Vec<Embedding>,
    temporal_triples: Vec<TemporalTriple>,
}

impl EmbeddingStore {
    /// Create an empty store.
    pub fn new(dim: Dimension) -> StoreResult<Self> {
        if dim.0 == 0 {
            return Err(StoreError::InvalidDimension { dim: dim.0 });
        }
        Ok(Self {
            dim,
            entities: Registry::new(),
            entity_vectors: Vec::new(),
            relations: Registry::new(),
            relation_vectors: Vec::new(),
            temporal_triples: Vec::new(),
        })
    }

    /// Create a store with one freshly drawn vector per id.
    ///
    /// Duplicate ids are registered once.
    pub fn initialize<R: Rng + ?Sized>(
        entity_ids: &[String],
        relation_types: &[String],
        dim: Dimension,
        std_dev: f32,
        rng: &mut R,
    ) -> StoreResult<Self> {
        let mut store = Self::new(dim)?;
        let normal = Normal::new(0.0f32, std_dev)
            .map_err(|_| StoreError::InvalidInitialization { std_dev })?;
        for id in entity_ids {
            if !store.entities.contains(id) {
                let v = draw(&normal, dim, rng);
                store.register_entity(id.clone(), v)?;
            }
        }
        for id in relation_types {
            if !store.relations.contains(id) {
                let v = draw(&normal, dim, rng);
                store.register_relation(id.clone(), v)?;
            }
        }
        tracing::debug!(
            entities = store.entities.len(),
            relations = store.relations.len(),
            dim = dim.0,
            "initialized embedding store"
        );
        Ok(store)
    }

    /// Register a new entity with its vector. Returns `false` (and leaves the
    /// existing vector alone) if the id is already known.
    pub fn register_entity(&mut self, id: impl Into<String>, vector: Embedding) -> StoreResult<bool> {
        let id = id.into();
        self.check_dim(&id, &vector)?;
        let (_, added) = self.entities.register(id);
        if added {
            self.entity_vectors.push(vector);
        }
        Ok(added)
    }

    /// Register a new relation type with its vector. Returns `false` if known.
    pub fn register_relation(
        &mut self,
        id: impl Into<String>,
        vector: Embedding,
    ) -> StoreResult<bool> {
        let id = id.into();
        self.check_dim(&id, &vector)?;
        let (_, added) = self.relations.register(id);
        if added {
            self.relation_vectors.push(vector);
        }
        Ok(added)
    }

    fn check_dim(&self, id: &str, vector: &[f32]) -> StoreResult<()> {
        if vector.len() != self.dim.0 {
            return Err(StoreError::DimensionMismatch {
                id: id.to_string(),
                expected: self.dim.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// The vector of an entity.
    pub fn entity(&self, id: &str) -> StoreResult<&[f32]> {
        self.entities
            .index_of(id)
            .map(|idx| self.entity_vectors[idx].as_slice())
            .ok_or_else(|| StoreError::UnknownIdentifier {
                kind: IdentifierKind::Entity,
                id: id.to_string(),
            })
    }

    /// The vector of a relation type.
    pub fn relation(&self, id: &str) -> StoreResult<&[f32]> {
        self.relations
            .index_of(id)
            .map(|idx| self.relation_vectors[idx].as_slice())
            .ok_or_else(|| StoreError::UnknownIdentifier {
                kind: IdentifierKind::Relation,
                id: id.to_string(),
            })
    }

    /// Overwrite an entity vector in place.
    pub fn set_entity(&mut self, id: &str, vector: Embedding) -> StoreResult<()> {
        self.check_dim(id, &vector)?;
        let idx = self
            .entities
            .index_of(id)
            .ok_or_else(|| StoreError::UnknownIdentifier {
                kind: IdentifierKind::Entity,
                id: id.to_string(),
            })?;
        self.entity_vectors[idx] = vector;
        Ok(())
    }

    /// Overwrite a relation vector in place.
    pub fn set_relation(&mut self, id: &str, vector: Embedding) -> StoreResult<()> {
        self.check_dim(id, &vector)?;
        let idx = self
            .relations
            .index_of(id)
            .ok_or_else(|| StoreError::UnknownIdentifier {
                kind: IdentifierKind::Relation,
                id: id.to_string(),
            })?;
        self.relation_vectors[idx] = vector;
        Ok(())
    }

    pub fn dim(&self) -> Dimension {
        self.dim
    }

    pub fn entities(&self) -> &Registry {
        &self.entities
    }

    pub fn relations(&self) -> &Registry {
        &self.relations
    }

    pub fn contains_entity(&self, id: &str) -> bool {
        self.entities.contains(id)
    }

    pub fn contains_relation(&self, id: &str) -> bool {
        self.relations.contains(id)
    }

    /// Entity vectors indexed like [`Self::entities`].
    pub fn entity_vectors(&self) -> &[Embedding] {
        &self.entity_vectors
    }

    /// Relation vectors indexed like [`Self::relations`].
    pub fn relation_vectors(&self) -> &[Embedding] {
        &self.relation_vectors
    }

    /// `(id, vector)` pairs for every entity, in registration order.
    pub fn iter_entities(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entities
            .ids()
            .iter()
            .map(String::as_str)
            .zip(self.entity_vectors.iter().map(Vec::as_slice))
    }

    /// `(id, vector)` pairs for every relation type, in registration order.
    pub fn iter_relations(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.relations
            .ids()
            .iter()
            .map(String::as_str)
            .zip(self.relation_vectors.iter().map(Vec::as_slice))
    }

    /// The temporal triples this store was built (and trained) from.
    pub fn temporal_triples(&self) -> &[TemporalTriple] {
        &self.temporal_triples
    }

    /// Replace the temporal-triple snapshot.
    pub fn set_temporal_triples(&mut self, triples: Vec<TemporalTriple>) {
        self.temporal_triples = triples;
    }

    /// Write back a full parameter table produced by a training loop.
    ///
    /// Tables must be indexed like the registries and have the store's
    /// dimension; this is only called with tables cloned from this store.
    pub(crate) fn write_back(&mut self, entities: &[Embedding], relations: &[Embedding]) {
        debug_assert_eq!(entities.len(), self.entity_vectors.len());
        debug_assert_eq!(relations.len(), self.relation_vectors.len());
        self.entity_vectors.clone_from_slice(entities);
        self.relation_vectors.clone_from_slice(relations);
    }
}

fn draw<R: Rng + ?Sized>(normal: &Normal<f32>, dim: Dimension, rng: &mut R) -> Embedding {
    (0..dim.0).map(|_| normal.sample(&mut *rng)).collect()
}
