//! Triple completion over the static embeddings.
//!
//! The supplied members of `(entity1, relation, entity2)` select the mode:
//!
//! | supplied | predicts |
//! |---|---|
//! | entity1, entity2 | the relation between them |
//! | entity1, relation | target entities |
//! | relation, entity2 | source entities |
//!
//! Any other combination yields [`InterpolationAnswer::InsufficientParameters`].
//! Candidates already linked in the backend are never returned, and unknown
//! identifiers give an empty list with a warning.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::embedding::add;
use crate::embedding::store::EmbeddingStore;
use crate::graph::{BackendResult, GraphBackend};
use crate::scoring::Similarity;

use super::{Prediction, rank};

/// Which member of the triple is being predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Relation,
    Target,
    Source,
}

/// A possibly under-specified triple query. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolationQuery {
    pub entity1: Option<String>,
    pub relation: Option<String>,
    pub entity2: Option<String>,
    pub top_k: usize,
}

impl InterpolationQuery {
    pub fn new(
        entity1: Option<&str>,
        relation: Option<&str>,
        entity2: Option<&str>,
        top_k: usize,
    ) -> Self {
        Self {
            entity1: entity1.map(str::to_string),
            relation: relation.map(str::to_string),
            entity2: entity2.map(str::to_string),
            top_k,
        }
    }

    fn given(field: &Option<String>) -> Option<&str> {
        field.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// The mode selected by the supplied members, if valid.
    pub fn mode(&self) -> Option<QueryMode> {
        match (
            Self::given(&self.entity1),
            Self::given(&self.relation),
            Self::given(&self.entity2),
        ) {
            (Some(_), None, Some(_)) => Some(QueryMode::Relation),
            (Some(_), Some(_), None) => Some(QueryMode::Target),
            (None, Some(_), Some(_)) => Some(QueryMode::Source),
            _ => None,
        }
    }
}

/// Guidance returned for an under-specified query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterGuidance {
    pub message: String,
    pub accepted: Vec<String>,
}

impl Default for ParameterGuidance {
    fn default() -> Self {
        Self {
            message: "insufficient parameters for an interpolation query".into(),
            accepted: vec![
                "entity1 + entity2: predict the relation between them".into(),
                "entity1 + relation: predict target entities".into(),
                "relation + entity2: predict source entities".into(),
            ],
        }
    }
}

impl std::fmt::Display for ParameterGuidance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}; supply one of:", self.message)?;
        for (i, combo) in self.accepted.iter().enumerate() {
            writeln!(f, "  {}. {combo}", i + 1)?;
        }
        Ok(())
    }
}

/// Result of an interpolation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum InterpolationAnswer {
    Predictions(Vec<Prediction>),
    InsufficientParameters(ParameterGuidance),
}

impl InterpolationAnswer {
    /// The predictions, or an empty slice for guidance.
    pub fn predictions(&self) -> &[Prediction] {
        match self {
            InterpolationAnswer::Predictions(p) => p,
            InterpolationAnswer::InsufficientParameters(_) => &[],
        }
    }
}

/// Answers completion queries against one store and backend.
pub struct InterpolationEngine<'a> {
    store: &'a EmbeddingStore,
    backend: &'a dyn GraphBackend,
    similarity: Similarity,
}

impl<'a> InterpolationEngine<'a> {
    pub fn new(store: &'a EmbeddingStore, backend: &'a dyn GraphBackend) -> Self {
        Self {
            store,
            backend,
            similarity: Similarity::default(),
        }
    }

    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    /// Dispatch a query on its mode.
    pub fn answer(&self, query: &InterpolationQuery) -> BackendResult<InterpolationAnswer> {
        let e1 = InterpolationQuery::given(&query.entity1);
        let rel = InterpolationQuery::given(&query.relation);
        let e2 = InterpolationQuery::given(&query.entity2);
        let predictions = match (query.mode(), e1, rel, e2) {
            (Some(QueryMode::Relation), Some(e1), _, Some(e2)) => {
                self.predict_relations(e1, e2, query.top_k)?
            }
            (Some(QueryMode::Target), Some(e1), Some(rel), _) => {
                self.predict_targets(e1, rel, query.top_k)?
            }
            (Some(QueryMode::Source), _, Some(rel), Some(e2)) => {
                self.predict_sources(rel, e2, query.top_k)?
            }
            _ => {
                tracing::debug!(?query, "interpolation query under-specified");
                return Ok(InterpolationAnswer::InsufficientParameters(
                    ParameterGuidance::default(),
                ));
            }
        };
        Ok(InterpolationAnswer::Predictions(predictions))
    }

    /// Rank relation types for `entity1 -> entity2`, skipping any relation
    /// already present between the two in either direction.
    pub fn predict_relations(
        &self,
        entity1: &str,
        entity2: &str,
        top_k: usize,
    ) -> BackendResult<Vec<Prediction>> {
        let (Some(h), Some(t)) = (self.entity(entity1), self.entity(entity2)) else {
            return Ok(Vec::new());
        };
        let existing: HashSet<String> = self
            .backend
            .query_relation_between(entity1, entity2)?
            .into_iter()
            .map(|r| r.relation_type)
            .collect();

        let candidates = self
            .store
            .iter_relations()
            .filter(|(rel, _)| !existing.contains(*rel))
            .map(|(rel, r)| {
                let score = self.similarity.score(&add(h, r), t);
                Prediction::new(entity1, rel, entity2, score)
            })
            .collect();
        Ok(rank(candidates, top_k))
    }

    /// Rank tails for `entity1 -[relation]-> ?`.
    pub fn predict_targets(
        &self,
        entity1: &str,
        relation: &str,
        top_k: usize,
    ) -> BackendResult<Vec<Prediction>> {
        let (Some(h), Some(r)) = (self.entity(entity1), self.relation(relation)) else {
            return Ok(Vec::new());
        };
        let linked: HashSet<String> = self
            .backend
            .query_entity_relations(entity1, Some(relation))?
            .into_iter()
            .map(|r| r.related_entity)
            .collect();

        let predicted = add(h, r);
        let candidates = self
            .store
            .iter_entities()
            .filter(|(id, _)| *id != entity1 && !linked.contains(*id))
            .map(|(id, t)| Prediction::new(entity1, relation, id, self.similarity.score(&predicted, t)))
            .collect();
        Ok(rank(candidates, top_k))
    }

    /// Rank heads for `? -[relation]-> entity2`.
    ///
    /// A candidate `c` scores by the similarity of `c + r` to `entity2`.
    pub fn predict_sources(
        &self,
        relation: &str,
        entity2: &str,
        top_k: usize,
    ) -> BackendResult<Vec<Prediction>> {
        let (Some(r), Some(t)) = (self.relation(relation), self.entity(entity2)) else {
            return Ok(Vec::new());
        };
        let linked: HashSet<String> = self
            .backend
            .query_edges_of_type(relation)?
            .into_iter()
            .filter(|edge| edge.tail == entity2)
            .map(|edge| edge.head)
            .collect();

        let candidates = self
            .store
            .iter_entities()
            .filter(|(id, _)| *id != entity2 && !linked.contains(*id))
            .map(|(id, h)| Prediction::new(id, relation, entity2, self.similarity.score(&add(h, r), t)))
            .collect();
        Ok(rank(candidates, top_k))
    }

    /// Rank every `(relation, target)` pair for `entity`, skipping pairs
    /// already linked in either direction.
    pub fn predict_missing_relations(
        &self,
        entity: &str,
        top_k: usize,
    ) -> BackendResult<Vec<Prediction>> {
        let Some(h) = self.entity(entity) else {
            return Ok(Vec::new());
        };
        let mut candidates = Vec::new();
        for (target, t) in self.store.iter_entities() {
            if target == entity {
                continue;
            }
            let existing: HashSet<String> = self
                .backend
                .query_relation_between(entity, target)?
                .into_iter()
                .map(|r| r.relation_type)
                .collect();
            for (rel, r) in self.store.iter_relations() {
                if existing.contains(rel) {
                    continue;
                }
                let score = self.similarity.score(&add(h, r), t);
                candidates.push(Prediction::new(entity, rel, target, score));
            }
        }
        Ok(rank(candidates, top_k))
    }

    fn entity(&self, id: &str) -> Option<&'a [f32]> {
        match self.store.entity(id) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(entity = %id, error = %e, "no embedding, no prediction possible");
                None
            }
        }
    }

    fn relation(&self, id: &str) -> Option<&'a [f32]> {
        match self.store.relation(id) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(relation = %id, error = %e, "no embedding, no prediction possible");
                None
            }
        }
    }
}
