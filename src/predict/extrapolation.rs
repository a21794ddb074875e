//! Forecasting an entity's future relations.
//!
//! An entity with temporal history is scored per historical relation type by
//! blending two cosine similarities:
//!
//! ```text
//! pattern_weight   · cos(candidate, mean of historical tails)
//! + embedding_weight · cos(entity + relation, candidate)
//! ```
//!
//! An entity without history falls back to plain `cos(entity + relation,
//! candidate)` over every relation type. Industry trends run the per-entity
//! forecast for each member of an industry and keep intra-industry links.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::embedding::store::EmbeddingStore;
use crate::embedding::{add, mean};
use crate::graph::{BackendResult, GraphBackend};
use crate::scoring::cosine_similarity;

use super::{Prediction, rank};

/// Rationale attached to predictions made without temporal history.
pub const FALLBACK_RATIONALE: &str = "semantic-similarity based";

/// Heuristic constants of the forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrapolationConfig {
    #[serde(default = "default_pattern_weight")]
    pub pattern_weight: f32,
    #[serde(default = "default_embedding_weight")]
    pub embedding_weight: f32,
    /// Per-member `top_k` used when forecasting an industry.
    #[serde(default = "default_trend_member_top_k")]
    pub trend_member_top_k: usize,
    /// Node property that names an entity's industry.
    #[serde(default = "default_industry_attribute")]
    pub industry_attribute: String,
    /// Fixed "current year"; the local clock when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_year: Option<i32>,
}

fn default_pattern_weight() -> f32 {
    0.6
}

fn default_embedding_weight() -> f32 {
    0.4
}

fn default_trend_member_top_k() -> usize {
    3
}

fn default_industry_attribute() -> String {
    "industry".into()
}

impl Default for ExtrapolationConfig {
    fn default() -> Self {
        Self {
            pattern_weight: default_pattern_weight(),
            embedding_weight: default_embedding_weight(),
            trend_member_top_k: default_trend_member_top_k(),
            industry_attribute: default_industry_attribute(),
            current_year: None,
        }
    }
}

impl ExtrapolationConfig {
    pub fn current_year(&self) -> i32 {
        self.current_year
            .unwrap_or_else(|| chrono::Local::now().year())
    }
}

/// Forecasts over the temporally trained store.
pub struct ExtrapolationEngine<'a> {
    store: &'a EmbeddingStore,
    backend: &'a dyn GraphBackend,
    config: &'a ExtrapolationConfig,
}

impl<'a> ExtrapolationEngine<'a> {
    pub fn new(
        store: &'a EmbeddingStore,
        backend: &'a dyn GraphBackend,
        config: &'a ExtrapolationConfig,
    ) -> Self {
        Self {
            store,
            backend,
            config,
        }
    }

    /// The year a forecast `future_years` ahead refers to.
    pub fn future_year(&self, future_years: u32) -> i32 {
        self.config
            .current_year()
            .saturating_add(i32::try_from(future_years).unwrap_or(i32::MAX))
    }

    /// Up to `top_k` future relations of `entity`.
    pub fn predict_future_relationships(
        &self,
        entity: &str,
        future_years: u32,
        top_k: usize,
    ) -> BackendResult<Vec<Prediction>> {
        let entity_vec = match self.store.entity(entity) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(entity = %entity, error = %e, "entity not in temporal model");
                return Ok(Vec::new());
            }
        };
        let future_year = self.future_year(future_years);
        let mut existing = ExistingEdges::new(self.backend, entity);

        // Tails of each historical relation type, in first-seen order.
        let mut history: Vec<(&str, Vec<&str>)> = Vec::new();
        for triple in self.store.temporal_triples().iter().filter(|t| t.head == entity) {
            match history.iter_mut().find(|(rel, _)| *rel == triple.relation) {
                Some((_, tails)) => tails.push(triple.tail.as_str()),
                None => history.push((triple.relation.as_str(), vec![triple.tail.as_str()])),
            }
        }
        // Most used relation types first.
        history.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let mut predictions = Vec::new();
        if history.is_empty() {
            tracing::debug!(entity = %entity, "no temporal history, using embedding similarity");
            for (rel, r) in self.store.iter_relations() {
                let predicted = add(entity_vec, r);
                for (target, t) in self.store.iter_entities() {
                    if target == entity || existing.contains(target, rel)? {
                        continue;
                    }
                    predictions.push(
                        Prediction::new(entity, rel, target, cosine_similarity(&predicted, t))
                            .with_year(future_year)
                            .with_rationale(FALLBACK_RATIONALE),
                    );
                }
            }
        } else {
            for (rel, tails) in &history {
                let Ok(r) = self.store.relation(rel) else {
                    tracing::debug!(relation = %rel, "historical relation type has no embedding");
                    continue;
                };
                let Some(pattern) = mean(tails.iter().filter_map(|t| self.store.entity(t).ok()))
                else {
                    continue;
                };
                let predicted = add(entity_vec, r);
                let seen: HashSet<&str> = tails.iter().copied().collect();
                for (target, t) in self.store.iter_entities() {
                    if target == entity || seen.contains(target) || existing.contains(target, rel)? {
                        continue;
                    }
                    let score = self.config.pattern_weight * cosine_similarity(t, &pattern)
                        + self.config.embedding_weight * cosine_similarity(&predicted, t);
                    predictions.push(
                        Prediction::new(entity, *rel, target, score)
                            .with_year(future_year)
                            .with_rationale(format!("historical pattern of {rel}")),
                    );
                }
            }
        }
        Ok(rank(predictions, top_k))
    }

    /// Up to `top_k` intra-industry relations among members of `industry`.
    pub fn predict_market_trend(
        &self,
        industry: &str,
        future_years: u32,
        top_k: usize,
    ) -> BackendResult<Vec<Prediction>> {
        let members: HashSet<String> = self
            .backend
            .query_entities_by_attribute(&self.config.industry_attribute, industry)?
            .iter()
            .map(|record| record.entity_id())
            .collect();
        if members.is_empty() {
            tracing::warn!(industry = %industry, "no entities found for industry");
            return Ok(Vec::new());
        }

        // Deterministic member order.
        let mut ordered: Vec<&String> = members.iter().collect();
        ordered.sort();

        let mut trend = Vec::new();
        for member in ordered {
            if !self.store.contains_entity(member) {
                continue;
            }
            let forecast = self.predict_future_relationships(
                member,
                future_years,
                self.config.trend_member_top_k,
            )?;
            trend.extend(
                forecast
                    .into_iter()
                    .filter(|p| members.contains(&p.target)),
            );
        }
        tracing::debug!(industry = %industry, members = members.len(), predictions = trend.len(), "industry trend");
        Ok(rank(trend, top_k))
    }
}

/// Relation types already linking the query entity to each target, fetched
/// from the backend at most once per target.
struct ExistingEdges<'b> {
    backend: &'b dyn GraphBackend,
    entity: &'b str,
    cache: HashMap<String, HashSet<String>>,
}

impl<'b> ExistingEdges<'b> {
    fn new(backend: &'b dyn GraphBackend, entity: &'b str) -> Self {
        Self {
            backend,
            entity,
            cache: HashMap::new(),
        }
    }

    fn contains(&mut self, target: &str, relation: &str) -> BackendResult<bool> {
        if !self.cache.contains_key(target) {
            let relations = self
                .backend
                .query_relation_between(self.entity, target)?
                .into_iter()
                .map(|r| r.relation_type)
                .collect();
            self.cache.insert(target.to_string(), relations);
        }
        Ok(self
            .cache
            .get(target)
            .is_some_and(|relations| relations.contains(relation)))
    }
}

/// Relation-type counts over a set of predictions.
pub fn relation_histogram(predictions: &[Prediction]) -> BTreeMap<String, usize> {
    let mut histogram = BTreeMap::new();
    for p in predictions {
        *histogram.entry(p.relation.clone()).or_insert(0) += 1;
    }
    histogram
}
