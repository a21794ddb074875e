//! Engine facade: top-level API for augur.
//!
//! The `Engine` owns a snapshot of the graph, the two embedding stores
//! (static for interpolation, temporal for extrapolation) and the seeded
//! random source, and exposes training, prediction and persistence.
//!
//! Each store sits behind its own `RwLock`: training takes the write lock,
//! prediction the read lock, so serving and training never interleave on one
//! store.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::embedding::store::EmbeddingStore;
use crate::error::AugurResult;
use crate::graph::{BackendResult, EntityId, GraphBackend, RelationType, TemporalTriple, Triple};
use crate::persist;
use crate::predict::Prediction;
use crate::predict::extrapolation::{ExtrapolationEngine, relation_histogram};
use crate::predict::interpolation::{InterpolationAnswer, InterpolationEngine, InterpolationQuery};
use crate::train::{self, TrainingReport};

/// File name of the interpolation model inside a model directory.
pub const INTERPOLATION_MODEL: &str = "interpolation.bin";
/// File name of the extrapolation model inside a model directory.
pub const EXTRAPOLATION_MODEL: &str = "extrapolation.bin";

/// Entities, relation types and observed triples, taken from the backend
/// once per build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entities: Vec<EntityId>,
    pub relation_types: Vec<RelationType>,
    pub triples: Vec<Triple>,
    pub temporal_triples: Vec<TemporalTriple>,
}

impl Snapshot {
    /// Enumerate the backend.
    ///
    /// Only triples whose head and tail are enumerated entities are kept;
    /// temporal triples additionally need a known relation type and a
    /// resolvable year.
    pub fn take(backend: &dyn GraphBackend, config: &EngineConfig) -> BackendResult<Self> {
        let mut entities = Vec::new();
        let mut known = HashSet::new();
        for record in backend.list_entities(config.entity_limit)? {
            let id = record.entity_id();
            if known.insert(id.clone()) {
                entities.push(id);
            }
        }
        let relation_types = backend.list_relation_types(config.relation_limit)?;
        let relation_set: HashSet<&str> = relation_types.iter().map(String::as_str).collect();

        let mut triples = Vec::new();
        for relation in &relation_types {
            for edge in backend.query_edges_of_type(relation)? {
                if known.contains(&edge.head) && known.contains(&edge.tail) {
                    triples.push(Triple::new(edge.head, relation.as_str(), edge.tail));
                }
            }
        }

        let mut temporal_triples = Vec::new();
        for edge in backend.query_temporal_edges()? {
            if !(known.contains(&edge.head)
                && known.contains(&edge.tail)
                && relation_set.contains(edge.relation_type.as_str()))
            {
                continue;
            }
            match edge.to_temporal() {
                Some(triple) => temporal_triples.push(triple),
                None => tracing::debug!(
                    head = %edge.head,
                    relation = %edge.relation_type,
                    tail = %edge.tail,
                    "temporal edge has no resolvable year, skipping"
                ),
            }
        }

        tracing::info!(
            entities = entities.len(),
            relations = relation_types.len(),
            triples = triples.len(),
            temporal = temporal_triples.len(),
            "took graph snapshot"
        );
        Ok(Self {
            entities,
            relation_types,
            triples,
            temporal_triples,
        })
    }
}

/// Extrapolation answer for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrapolationReport {
    pub entity: String,
    pub future_year: i32,
    pub predictions_by_year: BTreeMap<i32, Vec<Prediction>>,
    /// Relation-type counts over the returned predictions.
    pub relation_histogram: BTreeMap<String, usize>,
    pub rationale: String,
}

impl ExtrapolationReport {
    fn new(entity: &str, future_year: i32, predictions: Vec<Prediction>) -> Self {
        let relation_histogram = relation_histogram(&predictions);
        let mut top: Option<(&str, usize)> = None;
        for (relation, &count) in &relation_histogram {
            if top.is_none_or(|(_, best)| count > best) {
                top = Some((relation.as_str(), count));
            }
        }
        let rationale = match top {
            Some((relation, count)) => format!(
                "{entity} is most likely to form new {relation} relationships by {future_year} \
                 ({count} of {} predictions)",
                predictions.len()
            ),
            None => format!("no prediction available for {entity}"),
        };

        let mut predictions_by_year = BTreeMap::new();
        if !predictions.is_empty() {
            predictions_by_year.insert(future_year, predictions);
        }
        Self {
            entity: entity.to_string(),
            future_year,
            predictions_by_year,
            relation_histogram,
            rationale,
        }
    }

    /// Every prediction, in year order.
    pub fn predictions(&self) -> impl Iterator<Item = &Prediction> {
        self.predictions_by_year.values().flatten()
    }
}

/// The augur prediction engine.
pub struct Engine {
    config: EngineConfig,
    backend: Arc<dyn GraphBackend>,
    snapshot: RwLock<Snapshot>,
    interpolation: RwLock<EmbeddingStore>,
    extrapolation: RwLock<EmbeddingStore>,
    rng: Mutex<StdRng>,
}

impl Engine {
    /// Snapshot the backend and initialise both stores.
    pub fn build(backend: Arc<dyn GraphBackend>, config: EngineConfig) -> AugurResult<Self> {
        config.validate()?;
        tracing::info!(
            dim = config.dimension,
            seed = ?config.seed,
            "initializing augur engine"
        );
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let snapshot = Snapshot::take(backend.as_ref(), &config)?;
        let (interpolation, extrapolation) = init_stores(&snapshot, &config, &mut rng)?;

        Ok(Self {
            config,
            backend,
            snapshot: RwLock::new(snapshot),
            interpolation: RwLock::new(interpolation),
            extrapolation: RwLock::new(extrapolation),
            rng: Mutex::new(rng),
        })
    }

    /// Re-snapshot the backend and re-initialise both stores.
    ///
    /// On a backend failure the engine keeps its previous state.
    pub fn rebuild(&self) -> AugurResult<()> {
        let snapshot = Snapshot::take(self.backend.as_ref(), &self.config)?;
        let (interpolation, extrapolation) = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            init_stores(&snapshot, &self.config, &mut rng)?
        };
        // Lock order: snapshot, interpolation, extrapolation. Readers holding
        // the snapshot lock see the new stores only with the new snapshot.
        let mut current = self.snapshot.write().expect("snapshot lock poisoned");
        *self.interpolation.write().expect("interpolation store lock poisoned") = interpolation;
        *self.extrapolation.write().expect("extrapolation store lock poisoned") = extrapolation;
        *current = snapshot;
        Ok(())
    }

    /// Static training of the interpolation store on the snapshot triples.
    ///
    /// A learning rate that is not finite and positive is rejected with
    /// [`TrainingOutcome::InvalidParameters`](crate::train::TrainingOutcome::InvalidParameters).
    pub fn train(&self, epochs: usize, learning_rate: f32) -> TrainingReport {
        let config = self
            .config
            .training
            .static_config()
            .with_epochs(epochs)
            .with_learning_rate(learning_rate);
        let snapshot = self.snapshot.read().expect("snapshot lock poisoned");
        let mut store = self
            .interpolation
            .write()
            .expect("interpolation store lock poisoned");
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        train::transe::train(&mut store, &snapshot.triples, &config, &mut *rng)
    }

    /// Decay-weighted training of the extrapolation store on its temporal
    /// triples. Learning rates are checked as in [`Self::train`].
    pub fn train_temporal(&self, epochs: usize, learning_rate: f32) -> TrainingReport {
        let config = self
            .config
            .training
            .temporal_config()
            .with_epochs(epochs)
            .with_learning_rate(learning_rate);
        let mut store = self
            .extrapolation
            .write()
            .expect("extrapolation store lock poisoned");
        let triples = store.temporal_triples().to_vec();
        train::temporal::train(&mut store, &triples, &config, &self.config.decay)
    }

    /// Both loops with the configured epochs and learning rate.
    pub fn train_all(&self) -> (TrainingReport, TrainingReport) {
        let training = &self.config.training;
        let static_report = self.train(training.epochs, training.learning_rate);
        let temporal_report = self.train_temporal(training.temporal_epochs, training.learning_rate);
        (static_report, temporal_report)
    }

    /// Complete a partially given triple.
    pub fn predict_interpolation(
        &self,
        entity1: Option<&str>,
        relation: Option<&str>,
        entity2: Option<&str>,
        top_k: usize,
    ) -> AugurResult<InterpolationAnswer> {
        let store = self.interpolation_store();
        let engine = self.interpolation_engine(&store);
        let query = InterpolationQuery::new(entity1, relation, entity2, top_k);
        Ok(engine.answer(&query)?)
    }

    /// Rank every missing `(relation, target)` pair for `entity`.
    pub fn predict_missing_relations(&self, entity: &str, top_k: usize) -> AugurResult<Vec<Prediction>> {
        let store = self.interpolation_store();
        Ok(self
            .interpolation_engine(&store)
            .predict_missing_relations(entity, top_k)?)
    }

    /// Forecast `entity`'s relations `future_years` ahead.
    pub fn predict_extrapolation(
        &self,
        entity: &str,
        future_years: u32,
        top_k: usize,
    ) -> AugurResult<ExtrapolationReport> {
        let store = self.extrapolation_store();
        let engine = ExtrapolationEngine::new(&store, self.backend.as_ref(), &self.config.extrapolation);
        let predictions = engine.predict_future_relationships(entity, future_years, top_k)?;
        Ok(ExtrapolationReport::new(
            entity,
            engine.future_year(future_years),
            predictions,
        ))
    }

    /// Forecast intra-industry relations.
    pub fn predict_industry_trend(
        &self,
        industry: &str,
        future_years: u32,
        top_k: usize,
    ) -> AugurResult<Vec<Prediction>> {
        let store = self.extrapolation_store();
        let engine = ExtrapolationEngine::new(&store, self.backend.as_ref(), &self.config.extrapolation);
        Ok(engine.predict_market_trend(industry, future_years, top_k)?)
    }

    /// Write both stores into `dir`.
    pub fn save_to(&self, dir: &Path) -> AugurResult<()> {
        persist::save_store(&self.interpolation_store(), &dir.join(INTERPOLATION_MODEL))?;
        persist::save_store(&self.extrapolation_store(), &dir.join(EXTRAPOLATION_MODEL))?;
        Ok(())
    }

    /// Load both stores from `dir`. Nothing is replaced unless both load.
    pub fn load_from(&self, dir: &Path) -> AugurResult<()> {
        let interpolation = persist::load_store(&dir.join(INTERPOLATION_MODEL))?;
        let extrapolation = persist::load_store(&dir.join(EXTRAPOLATION_MODEL))?;
        *self.interpolation.write().expect("interpolation store lock poisoned") = interpolation;
        *self.extrapolation.write().expect("extrapolation store lock poisoned") = extrapolation;
        Ok(())
    }

    /// [`Self::save_to`], reporting success as a flag.
    pub fn save(&self, dir: &Path) -> bool {
        match self.save_to(dir) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "failed to save models");
                false
            }
        }
    }

    /// [`Self::load_from`], reporting success as a flag.
    pub fn load(&self, dir: &Path) -> bool {
        match self.load_from(dir) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "failed to load models, keeping current state");
                false
            }
        }
    }

    /// Read access to the interpolation store.
    pub fn interpolation_store(&self) -> RwLockReadGuard<'_, EmbeddingStore> {
        self.interpolation
            .read()
            .expect("interpolation store lock poisoned")
    }

    /// Read access to the extrapolation store.
    pub fn extrapolation_store(&self) -> RwLockReadGuard<'_, EmbeddingStore> {
        self.extrapolation
            .read()
            .expect("extrapolation store lock poisoned")
    }

    /// A copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().expect("snapshot lock poisoned").clone()
    }

    pub fn backend(&self) -> &dyn GraphBackend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Counts over the snapshot and stores.
    pub fn info(&self) -> EngineInfo {
        let snapshot = self.snapshot.read().expect("snapshot lock poisoned");
        let interpolation = self.interpolation_store();
        let extrapolation = self.extrapolation_store();
        EngineInfo {
            dimension: interpolation.dim().0,
            entity_count: interpolation.entities().len(),
            relation_count: interpolation.relations().len(),
            triple_count: snapshot.triples.len(),
            temporal_triple_count: extrapolation.temporal_triples().len(),
            seeded: self.config.seed.is_some(),
        }
    }

    fn interpolation_engine<'a>(&'a self, store: &'a EmbeddingStore) -> InterpolationEngine<'a> {
        InterpolationEngine::new(store, self.backend.as_ref())
            .with_similarity(self.config.interpolation.similarity)
    }
}

fn init_stores(
    snapshot: &Snapshot,
    config: &EngineConfig,
    rng: &mut StdRng,
) -> AugurResult<(EmbeddingStore, EmbeddingStore)> {
    let interpolation = EmbeddingStore::initialize(
        &snapshot.entities,
        &snapshot.relation_types,
        config.dimension(),
        config.init_std_dev,
        rng,
    )?;
    let mut extrapolation = EmbeddingStore::initialize(
        &snapshot.entities,
        &snapshot.relation_types,
        config.dimension(),
        config.init_std_dev,
        rng,
    )?;
    extrapolation.set_temporal_triples(snapshot.temporal_triples.clone());
    Ok((interpolation, extrapolation))
}

/// Summary information about the engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub dimension: usize,
    pub entity_count: usize,
    pub relation_count: usize,
    pub triple_count: usize,
    pub temporal_triple_count: usize,
    pub seeded: bool,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "augur engine info")?;
        writeln!(f, "  dimension:        {}", self.dimension)?;
        writeln!(f, "  entities:         {}", self.entity_count)?;
        writeln!(f, "  relation types:   {}", self.relation_count)?;
        writeln!(f, "  triples:          {}", self.triple_count)?;
        writeln!(f, "  temporal triples: {}", self.temporal_triple_count)?;
        writeln!(f, "  seeded:           {}", self.seeded)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("info", &self.info())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Properties;
    use crate::graph::memory::MemoryGraph;
    use crate::train::TrainingOutcome;
    use serde_json::json;

    fn graph() -> MemoryGraph {
        let graph = MemoryGraph::new();
        for name in ["Acme", "Globex", "Initech"] {
            graph.add_named(Some("Company"), name);
        }
        let mut props = Properties::new();
        props.insert("since".into(), json!(2016));
        graph.add_relation("Acme", "INVESTS_IN", "Globex", props).unwrap();
        graph
            .add_relation("Globex", "PARTNERS_WITH", "Initech", Properties::new())
            .unwrap();
        graph
    }

    fn engine() -> Engine {
        Engine::build(
            Arc::new(graph()),
            EngineConfig {
                dimension: 8,
                seed: Some(42),
                ..EngineConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn snapshot_filters_and_resolves_years() {
        let snapshot = Snapshot::take(&graph(), &EngineConfig::default()).unwrap();
        assert_eq!(snapshot.entities, ["Acme", "Globex", "Initech"]);
        assert_eq!(snapshot.relation_types, ["INVESTS_IN", "PARTNERS_WITH"]);
        assert_eq!(snapshot.triples.len(), 2);
        assert_eq!(
            snapshot.temporal_triples,
            [TemporalTriple::new("Acme", "INVESTS_IN", "Globex", 2016)]
        );
    }

    #[test]
    fn entity_limit_bounds_the_snapshot() {
        let config = EngineConfig {
            entity_limit: 2,
            ..EngineConfig::default()
        };
        let snapshot = Snapshot::take(&graph(), &config).unwrap();
        assert_eq!(snapshot.entities.len(), 2);
        // Globex -> Initech is dropped: Initech was not enumerated.
        assert_eq!(snapshot.triples, [Triple::new("Acme", "INVESTS_IN", "Globex")]);
    }

    #[test]
    fn build_and_info() {
        let engine = engine();
        let info = engine.info();
        assert_eq!(info.dimension, 8);
        assert_eq!(info.entity_count, 3);
        assert_eq!(info.relation_count, 2);
        assert_eq!(info.triple_count, 2);
        assert_eq!(info.temporal_triple_count, 1);
        assert!(info.seeded);
        assert!(info.to_string().contains("temporal triples: 1"));
    }

    #[test]
    fn stores_are_drawn_independently() {
        let engine = engine();
        assert_ne!(
            engine.interpolation_store().entity("Acme").unwrap(),
            engine.extrapolation_store().entity("Acme").unwrap()
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Engine::build(
            Arc::new(graph()),
            EngineConfig {
                dimension: 0,
                ..EngineConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::AugurError::Config(_)));
    }

    #[test]
    fn train_all_runs_both_loops() {
        let engine = engine();
        let (s, t) = engine.train_all();
        assert_eq!(s.outcome, TrainingOutcome::Trained);
        assert_eq!(s.epochs, 10);
        assert_eq!(t.outcome, TrainingOutcome::Trained);
        assert_eq!(t.epochs, 5);
        assert_eq!(t.samples, 1);
    }

    #[test]
    fn bad_learning_rate_leaves_stores_untouched() {
        let engine = engine();
        let before = (
            engine.interpolation_store().clone(),
            engine.extrapolation_store().clone(),
        );
        for lr in [-0.1, 0.0, f32::NAN] {
            assert_eq!(engine.train(3, lr).outcome, TrainingOutcome::InvalidParameters);
            assert_eq!(
                engine.train_temporal(3, lr).outcome,
                TrainingOutcome::InvalidParameters
            );
        }
        assert_eq!(*engine.interpolation_store(), before.0);
        assert_eq!(*engine.extrapolation_store(), before.1);
    }

    #[test]
    fn nan_decay_config_is_rejected_at_build() {
        let config = EngineConfig::from_toml("seed = 1\ndimension = 4\n[decay]\nmin_weight = nan\n")
            .unwrap();
        let err = Engine::build(Arc::new(graph()), config).unwrap_err();
        assert!(matches!(err, crate::error::AugurError::Config(_)));
    }

    #[test]
    fn rebuild_swaps_snapshot_and_stores_together() {
        let graph = Arc::new(graph());
        let engine = Arc::new(
            Engine::build(
                graph.clone(),
                EngineConfig {
                    dimension: 4,
                    seed: Some(3),
                    ..EngineConfig::default()
                },
            )
            .unwrap(),
        );

        let writer = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for i in 0..20 {
                    graph.add_named(Some("Company"), &format!("Startup{i}"));
                    engine.rebuild().unwrap();
                }
            })
        };
        for _ in 0..200 {
            // Same lock order as the engine: snapshot, then store.
            let snapshot = engine.snapshot.read().unwrap();
            let store = engine.interpolation.read().unwrap();
            assert_eq!(snapshot.entities.len(), store.entities().len());
        }
        writer.join().unwrap();
        assert_eq!(engine.info().entity_count, 23);
        assert_eq!(engine.snapshot().entities.len(), 23);
    }

    #[test]
    fn extrapolation_report_rationale() {
        let engine = engine();
        let report = engine.predict_extrapolation("Acme", 2, 5).unwrap();
        let total: usize = report.relation_histogram.values().sum();
        assert_eq!(total, report.predictions().count());
        assert!(report.rationale.contains("INVESTS_IN"));
        assert_eq!(report.predictions_by_year.len(), 1);

        let empty = engine.predict_extrapolation("Nobody", 2, 5).unwrap();
        assert!(empty.predictions_by_year.is_empty());
        assert_eq!(empty.rationale, "no prediction available for Nobody");
    }

    #[test]
    fn rebuild_picks_up_new_entities() {
        let graph = Arc::new(graph());
        let engine = Engine::build(
            graph.clone(),
            EngineConfig {
                dimension: 8,
                seed: Some(1),
                ..EngineConfig::default()
            },
        )
        .unwrap();
        graph.add_named(Some("Company"), "Hooli");
        assert_eq!(engine.info().entity_count, 3);
        engine.rebuild().unwrap();
        assert_eq!(engine.info().entity_count, 4);
        assert!(engine.interpolation_store().contains_entity("Hooli"));
    }
}
