//! Persistence tests for the augur engine.
//!
//! Trained models must survive a save/load cycle into a fresh engine, and a
//! damaged model directory must leave the running engine untouched.

use std::sync::Arc;

use augur::config::EngineConfig;
use augur::engine::{EXTRAPOLATION_MODEL, Engine, INTERPOLATION_MODEL};
use augur::error::{AugurError, PersistenceError};
use augur::graph::Properties;
use augur::graph::memory::MemoryGraph;
use augur::persist::{self, ModelRecord};
use serde_json::json;

fn graph() -> Arc<MemoryGraph> {
    let graph = MemoryGraph::new();
    for name in ["Acme", "Globex", "Initech", "Hooli"] {
        graph.add_named(Some("Company"), name);
    }
    let mut props = Properties::new();
    props.insert("year".into(), json!(2017));
    graph.add_relation("Acme", "INVESTS_IN", "Globex", props).unwrap();
    let mut props = Properties::new();
    props.insert("year".into(), json!(2022));
    graph.add_relation("Acme", "INVESTS_IN", "Hooli", props).unwrap();
    graph
        .add_relation("Globex", "PARTNERS_WITH", "Initech", Properties::new())
        .unwrap();
    Arc::new(graph)
}

fn engine(seed: u64) -> Engine {
    let mut config = EngineConfig {
        dimension: 8,
        seed: Some(seed),
        ..EngineConfig::default()
    };
    config.extrapolation.current_year = Some(2024);
    Engine::build(graph(), config).unwrap()
}

fn records(engine: &Engine) -> (ModelRecord, ModelRecord) {
    (
        engine.interpolation_store().to_record(),
        engine.extrapolation_store().to_record(),
    )
}

#[test]
fn trained_models_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    // First session: train and save.
    let (saved, predictions) = {
        let engine = engine(1);
        engine.train_all();
        engine.save_to(dir.path()).unwrap();
        (
            records(&engine),
            engine.predict_missing_relations("Acme", 5).unwrap(),
        )
    };
    assert!(dir.path().join(INTERPOLATION_MODEL).exists());
    assert!(dir.path().join(EXTRAPOLATION_MODEL).exists());

    // Second session: a differently seeded engine loads the same vectors.
    let engine = engine(99);
    assert_ne!(records(&engine), saved);
    engine.load_from(dir.path()).unwrap();
    assert_eq!(records(&engine), saved);
    assert_eq!(engine.predict_missing_relations("Acme", 5).unwrap(), predictions);
}

#[test]
fn vectors_round_trip_bit_exactly() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = engine(2);
    engine.train(3, 0.05);
    engine.save_to(dir.path()).unwrap();

    let loaded = persist::load_store(&dir.path().join(INTERPOLATION_MODEL)).unwrap();
    let store = engine.interpolation_store();
    for (id, v) in store.iter_entities() {
        let restored = loaded.entity(id).unwrap();
        let same_bits = v
            .iter()
            .zip(restored)
            .all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same_bits, "{id} changed on disk");
    }
}

#[test]
fn temporal_triples_travel_with_the_extrapolation_model() {
    let dir = tempfile::TempDir::new().unwrap();
    engine(3).save_to(dir.path()).unwrap();

    let record = persist::read_record(&dir.path().join(EXTRAPOLATION_MODEL)).unwrap();
    assert_eq!(record.temporal_triples.len(), 2);
    assert_eq!(record.dim, 8);

    let record = persist::read_record(&dir.path().join(INTERPOLATION_MODEL)).unwrap();
    assert!(record.temporal_triples.is_empty());
}

#[test]
fn corrupt_model_leaves_engine_unchanged() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = engine(4);
    engine.save_to(dir.path()).unwrap();
    engine.train_all();
    let before = records(&engine);

    // The interpolation file is fine, the extrapolation file is not.
    std::fs::write(dir.path().join(EXTRAPOLATION_MODEL), b"\x01\x02garbage").unwrap();
    let err = engine.load_from(dir.path()).unwrap_err();
    assert!(matches!(err, AugurError::Persistence(_)));
    assert_eq!(records(&engine), before);

    assert!(!engine.load(dir.path()));
    assert_eq!(records(&engine), before);
}

#[test]
fn missing_directory_is_reported() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = engine(5);
    let err = engine.load_from(&dir.path().join("absent")).unwrap_err();
    assert!(matches!(
        err,
        AugurError::Persistence(PersistenceError::Io { .. })
    ));
}

#[test]
fn inconsistent_dimensions_are_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = engine(6);
    engine.save_to(dir.path()).unwrap();

    let path = dir.path().join(INTERPOLATION_MODEL);
    let mut record = persist::read_record(&path).unwrap();
    record
        .relation_embeddings
        .insert("BROKEN".into(), vec![0.5; 3]);
    std::fs::write(&path, bincode::serialize(&record).unwrap()).unwrap();

    assert!(matches!(
        persist::load_store(&path),
        Err(PersistenceError::DimensionMismatch { expected: 8, actual: 3, .. })
    ));
    assert!(!engine.load(dir.path()));
}

#[test]
fn json_models_are_readable() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = engine(7);
    engine.train_all();
    let path = dir.path().join("export").join("extrapolation.json");
    persist::save_store(&engine.extrapolation_store(), &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["dim"], 8);
    assert_eq!(value["temporalTriples"].as_array().unwrap().len(), 2);
    assert_eq!(value["entityEmbeddings"]["Acme"].as_array().unwrap().len(), 8);

    let loaded = persist::load_store(&path).unwrap();
    assert_eq!(loaded.to_record(), engine.extrapolation_store().to_record());
}

#[test]
fn save_reports_failure_as_flag() {
    let dir = tempfile::TempDir::new().unwrap();
    // A regular file where the model directory should be.
    let blocked = dir.path().join("models");
    std::fs::write(&blocked, b"").unwrap();
    let engine = engine(8);
    assert!(!engine.save(&blocked));
    assert!(engine.save(&dir.path().join("ok")));
    assert!(engine.load(&dir.path().join("ok")));
}
