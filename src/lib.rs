// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # augur
//!
//! Knowledge-graph embedding engine for two kinds of query over a graph of
//! entities and typed relations:
//!
//! - **interpolation**: complete a partially given `(head, relation, tail)`
//!   triple from what the graph already contains
//! - **extrapolation**: forecast an entity's future relations from its
//!   year-stamped history
//!
//! ## Architecture
//!
//! - **Embeddings** (`embedding`): append-only registries and owned vector stores
//! - **Scoring** (`scoring`): TransE distance `-‖h + r - t‖` and cosine ranking
//! - **Training** (`train`): margin-ranking TransE and decay-weighted temporal
//!   regression, both stepped with Adam
//! - **Prediction** (`predict`): interpolation and extrapolation engines
//! - **Graph** (`graph`): the backend trait plus an in-memory petgraph backend
//! - **Persistence** (`persist`): bincode or JSON model records
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use augur::config::EngineConfig;
//! use augur::engine::Engine;
//! use augur::graph::Properties;
//! use augur::graph::memory::MemoryGraph;
//!
//! let graph = MemoryGraph::new();
//! graph.add_named(Some("Company"), "Acme");
//! graph.add_named(Some("Company"), "Globex");
//! graph.add_relation("Acme", "INVESTS_IN", "Globex", Properties::new()).unwrap();
//!
//! let engine = Engine::build(Arc::new(graph), EngineConfig::default()).unwrap();
//! engine.train(10, 0.01);
//! let answer = engine
//!     .predict_interpolation(Some("Globex"), Some("INVESTS_IN"), None, 5)
//!     .unwrap();
//! ```

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod graph;
pub mod persist;
pub mod predict;
pub mod scoring;
pub mod train;
