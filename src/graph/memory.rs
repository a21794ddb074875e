//! In-memory graph backend.
//!
//! Uses `petgraph` for the directed multigraph and `DashMap` for lookups by
//! entity id and by relation type. This is the reference [`GraphBackend`]
//! used by the CLI and the tests; production deployments put a database
//! behind the same trait.

use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::BackendError;

use super::{
    BackendResult, EdgeDirection, EdgeRecord, EntityId, EntityRecord, GraphBackend, Properties,
    RelatedEntity, RelationBetween, RelationType, has_temporal_property, property_text,
};

/// Node payload.
#[derive(Debug, Clone)]
struct NodeData {
    record: EntityRecord,
}

/// Edge payload.
#[derive(Debug, Clone)]
struct EdgeData {
    relation_type: RelationType,
    properties: Properties,
}

/// In-memory directed multigraph keyed by entity id.
pub struct MemoryGraph {
    graph: RwLock<DiGraph<NodeData, EdgeData>>,
    /// EntityId → NodeIndex.
    node_index: DashMap<EntityId, NodeIndex>,
    /// Relation type → edge count.
    relation_index: DashMap<RelationType, usize>,
    edge_count: AtomicUsize,
}

impl MemoryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            relation_index: DashMap::new(),
            edge_count: AtomicUsize::new(0),
        }
    }

    /// Add a node and return its entity id.
    ///
    /// The internal id is the `id` property if present, else `n<index>`. If a
    /// node with the same entity id already exists it is kept and its id is
    /// returned.
    pub fn add_entity(&self, label: Option<&str>, properties: Properties) -> EntityId {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let internal_id = properties
            .get("id")
            .and_then(property_text)
            .unwrap_or_else(|| format!("n{}", graph.node_count()));
        let record = EntityRecord {
            id: internal_id,
            label: label.map(str::to_string),
            properties,
        };
        let entity_id = record.entity_id();
        if self.node_index.contains_key(&entity_id) {
            tracing::debug!(entity = %entity_id, "entity already present, keeping first");
            return entity_id;
        }
        let idx = graph.add_node(NodeData { record });
        self.node_index.insert(entity_id.clone(), idx);
        entity_id
    }

    /// Add a named entity with no other properties.
    pub fn add_named(&self, label: Option<&str>, name: &str) -> EntityId {
        let mut properties = Properties::new();
        properties.insert("name".into(), serde_json::Value::String(name.to_string()));
        self.add_entity(label, properties)
    }

    /// Add a directed edge between two existing entities.
    pub fn add_relation(
        &self,
        head: &str,
        relation_type: &str,
        tail: &str,
        properties: Properties,
    ) -> BackendResult<()> {
        let head_idx = self.index_of(head)?;
        let tail_idx = self.index_of(tail)?;
        {
            let mut graph = self.graph.write().expect("graph lock poisoned");
            graph.add_edge(
                head_idx,
                tail_idx,
                EdgeData {
                    relation_type: relation_type.to_string(),
                    properties,
                },
            );
        }
        *self
            .relation_index
            .entry(relation_type.to_string())
            .or_default() += 1;
        self.edge_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn index_of(&self, entity: &str) -> BackendResult<NodeIndex> {
        self.node_index
            .get(entity)
            .map(|idx| *idx.value())
            .ok_or_else(|| BackendError::UnknownEntity { id: entity.into() })
    }

    /// Check if an entity exists.
    pub fn has_entity(&self, entity: &str) -> bool {
        self.node_index.contains_key(entity)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count.load(Ordering::Relaxed)
    }

    /// All edges in insertion order.
    pub fn all_edges(&self) -> Vec<EdgeRecord> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edge_indices()
            .filter_map(|ei| {
                let (src, dst) = graph.edge_endpoints(ei)?;
                let edge = graph.edge_weight(ei)?;
                Some(EdgeRecord {
                    head: graph.node_weight(src)?.record.entity_id(),
                    relation_type: edge.relation_type.clone(),
                    tail: graph.node_weight(dst)?.record.entity_id(),
                    properties: edge.properties.clone(),
                })
            })
            .collect()
    }

    /// All nodes in insertion order.
    pub fn all_entities(&self) -> Vec<EntityRecord> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .node_indices()
            .filter_map(|idx| graph.node_weight(idx).map(|n| n.record.clone()))
            .collect()
    }
}

impl GraphBackend for MemoryGraph {
    fn list_entities(&self, limit: usize) -> BackendResult<Vec<EntityRecord>> {
        let mut entities = self.all_entities();
        entities.truncate(limit);
        Ok(entities)
    }

    fn list_relation_types(&self, limit: usize) -> BackendResult<Vec<RelationType>> {
        let mut types: Vec<RelationType> =
            self.relation_index.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types.truncate(limit);
        Ok(types)
    }

    fn query_relation_between(
        &self,
        entity1: &str,
        entity2: &str,
    ) -> BackendResult<Vec<RelationBetween>> {
        let (Ok(a), Ok(b)) = (self.index_of(entity1), self.index_of(entity2)) else {
            return Ok(vec![]);
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        let outgoing = graph
            .edges_directed(a, Direction::Outgoing)
            .filter(|e| e.target() == b)
            .map(|e| (EdgeDirection::Outgoing, e.weight()));
        let incoming = graph
            .edges_directed(a, Direction::Incoming)
            .filter(|e| e.source() == b)
            .map(|e| (EdgeDirection::Incoming, e.weight()));
        let mut found: Vec<RelationBetween> = outgoing
            .chain(incoming)
            .map(|(direction, edge)| RelationBetween {
                relation_type: edge.relation_type.clone(),
                direction,
                properties: edge.properties.clone(),
            })
            .collect();
        // A self-loop shows up both ways; keep one.
        if a == b {
            found.retain(|r| r.direction == EdgeDirection::Outgoing);
        }
        Ok(found)
    }

    fn query_entity_relations(
        &self,
        entity: &str,
        relation_type: Option<&str>,
    ) -> BackendResult<Vec<RelatedEntity>> {
        let Ok(idx) = self.index_of(entity) else {
            return Ok(vec![]);
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        let mut related: Vec<RelatedEntity> = graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| relation_type.is_none_or(|rt| e.weight().relation_type == rt))
            .filter_map(|e| {
                Some(RelatedEntity {
                    related_entity: graph.node_weight(e.target())?.record.entity_id(),
                    relation_type: e.weight().relation_type.clone(),
                    properties: e.weight().properties.clone(),
                })
            })
            .collect();
        // petgraph walks adjacency lists newest-first.
        related.reverse();
        Ok(related)
    }

    fn query_temporal_edges(&self) -> BackendResult<Vec<EdgeRecord>> {
        Ok(self
            .all_edges()
            .into_iter()
            .filter(|e| has_temporal_property(&e.properties))
            .collect())
    }

    fn query_entities_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> BackendResult<Vec<EntityRecord>> {
        Ok(self
            .all_entities()
            .into_iter()
            .filter(|r| {
                r.properties
                    .get(attribute)
                    .and_then(property_text)
                    .is_some_and(|v| v == value)
            })
            .collect())
    }

    fn query_edges_of_type(&self, relation_type: &str) -> BackendResult<Vec<EdgeRecord>> {
        Ok(self
            .all_edges()
            .into_iter()
            .filter(|e| e.relation_type == relation_type)
            .collect())
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
