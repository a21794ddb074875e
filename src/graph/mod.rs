//! Graph data model and the backend boundary.
//!
//! The prediction core never owns the graph. It enumerates entities and
//! relation types through a [`GraphBackend`], snapshots the observed
//! [`Triple`]s and [`TemporalTriple`]s, and asks the backend which edges
//! already exist so that predictions never repeat a known fact.
//!
//! - [`memory::MemoryGraph`]: in-memory reference backend (petgraph + DashMap)
//! - [`import`]: JSON graph documents in and out of a `MemoryGraph`

pub mod import;
pub mod memory;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Free-form property bag carried by nodes and edges.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Opaque entity identifier (the node's `name`, else its internal id).
pub type EntityId = String;

/// Opaque relation-type identifier (the edge label).
pub type RelationType = String;

/// A (head, relation, tail) triple observed in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub head: EntityId,
    pub relation: RelationType,
    pub tail: EntityId,
}

impl Triple {
    pub fn new(
        head: impl Into<EntityId>,
        relation: impl Into<RelationType>,
        tail: impl Into<EntityId>,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
        }
    }
}

/// A triple stamped with the year it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalTriple {
    pub head: EntityId,
    pub relation: RelationType,
    pub tail: EntityId,
    pub year: i32,
}

impl TemporalTriple {
    pub fn new(
        head: impl Into<EntityId>,
        relation: impl Into<RelationType>,
        tail: impl Into<EntityId>,
        year: i32,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
            year,
        }
    }

    /// The triple without its year.
    pub fn triple(&self) -> Triple {
        Triple::new(&self.head, &self.relation, &self.tail)
    }
}

/// A node as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Backend-internal identifier.
    pub id: String,
    /// Node label (e.g. `Company`), if the backend has one.
    pub label: Option<String>,
    pub properties: Properties,
}

impl EntityRecord {
    /// The identifier used by the embedding store: the `name` property when it
    /// is a string, falling back to the internal id.
    pub fn entity_id(&self) -> EntityId {
        match self.properties.get("name") {
            Some(serde_json::Value::String(name)) if !name.is_empty() => name.clone(),
            _ => self.id.clone(),
        }
    }
}

/// Orientation of an edge relative to the first entity of a pair query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeDirection {
    /// `entity1 -> entity2`
    Outgoing,
    /// `entity2 -> entity1`
    Incoming,
}

/// An edge found between two entities by [`GraphBackend::query_relation_between`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationBetween {
    pub relation_type: RelationType,
    pub direction: EdgeDirection,
    pub properties: Properties,
}

/// An outgoing neighbour found by [`GraphBackend::query_entity_relations`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub related_entity: EntityId,
    pub relation_type: RelationType,
    pub properties: Properties,
}

/// A directed edge with its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub head: EntityId,
    pub relation_type: RelationType,
    pub tail: EntityId,
    pub properties: Properties,
}

impl EdgeRecord {
    /// Attach the edge's resolved year, if any.
    pub fn to_temporal(&self) -> Option<TemporalTriple> {
        resolve_year(&self.properties)
            .map(|year| TemporalTriple::new(&self.head, &self.relation_type, &self.tail, year))
    }
}

/// The graph storage/query collaborator.
///
/// Every call is blocking and may fail with [`BackendError::Unavailable`];
/// a failure affects only the operation that issued it.
pub trait GraphBackend: Send + Sync {
    /// Up to `limit` nodes.
    fn list_entities(&self, limit: usize) -> BackendResult<Vec<EntityRecord>>;

    /// Up to `limit` distinct relation types.
    fn list_relation_types(&self, limit: usize) -> BackendResult<Vec<RelationType>>;

    /// Edges between two entities, in either direction.
    fn query_relation_between(
        &self,
        entity1: &str,
        entity2: &str,
    ) -> BackendResult<Vec<RelationBetween>>;

    /// Outgoing edges of `entity`, optionally restricted to one relation type.
    fn query_entity_relations(
        &self,
        entity: &str,
        relation_type: Option<&str>,
    ) -> BackendResult<Vec<RelatedEntity>>;

    /// All edges carrying a `year`, `since` or `created_at` property.
    fn query_temporal_edges(&self) -> BackendResult<Vec<EdgeRecord>>;

    /// Nodes whose `attribute` property equals `value`.
    fn query_entities_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> BackendResult<Vec<EntityRecord>>;

    /// All edges of one relation type.
    fn query_edges_of_type(&self, relation_type: &str) -> BackendResult<Vec<EdgeRecord>>;
}

/// Whether a property set carries any of the temporal keys.
pub fn has_temporal_property(properties: &Properties) -> bool {
    ["year", "since", "created_at"]
        .iter()
        .any(|key| properties.get(*key).is_some_and(|v| !v.is_null()))
}

/// Resolve the year of an edge from `year`, then `since`, then `created_at`.
///
/// `year` and `since` accept integers and integer strings; `created_at` takes
/// the text before the first `-` of an ISO timestamp.
pub fn resolve_year(properties: &Properties) -> Option<i32> {
    if let Some(year) = properties.get("year").and_then(integer_year) {
        return Some(year);
    }
    if let Some(year) = properties.get("since").and_then(integer_year) {
        return Some(year);
    }
    match properties.get("created_at") {
        Some(serde_json::Value::String(ts)) => ts.split('-').next()?.trim().parse().ok(),
        Some(other) => integer_year(other),
        None => None,
    }
}

fn integer_year(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|y| i32::try_from(y).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Render a property value for attribute matching.
pub(crate) fn property_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn entity_id_prefers_name() {
        let record = EntityRecord {
            id: "n7".into(),
            label: Some("Company".into()),
            properties: props(&[("name", json!("Acme"))]),
        };
        assert_eq!(record.entity_id(), "Acme");

        let unnamed = EntityRecord {
            id: "n8".into(),
            label: None,
            properties: props(&[("name", json!(42))]),
        };
        assert_eq!(unnamed.entity_id(), "n8");
    }

    #[test]
    fn year_resolution_order() {
        let p = props(&[("since", json!(2001)), ("year", json!("1999"))]);
        assert_eq!(resolve_year(&p), Some(1999));

        let p = props(&[("since", json!(2001))]);
        assert_eq!(resolve_year(&p), Some(2001));

        let p = props(&[("created_at", json!("2018-03-04T10:00:00Z"))]);
        assert_eq!(resolve_year(&p), Some(2018));

        let p = props(&[("year", json!("soon")), ("since", json!(2010))]);
        assert_eq!(resolve_year(&p), Some(2010));

        let p = props(&[("created_at", json!("yesterday"))]);
        assert_eq!(resolve_year(&p), None);

        assert_eq!(resolve_year(&Properties::new()), None);
    }

    #[test]
    fn temporal_property_detection() {
        assert!(has_temporal_property(&props(&[("since", json!(2000))])));
        assert!(!has_temporal_property(&props(&[("since", serde_json::Value::Null)])));
        assert!(!has_temporal_property(&props(&[("field", json!("phones"))])));
    }

    #[test]
    fn edge_record_to_temporal() {
        let edge = EdgeRecord {
            head: "Acme".into(),
            relation_type: "INVESTS_IN".into(),
            tail: "Globex".into(),
            properties: props(&[("year", json!(2020))]),
        };
        let temporal = edge.to_temporal().unwrap();
        assert_eq!(temporal, TemporalTriple::new("Acme", "INVESTS_IN", "Globex", 2020));
        assert_eq!(temporal.triple(), Triple::new("Acme", "INVESTS_IN", "Globex"));
    }
}
