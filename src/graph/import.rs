//! JSON graph documents.
//!
//! A document lists nodes (a `label` plus free-form properties) and
//! relationships whose endpoints are located by `(label, property, value)`:
//!
//! ```json
//! {
//!   "nodes": [{ "label": "Company", "name": "Acme", "industry": "tech" }],
//!   "relationships": [{
//!     "start_label": "Company", "start_property": "name", "start_value": "Acme",
//!     "type": "INVESTS_IN",
//!     "end_label": "Company", "end_property": "name", "end_value": "Globex",
//!     "properties": { "year": 2019 }
//!   }]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

use super::memory::MemoryGraph;
use super::{BackendResult, EntityId, Properties, property_text};

/// A node entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub properties: Properties,
}

/// A relationship entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDoc {
    #[serde(default)]
    pub start_label: Option<String>,
    pub start_property: String,
    pub start_value: serde_json::Value,
    #[serde(rename = "type")]
    pub relation_type: String,
    #[serde(default)]
    pub end_label: Option<String>,
    pub end_property: String,
    pub end_value: serde_json::Value,
    #[serde(default)]
    pub properties: Properties,
}

/// A whole graph document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDoc>,
}

/// Counts from an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub nodes: usize,
    pub relationships: usize,
    pub skipped_relationships: usize,
}

/// Parse a document from a JSON string.
pub fn parse_document(json: &str) -> BackendResult<GraphDocument> {
    serde_json::from_str(json).map_err(|e| BackendError::Import {
        message: e.to_string(),
    })
}

/// Read a JSON document from disk into a new [`MemoryGraph`].
pub fn load_json(path: &Path) -> BackendResult<(MemoryGraph, ImportStats)> {
    let content = std::fs::read_to_string(path).map_err(|e| BackendError::Import {
        message: format!("{}: {e}", path.display()),
    })?;
    let doc = parse_document(&content)?;
    let graph = MemoryGraph::new();
    let stats = import_document(&graph, &doc);
    tracing::info!(
        path = %path.display(),
        nodes = stats.nodes,
        relationships = stats.relationships,
        skipped = stats.skipped_relationships,
        "imported graph document"
    );
    Ok((graph, stats))
}

/// Add every node and relationship of `doc` to `graph`.
///
/// Relationships whose endpoints match no node are skipped with a warning.
pub fn import_document(graph: &MemoryGraph, doc: &GraphDocument) -> ImportStats {
    let mut stats = ImportStats::default();
    let mut located: Vec<(&NodeDoc, EntityId)> = Vec::with_capacity(doc.nodes.len());

    for node in &doc.nodes {
        let id = graph.add_entity(node.label.as_deref(), node.properties.clone());
        located.push((node, id));
        stats.nodes += 1;
    }

    let find = |label: &Option<String>, property: &str, value: &serde_json::Value| {
        located
            .iter()
            .find(|(node, _)| {
                label.as_ref().is_none_or(|l| node.label.as_ref() == Some(l))
                    && node
                        .properties
                        .get(property)
                        .is_some_and(|v| values_match(v, value))
            })
            .map(|(_, id)| id.clone())
    };

    for rel in &doc.relationships {
        let start = find(&rel.start_label, &rel.start_property, &rel.start_value);
        let end = find(&rel.end_label, &rel.end_property, &rel.end_value);
        let (Some(start), Some(end)) = (start, end) else {
            tracing::warn!(
                relation = %rel.relation_type,
                start = %rel.start_value,
                end = %rel.end_value,
                "relationship endpoint not found, skipping"
            );
            stats.skipped_relationships += 1;
            continue;
        };
        match graph.add_relation(&start, &rel.relation_type, &end, rel.properties.clone()) {
            Ok(()) => stats.relationships += 1,
            Err(e) => {
                tracing::warn!(error = %e, "relationship rejected, skipping");
                stats.skipped_relationships += 1;
            }
        }
    }
    stats
}

fn values_match(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    a == b || matches!((property_text(a), property_text(b)), (Some(x), Some(y)) if x == y)
}

/// Export a graph in document form.
///
/// Endpoints are addressed by `name` when the node has one, else by `id`.
pub fn export_document(graph: &MemoryGraph) -> GraphDocument {
    let entities = graph.all_entities();
    let nodes = entities
        .iter()
        .map(|e| {
            let mut properties = e.properties.clone();
            properties
                .entry("id".into())
                .or_insert_with(|| serde_json::Value::String(e.id.clone()));
            NodeDoc {
                label: e.label.clone(),
                properties,
            }
        })
        .collect();

    let label_of = |entity: &str| {
        entities
            .iter()
            .find(|e| e.entity_id() == entity)
            .and_then(|e| e.label.clone())
    };
    let address = |entity: &str| {
        let named = entities
            .iter()
            .any(|e| e.entity_id() == entity && e.properties.contains_key("name"));
        let property = if named { "name" } else { "id" };
        (property.to_string(), serde_json::Value::String(entity.to_string()))
    };

    let relationships = graph
        .all_edges()
        .into_iter()
        .map(|edge| {
            let (start_property, start_value) = address(&edge.head);
            let (end_property, end_value) = address(&edge.tail);
            RelationshipDoc {
                start_label: label_of(&edge.head),
                start_property,
                start_value,
                relation_type: edge.relation_type,
                end_label: label_of(&edge.tail),
                end_property,
                end_value,
                properties: edge.properties,
            }
        })
        .collect();

    GraphDocument {
        nodes,
        relationships,
    }
}

/// Write a graph to disk as a pretty-printed JSON document.
pub fn save_json(graph: &MemoryGraph, path: &Path) -> BackendResult<()> {
    let doc = export_document(graph);
    let content = serde_json::to_string_pretty(&doc).map_err(|e| BackendError::Import {
        message: e.to_string(),
    })?;
    std::fs::write(path, content).map_err(|e| BackendError::Import {
        message: format!("{}: {e}", path.display()),
    })
}
