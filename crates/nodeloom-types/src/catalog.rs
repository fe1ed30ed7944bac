//! Node definition catalogue.
//!
//! A catalogue lists the node definitions a graph may reference through
//! `data.definitionId`. It is loaded from YAML by the infra layer and handed
//! to skills read-only.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::Handle;

/// One reusable node definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handles: Vec<Handle>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub defaults: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DefinitionCatalog {
    #[serde(default)]
    pub definitions: Vec<NodeDefinition>,
}

impl DefinitionCatalog {
    pub fn new(definitions: Vec<NodeDefinition>) -> Self {
        Self { definitions }
    }

    pub fn get(&self, id: &str) -> Option<&NodeDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
