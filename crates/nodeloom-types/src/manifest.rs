//! Manifest node schema.
//!
//! The manifest is an ordinary node with `type = "manifest"` whose `data`
//! carries four sections: `identity`, `intent`, `dependencies`, and
//! `authority`. These types give a typed view of a well-formed manifest;
//! policy and validation code read the raw JSON so a malformed manifest
//! degrades to warnings instead of failing to decode.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::{MANIFEST_NODE_TYPE, Node};

/// Section keys expected in a manifest's `data`.
pub const MANIFEST_SECTIONS: [&str; 4] = ["identity", "intent", "dependencies", "authority"];

/// Intent kinds that expect at least one script node.
pub const SCRIPTED_INTENTS: [&str; 2] = ["executable", "simulation"];

/// Intent kinds that expect the graph to have edges.
pub const FLOW_INTENTS: [&str; 2] = ["dataflow", "pipeline"];

/// Intent kinds that expect no script nodes.
pub const STATIC_INTENTS: [&str; 2] = ["documentation", "static"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestData {
    pub identity: ManifestIdentity,
    pub intent: ManifestIntent,
    #[serde(default)]
    pub dependencies: ManifestDependencies,
    #[serde(default)]
    pub authority: ManifestAuthority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestIdentity {
    pub graph_id: String,
    pub name: String,
    pub version: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestIntent {
    pub kind: String,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDependencies {
    #[serde(default)]
    pub node_types: Vec<String>,
    #[serde(default)]
    pub port_contracts: Vec<Value>,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Subsystem name to version string.
    #[serde(default)]
    pub schema_versions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAuthority {
    #[serde(default)]
    pub mutation: MutationAuthority,
}

/// The `authority.mutation` block.
///
/// Defaults are permissive: a manifest that says nothing allows everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationAuthority {
    #[serde(default = "permissive")]
    pub allow_create: bool,
    #[serde(default = "permissive")]
    pub allow_update: bool,
    #[serde(default = "permissive")]
    pub allow_delete: bool,
    #[serde(default)]
    pub append_only: bool,
}

fn permissive() -> bool {
    true
}

impl Default for MutationAuthority {
    fn default() -> Self {
        Self {
            allow_create: true,
            allow_update: true,
            allow_delete: true,
            append_only: false,
        }
    }
}

impl ManifestData {
    /// A fresh manifest for a graph with permissive authority.
    pub fn new(graph_id: impl Into<String>, name: impl Into<String>, intent: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            identity: ManifestIdentity {
                graph_id: graph_id.into(),
                name: name.into(),
                version: "1.0.0".to_string(),
                created_at: now.clone(),
                updated_at: now,
            },
            intent: ManifestIntent {
                kind: intent.into(),
                scope: "graph".to_string(),
            },
            dependencies: ManifestDependencies::default(),
            authority: ManifestAuthority::default(),
        }
    }

    pub fn with_authority(mut self, mutation: MutationAuthority) -> Self {
        self.authority.mutation = mutation;
        self
    }

    /// Read the typed manifest from a node's data, if it is well formed.
    pub fn from_node(node: &Node) -> Option<Self> {
        serde_json::from_value(Value::Object(node.data.clone())).ok()
    }

    /// Build the manifest node carrying this data.
    pub fn into_node(self, id: impl Into<String>) -> Node {
        let data = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let mut node = Node::new(id, MANIFEST_NODE_TYPE).with_label("Manifest");
        node.data = data;
        node
    }
}

/// Read the `dependencies` section leniently: a missing or malformed section
/// yields empty dependencies.
pub fn dependencies_of(node: &Node) -> ManifestDependencies {
    node.data
        .get("dependencies")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Read `intent.kind`, if present as a string.
pub fn intent_kind_of(node: &Node) -> Option<&str> {
    node.data.get("intent")?.get("kind")?.as_str()
}
