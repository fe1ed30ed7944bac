//! Graph data model: nodes, edges, groups, and the patches that mutate them.
//!
//! All types serialize with camelCase field names so they match the shape the
//! editor front-end exchanges with the engine.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Width assigned to nodes that arrive without one.
pub const DEFAULT_NODE_WIDTH: f64 = 180.0;

/// Height assigned to nodes that arrive without one.
pub const DEFAULT_NODE_HEIGHT: f64 = 80.0;

/// Node type reserved for the single graph manifest.
pub const MANIFEST_NODE_TYPE: &str = "manifest";

fn default_width() -> f64 {
    DEFAULT_NODE_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_NODE_HEIGHT
}

fn default_true() -> bool {
    true
}

/// Deserialize a present field as `Some(value)`, so `null` becomes `Some(None)`.
///
/// Combined with `#[serde(default)]` this distinguishes "field absent" from
/// "field explicitly cleared" on `Option<Option<T>>` patch fields.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Geometry primitives
// ---------------------------------------------------------------------------

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Return this position shifted by `delta`.
    pub fn offset(self, delta: Position) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
        }
    }

    /// Return this position shifted by `delta` scaled by `factor`.
    pub fn offset_scaled(self, delta: Position, factor: f64) -> Self {
        Self {
            x: self.x + delta.x * factor,
            y: self.y + delta.y * factor,
        }
    }
}

/// Axis-aligned bounding box stored on groups.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The three kinds of graph entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Node,
    Edge,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Edge => write!(f, "edge"),
            Self::Group => write!(f, "group"),
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Which way data flows through a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HandleDirection {
    Input,
    Output,
    #[default]
    Bidirectional,
}

impl HandleDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Bidirectional => "bidirectional",
        }
    }

    /// Whether an edge may leave a node through this handle.
    pub fn can_source(&self) -> bool {
        matches!(self, Self::Output | Self::Bidirectional)
    }

    /// Whether an edge may enter a node through this handle.
    pub fn can_target(&self) -> bool {
        matches!(self, Self::Input | Self::Bidirectional)
    }
}

/// A typed connection point on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Handle {
    pub id: String,
    #[serde(default)]
    pub direction: HandleDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Handle {
    pub fn new(id: impl Into<String>, direction: HandleDirection) -> Self {
        Self {
            id: id.into(),
            direction,
            data_type: None,
            label: None,
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Per-node UI state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub hidden: bool,
}

/// A node on the canvas.
///
/// `position` is optional: nodes created without one are placed later by the
/// external layout engine. Geometry code treats a missing position as the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, alias = "ports", skip_serializing_if = "Vec::is_empty")]
    pub handles: Vec<Handle>,
    #[serde(default)]
    pub state: NodeState,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: String::new(),
            position: None,
            width: DEFAULT_NODE_WIDTH,
            height: DEFAULT_NODE_HEIGHT,
            data: Map::new(),
            handles: Vec::new(),
            state: NodeState::default(),
            extensions: Map::new(),
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    pub fn sized(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handles.push(handle);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn locked(mut self) -> Self {
        self.state.locked = true;
        self
    }

    pub fn is_manifest(&self) -> bool {
        self.node_type == MANIFEST_NODE_TYPE
    }

    pub fn position_or_default(&self) -> Position {
        self.position.unwrap_or_default()
    }

    pub fn handle(&self, handle_id: &str) -> Option<&Handle> {
        self.handles.iter().find(|h| h.id == handle_id)
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// A directed connection between two nodes, optionally pinned to handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<Value>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_port: None,
            target_port: None,
            edge_type: None,
            label: None,
            style: None,
            state: None,
            logic: None,
            routing: None,
        }
    }

    pub fn with_ports(
        mut self,
        source_port: Option<impl Into<String>>,
        target_port: Option<impl Into<String>>,
    ) -> Self {
        self.source_port = source_port.map(Into::into);
        self.target_port = target_port.map(Into::into);
        self
    }

    /// The identity used for duplicate detection.
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            source_port: self.source_port.clone(),
            target: self.target.clone(),
            target_port: self.target_port.clone(),
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Two edges are duplicates when they connect the same handles of the same nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeKey {
    pub source: String,
    pub source_port: Option<String>,
    pub target: String,
    pub target_port: Option<String>,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// A named, bounded cluster of at least two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub node_ids: Vec<String>,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub collapsed: bool,
}

impl Group {
    pub fn new(id: impl Into<String>, node_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            node_ids,
            bounds: Bounds::default(),
            style: None,
            visible: true,
            collapsed: false,
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.node_ids.iter().any(|id| id == node_id)
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// How a patch's `data`/`extensions` maps combine with the existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatchMode {
    /// Shallow merge: each key is inserted, a `null` value removes the key.
    #[default]
    Merge,
    /// The patch map replaces the existing map wholesale.
    Replace,
}

/// Partial update for a node. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handles: Option<Vec<Handle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<NodeState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub data_mode: PatchMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl NodePatch {
    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// A patch that swaps the node's data map for `data`.
    pub fn replace_data(data: Map<String, Value>) -> Self {
        Self {
            data: Some(data),
            data_mode: PatchMode::Replace,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.node_type.is_none()
            && self.position.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.handles.is_none()
            && self.state.is_none()
            && self.data.is_none()
            && self.extensions.is_none()
    }

    pub fn apply_to(&self, node: &mut Node) {
        if let Some(label) = &self.label {
            node.label.clone_from(label);
        }
        if let Some(node_type) = &self.node_type {
            node.node_type.clone_from(node_type);
        }
        if let Some(position) = self.position {
            node.position = Some(position);
        }
        if let Some(width) = self.width {
            node.width = width;
        }
        if let Some(height) = self.height {
            node.height = height;
        }
        if let Some(handles) = &self.handles {
            node.handles.clone_from(handles);
        }
        if let Some(state) = self.state {
            node.state = state;
        }
        if let Some(data) = &self.data {
            merge_map(&mut node.data, data, self.data_mode);
        }
        if let Some(extensions) = &self.extensions {
            merge_map(&mut node.extensions, extensions, self.data_mode);
        }
    }
}

fn merge_map(target: &mut Map<String, Value>, patch: &Map<String, Value>, mode: PatchMode) {
    match mode {
        PatchMode::Replace => target.clone_from(patch),
        PatchMode::Merge => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                } else {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Partial update for an edge.
///
/// Port fields are double options: absent leaves the port alone, `null`
/// clears it, a string sets it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EdgePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub source_port: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub target_port: Option<Option<String>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<Value>,
}

impl EdgePatch {
    /// Repoint the source endpoint, replacing its port.
    pub fn retarget_source(node_id: impl Into<String>, port: Option<String>) -> Self {
        Self {
            source: Some(node_id.into()),
            source_port: Some(port),
            ..Self::default()
        }
    }

    /// Repoint the target endpoint, replacing its port.
    pub fn retarget_target(node_id: impl Into<String>, port: Option<String>) -> Self {
        Self {
            target: Some(node_id.into()),
            target_port: Some(port),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, edge: &mut Edge) {
        if let Some(source) = &self.source {
            edge.source.clone_from(source);
        }
        if let Some(target) = &self.target {
            edge.target.clone_from(target);
        }
        if let Some(port) = &self.source_port {
            edge.source_port.clone_from(port);
        }
        if let Some(port) = &self.target_port {
            edge.target_port.clone_from(port);
        }
        if let Some(edge_type) = &self.edge_type {
            edge.edge_type = Some(edge_type.clone());
        }
        if let Some(label) = &self.label {
            edge.label = Some(label.clone());
        }
        if let Some(style) = &self.style {
            edge.style = Some(style.clone());
        }
        if let Some(state) = &self.state {
            edge.state = Some(state.clone());
        }
        if let Some(logic) = &self.logic {
            edge.logic = Some(logic.clone());
        }
        if let Some(routing) = &self.routing {
            edge.routing = Some(routing.clone());
        }
    }
}

/// Partial update for a group's presentation. Membership changes go through
/// the dedicated group-membership operations instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
}

impl GroupPatch {
    pub fn bounds(bounds: Bounds) -> Self {
        Self {
            bounds: Some(bounds),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, group: &mut Group) {
        if let Some(label) = &self.label {
            group.label.clone_from(label);
        }
        if let Some(bounds) = self.bounds {
            group.bounds = bounds;
        }
        if let Some(style) = &self.style {
            group.style = Some(style.clone());
        }
        if let Some(visible) = self.visible {
            group.visible = visible;
        }
        if let Some(collapsed) = self.collapsed {
            group.collapsed = collapsed;
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A complete, owned copy of a graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl GraphSnapshot {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The first manifest node, if any.
    pub fn manifest(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_manifest())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_deserializes_with_defaults() {
        let node: Node = serde_json::from_value(json!({ "id": "a", "type": "task" })).unwrap();
        assert_eq!(node.width, DEFAULT_NODE_WIDTH);
        assert_eq!(node.height, DEFAULT_NODE_HEIGHT);
        assert!(node.position.is_none());
        assert!(!node.state.locked);
    }

    #[test]
    fn node_accepts_ports_alias() {
        let node: Node = serde_json::from_value(json!({
            "id": "a",
            "ports": [{ "id": "out", "direction": "output", "dataType": "number" }]
        }))
        .unwrap();
        assert_eq!(node.handles.len(), 1);
        assert_eq!(node.handles[0].direction, HandleDirection::Output);
        assert_eq!(node.handles[0].data_type.as_deref(), Some("number"));
    }

    #[test]
    fn node_patch_merge_removes_null_keys() {
        let mut node = Node::new("a", "task")
            .with_data("keep", json!(1))
            .with_data("drop", json!(2));
        let patch: NodePatch =
            serde_json::from_value(json!({ "data": { "drop": null, "add": 3 } })).unwrap();
        patch.apply_to(&mut node);
        assert_eq!(node.data.get("keep"), Some(&json!(1)));
        assert_eq!(node.data.get("add"), Some(&json!(3)));
        assert!(!node.data.contains_key("drop"));
    }

    #[test]
    fn node_patch_replace_swaps_data() {
        let mut node = Node::new("a", "task").with_data("old", json!(true));
        let mut data = Map::new();
        data.insert("new".to_string(), json!(1));
        NodePatch::replace_data(data).apply_to(&mut node);
        assert!(!node.data.contains_key("old"));
        assert_eq!(node.data.get("new"), Some(&json!(1)));
    }

    #[test]
    fn edge_patch_distinguishes_absent_and_null_ports() {
        let mut edge = Edge::new("e", "a", "b").with_ports(Some("out"), Some("in"));

        let untouched: EdgePatch = serde_json::from_value(json!({ "label": "x" })).unwrap();
        untouched.apply_to(&mut edge);
        assert_eq!(edge.source_port.as_deref(), Some("out"));

        let cleared: EdgePatch = serde_json::from_value(json!({ "sourcePort": null })).unwrap();
        cleared.apply_to(&mut edge);
        assert!(edge.source_port.is_none());
        assert_eq!(edge.target_port.as_deref(), Some("in"));
    }

    #[test]
    fn edge_key_ignores_id_and_presentation() {
        let a = Edge::new("e1", "a", "b").with_ports(Some("out"), None::<String>);
        let mut b = Edge::new("e2", "a", "b").with_ports(Some("out"), None::<String>);
        b.label = Some("other".to_string());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn group_defaults_visible() {
        let group: Group =
            serde_json::from_value(json!({ "id": "g", "nodeIds": ["a", "b"] })).unwrap();
        assert!(group.visible);
        assert!(group.contains("a"));
        assert!(!group.contains("c"));
    }

    #[test]
    fn handle_direction_capabilities() {
        assert!(HandleDirection::Output.can_source());
        assert!(!HandleDirection::Output.can_target());
        assert!(HandleDirection::Bidirectional.can_source());
        assert!(HandleDirection::Bidirectional.can_target());
        assert!(!HandleDirection::Input.can_source());
    }
}
