//! The narrow CRUD surface skills use to read and mutate a graph.
//!
//! `GraphApi` is synchronous: every call completes before it returns and the
//! engine assumes exactly one in-flight mutation at a time. Mutators report
//! ordinary domain failures as `Err(GraphError)`; they never panic for them.

use std::collections::BTreeMap;

use nodeloom_types::error::GraphError;
use nodeloom_types::graph::{
    Edge, EdgePatch, GraphSnapshot, Group, GroupPatch, Node, NodePatch, Position,
};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Duplication options
// ---------------------------------------------------------------------------

/// Options for [`GraphApi::duplicate_nodes`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateOptions {
    /// Also clone edges whose endpoints are both in the duplicated set.
    pub include_edges: bool,
    /// Spatial offset applied to every clone.
    pub offset: Position,
}

/// What a duplication produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateOutcome {
    /// Original node id to clone id.
    pub id_map: BTreeMap<String, String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

// ---------------------------------------------------------------------------
// GraphApi trait
// ---------------------------------------------------------------------------

/// Synchronous, in-memory CRUD surface over nodes, edges, and groups.
///
/// Reads return owned clones so a skill can plan against a private copy.
pub trait GraphApi: Send + Sync {
    fn nodes(&self) -> Vec<Node>;

    fn edges(&self) -> Vec<Edge>;

    fn groups(&self) -> Vec<Group>;

    fn node(&self, id: &str) -> Option<Node> {
        self.nodes().into_iter().find(|n| n.id == id)
    }

    fn edge(&self, id: &str) -> Option<Edge> {
        self.edges().into_iter().find(|e| e.id == id)
    }

    fn read_group(&self, id: &str) -> Option<Group> {
        self.groups().into_iter().find(|g| g.id == id)
    }

    fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes(),
            edges: self.edges(),
            groups: self.groups(),
        }
    }

    /// Insert nodes. Fails without inserting anything if an id is empty or taken.
    fn create_nodes(&mut self, nodes: Vec<Node>) -> Result<Vec<String>, GraphError>;

    /// Insert edges. Every endpoint must name an existing node.
    fn create_edges(&mut self, edges: Vec<Edge>) -> Result<Vec<String>, GraphError>;

    /// Insert groups. Every group needs at least two existing members.
    fn create_groups(&mut self, groups: Vec<Group>) -> Result<Vec<String>, GraphError>;

    fn update_node(&mut self, id: &str, patch: &NodePatch) -> Result<Node, GraphError>;

    /// Apply one patch to several nodes. Fails up front if any id is missing.
    fn update_nodes(&mut self, ids: &[String], patch: &NodePatch) -> Result<Vec<Node>, GraphError>;

    fn update_edge(&mut self, id: &str, patch: &EdgePatch) -> Result<Edge, GraphError>;

    fn update_edges(&mut self, ids: &[String], patch: &EdgePatch) -> Result<Vec<Edge>, GraphError>;

    fn update_group(&mut self, id: &str, patch: &GroupPatch) -> Result<Group, GraphError>;

    /// Remove a node together with its incident edges and group memberships.
    fn delete_node(&mut self, id: &str) -> Result<Node, GraphError>;

    fn delete_edge(&mut self, id: &str) -> Result<Edge, GraphError>;

    /// Remove a group. Member nodes are left untouched.
    fn delete_group(&mut self, id: &str) -> Result<Group, GraphError>;

    /// Shift every listed node by `delta`. Returns how many nodes moved.
    fn translate_nodes(&mut self, ids: &[String], delta: Position) -> Result<usize, GraphError>;

    fn add_nodes_to_group(&mut self, group_id: &str, node_ids: &[String]) -> Result<Group, GraphError>;

    fn remove_nodes_from_group(
        &mut self,
        group_id: &str,
        node_ids: &[String],
    ) -> Result<Group, GraphError>;

    fn set_group_nodes(&mut self, group_id: &str, node_ids: &[String]) -> Result<Group, GraphError>;

    fn duplicate_nodes(
        &mut self,
        ids: &[String],
        options: &DuplicateOptions,
    ) -> Result<DuplicateOutcome, GraphError>;
}

// ---------------------------------------------------------------------------
// ReadOnlyGraph
// ---------------------------------------------------------------------------

/// A view that forwards reads and rejects every mutator with
/// [`GraphError::ReadOnly`].
///
/// Handed to skills during a dry run, so a skill that forgets to check
/// `dry_run` fails loudly instead of writing.
pub struct ReadOnlyGraph<'a> {
    inner: &'a dyn GraphApi,
}

impl<'a> ReadOnlyGraph<'a> {
    pub fn new(inner: &'a dyn GraphApi) -> Self {
        Self { inner }
    }
}

impl GraphApi for ReadOnlyGraph<'_> {
    fn nodes(&self) -> Vec<Node> {
        self.inner.nodes()
    }

    fn edges(&self) -> Vec<Edge> {
        self.inner.edges()
    }

    fn groups(&self) -> Vec<Group> {
        self.inner.groups()
    }

    fn node(&self, id: &str) -> Option<Node> {
        self.inner.node(id)
    }

    fn edge(&self, id: &str) -> Option<Edge> {
        self.inner.edge(id)
    }

    fn read_group(&self, id: &str) -> Option<Group> {
        self.inner.read_group(id)
    }

    fn snapshot(&self) -> GraphSnapshot {
        self.inner.snapshot()
    }

    fn create_nodes(&mut self, _nodes: Vec<Node>) -> Result<Vec<String>, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn create_edges(&mut self, _edges: Vec<Edge>) -> Result<Vec<String>, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn create_groups(&mut self, _groups: Vec<Group>) -> Result<Vec<String>, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn update_node(&mut self, _id: &str, _patch: &NodePatch) -> Result<Node, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn update_nodes(&mut self, _ids: &[String], _patch: &NodePatch) -> Result<Vec<Node>, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn update_edge(&mut self, _id: &str, _patch: &EdgePatch) -> Result<Edge, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn update_edges(&mut self, _ids: &[String], _patch: &EdgePatch) -> Result<Vec<Edge>, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn update_group(&mut self, _id: &str, _patch: &GroupPatch) -> Result<Group, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn delete_node(&mut self, _id: &str) -> Result<Node, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn delete_edge(&mut self, _id: &str) -> Result<Edge, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn delete_group(&mut self, _id: &str) -> Result<Group, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn translate_nodes(&mut self, _ids: &[String], _delta: Position) -> Result<usize, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn add_nodes_to_group(&mut self, _group_id: &str, _node_ids: &[String]) -> Result<Group, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn remove_nodes_from_group(
        &mut self,
        _group_id: &str,
        _node_ids: &[String],
    ) -> Result<Group, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn set_group_nodes(&mut self, _group_id: &str, _node_ids: &[String]) -> Result<Group, GraphError> {
        Err(GraphError::ReadOnly)
    }

    fn duplicate_nodes(
        &mut self,
        _ids: &[String],
        _options: &DuplicateOptions,
    ) -> Result<DuplicateOutcome, GraphError> {
        Err(GraphError::ReadOnly)
    }
}
