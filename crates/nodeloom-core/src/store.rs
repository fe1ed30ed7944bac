//! In-memory graph store with an explicit observer interface.
//!
//! `Store` owns nodes, edges, and groups in insertion order and notifies
//! subscribed listeners after every successful mutation. It is passed by
//! reference to the engine; there is no ambient global graph.

use std::collections::HashSet;
use std::fmt;

use nodeloom_types::error::GraphError;
use nodeloom_types::graph::{
    Edge, EdgePatch, EntityKind, GraphSnapshot, Group, GroupPatch, Node, NodePatch, Position,
};
use serde::Serialize;

use crate::graph_api::{DuplicateOptions, DuplicateOutcome, GraphApi};
use crate::ids::IdAllocator;

// ---------------------------------------------------------------------------
// Observer types
// ---------------------------------------------------------------------------

/// What changed in a store mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum StoreEvent {
    Created { kind: EntityKind, ids: Vec<String> },
    Updated { kind: EntityKind, ids: Vec<String> },
    Deleted { kind: EntityKind, ids: Vec<String> },
}

/// Handle returned by [`Store::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&StoreEvent) + Send + Sync>;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Store {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    groups: Vec<Group>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("groups", &self.groups.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot, enforcing the same invariants as the
    /// individual create calls.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, GraphError> {
        let mut store = Self::new();
        store.create_nodes(snapshot.nodes)?;
        store.create_edges(snapshot.edges)?;
        store.create_groups(snapshot.groups)?;
        Ok(store)
    }

    /// Load a snapshot as-is, without invariant checks, so a graph with
    /// problems can still be opened, validated, and repaired.
    pub fn restore(snapshot: GraphSnapshot) -> Self {
        Self {
            nodes: snapshot.nodes,
            edges: snapshot.edges,
            groups: snapshot.groups,
            ..Self::default()
        }
    }

    /// Register a listener called after every successful mutation.
    pub fn subscribe(&mut self, listener: impl Fn(&StoreEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&self, event: StoreEvent) {
        tracing::trace!(?event, "store mutation");
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    fn node_index(&self, id: &str) -> Result<usize, GraphError> {
        self.nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    fn edge_index(&self, id: &str) -> Result<usize, GraphError> {
        self.edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))
    }

    fn group_index(&self, id: &str) -> Result<usize, GraphError> {
        self.groups
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| GraphError::GroupNotFound(id.to_string()))
    }

    fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    fn check_endpoints(&self, edge: &Edge) -> Result<(), GraphError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.has_node(endpoint) {
                return Err(GraphError::MissingEndpoint {
                    edge: edge.id.clone(),
                    node: endpoint.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_members(&self, group_id: &str, members: &[String]) -> Result<(), GraphError> {
        if members.len() < 2 {
            return Err(GraphError::GroupTooSmall {
                group: group_id.to_string(),
                count: members.len(),
            });
        }
        if let Some(missing) = members.iter().find(|id| !self.has_node(id)) {
            return Err(GraphError::MissingMember {
                group: group_id.to_string(),
                node: missing.clone(),
            });
        }
        Ok(())
    }

    fn replace_members(&mut self, group_id: &str, members: Vec<String>) -> Result<Group, GraphError> {
        let idx = self.group_index(group_id)?;
        let members = dedupe(members);
        self.check_members(group_id, &members)?;
        self.groups[idx].node_ids = members;
        let group = self.groups[idx].clone();
        self.notify(StoreEvent::Updated {
            kind: EntityKind::Group,
            ids: vec![group.id.clone()],
        });
        Ok(group)
    }
}

fn dedupe(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Reject empty ids and ids colliding with `existing` or each other.
fn check_new_ids<'a>(
    kind: EntityKind,
    existing: impl Iterator<Item = &'a str>,
    incoming: impl Iterator<Item = &'a str>,
) -> Result<(), GraphError> {
    let mut seen: HashSet<&str> = existing.collect();
    for id in incoming {
        if id.is_empty() {
            return Err(GraphError::EmptyId { kind });
        }
        if !seen.insert(id) {
            return Err(GraphError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

impl GraphApi for Store {
    fn nodes(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    fn edges(&self) -> Vec<Edge> {
        self.edges.clone()
    }

    fn groups(&self) -> Vec<Group> {
        self.groups.clone()
    }

    fn node(&self, id: &str) -> Option<Node> {
        self.nodes.iter().find(|n| n.id == id).cloned()
    }

    fn edge(&self, id: &str) -> Option<Edge> {
        self.edges.iter().find(|e| e.id == id).cloned()
    }

    fn read_group(&self, id: &str) -> Option<Group> {
        self.groups.iter().find(|g| g.id == id).cloned()
    }

    fn create_nodes(&mut self, nodes: Vec<Node>) -> Result<Vec<String>, GraphError> {
        check_new_ids(
            EntityKind::Node,
            self.nodes.iter().map(|n| n.id.as_str()),
            nodes.iter().map(|n| n.id.as_str()),
        )?;
        let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        self.nodes.extend(nodes);
        self.notify(StoreEvent::Created {
            kind: EntityKind::Node,
            ids: ids.clone(),
        });
        Ok(ids)
    }

    fn create_edges(&mut self, edges: Vec<Edge>) -> Result<Vec<String>, GraphError> {
        check_new_ids(
            EntityKind::Edge,
            self.edges.iter().map(|e| e.id.as_str()),
            edges.iter().map(|e| e.id.as_str()),
        )?;
        for edge in &edges {
            self.check_endpoints(edge)?;
        }
        let ids: Vec<String> = edges.iter().map(|e| e.id.clone()).collect();
        self.edges.extend(edges);
        self.notify(StoreEvent::Created {
            kind: EntityKind::Edge,
            ids: ids.clone(),
        });
        Ok(ids)
    }

    fn create_groups(&mut self, groups: Vec<Group>) -> Result<Vec<String>, GraphError> {
        check_new_ids(
            EntityKind::Group,
            self.groups.iter().map(|g| g.id.as_str()),
            groups.iter().map(|g| g.id.as_str()),
        )?;
        let groups: Vec<Group> = groups
            .into_iter()
            .map(|mut g| {
                g.node_ids = dedupe(g.node_ids);
                g
            })
            .collect();
        for group in &groups {
            self.check_members(&group.id, &group.node_ids)?;
        }
        let ids: Vec<String> = groups.iter().map(|g| g.id.clone()).collect();
        self.groups.extend(groups);
        self.notify(StoreEvent::Created {
            kind: EntityKind::Group,
            ids: ids.clone(),
        });
        Ok(ids)
    }

    fn update_node(&mut self, id: &str, patch: &NodePatch) -> Result<Node, GraphError> {
        let idx = self.node_index(id)?;
        patch.apply_to(&mut self.nodes[idx]);
        let node = self.nodes[idx].clone();
        self.notify(StoreEvent::Updated {
            kind: EntityKind::Node,
            ids: vec![id.to_string()],
        });
        Ok(node)
    }

    fn update_nodes(&mut self, ids: &[String], patch: &NodePatch) -> Result<Vec<Node>, GraphError> {
        let indices = ids
            .iter()
            .map(|id| self.node_index(id))
            .collect::<Result<Vec<_>, _>>()?;
        let mut updated = Vec::with_capacity(indices.len());
        for idx in indices {
            patch.apply_to(&mut self.nodes[idx]);
            updated.push(self.nodes[idx].clone());
        }
        self.notify(StoreEvent::Updated {
            kind: EntityKind::Node,
            ids: ids.to_vec(),
        });
        Ok(updated)
    }

    fn update_edge(&mut self, id: &str, patch: &EdgePatch) -> Result<Edge, GraphError> {
        let idx = self.edge_index(id)?;
        let mut edge = self.edges[idx].clone();
        patch.apply_to(&mut edge);
        self.check_endpoints(&edge)?;
        self.edges[idx] = edge.clone();
        self.notify(StoreEvent::Updated {
            kind: EntityKind::Edge,
            ids: vec![id.to_string()],
        });
        Ok(edge)
    }

    fn update_edges(&mut self, ids: &[String], patch: &EdgePatch) -> Result<Vec<Edge>, GraphError> {
        let mut staged = Vec::with_capacity(ids.len());
        for id in ids {
            let idx = self.edge_index(id)?;
            let mut edge = self.edges[idx].clone();
            patch.apply_to(&mut edge);
            self.check_endpoints(&edge)?;
            staged.push((idx, edge));
        }
        let updated: Vec<Edge> = staged.iter().map(|(_, e)| e.clone()).collect();
        for (idx, edge) in staged {
            self.edges[idx] = edge;
        }
        self.notify(StoreEvent::Updated {
            kind: EntityKind::Edge,
            ids: ids.to_vec(),
        });
        Ok(updated)
    }

    fn update_group(&mut self, id: &str, patch: &GroupPatch) -> Result<Group, GraphError> {
        let idx = self.group_index(id)?;
        patch.apply_to(&mut self.groups[idx]);
        let group = self.groups[idx].clone();
        self.notify(StoreEvent::Updated {
            kind: EntityKind::Group,
            ids: vec![id.to_string()],
        });
        Ok(group)
    }

    fn delete_node(&mut self, id: &str) -> Result<Node, GraphError> {
        let idx = self.node_index(id)?;
        let node = self.nodes.remove(idx);

        let removed_edges: Vec<String> = self
            .edges
            .iter()
            .filter(|e| e.touches(id))
            .map(|e| e.id.clone())
            .collect();
        self.edges.retain(|e| !e.touches(id));

        let mut touched_groups = Vec::new();
        for group in &mut self.groups {
            if group.contains(id) {
                group.node_ids.retain(|member| member != id);
                touched_groups.push(group.id.clone());
            }
        }

        self.notify(StoreEvent::Deleted {
            kind: EntityKind::Node,
            ids: vec![id.to_string()],
        });
        if !removed_edges.is_empty() {
            self.notify(StoreEvent::Deleted {
                kind: EntityKind::Edge,
                ids: removed_edges,
            });
        }
        if !touched_groups.is_empty() {
            self.notify(StoreEvent::Updated {
                kind: EntityKind::Group,
                ids: touched_groups,
            });
        }
        Ok(node)
    }

    fn delete_edge(&mut self, id: &str) -> Result<Edge, GraphError> {
        let idx = self.edge_index(id)?;
        let edge = self.edges.remove(idx);
        self.notify(StoreEvent::Deleted {
            kind: EntityKind::Edge,
            ids: vec![id.to_string()],
        });
        Ok(edge)
    }

    fn delete_group(&mut self, id: &str) -> Result<Group, GraphError> {
        let idx = self.group_index(id)?;
        let group = self.groups.remove(idx);
        self.notify(StoreEvent::Deleted {
            kind: EntityKind::Group,
            ids: vec![id.to_string()],
        });
        Ok(group)
    }

    fn translate_nodes(&mut self, ids: &[String], delta: Position) -> Result<usize, GraphError> {
        let indices = ids
            .iter()
            .map(|id| self.node_index(id))
            .collect::<Result<Vec<_>, _>>()?;
        for &idx in &indices {
            let node = &mut self.nodes[idx];
            node.position = Some(node.position_or_default().offset(delta));
        }
        self.notify(StoreEvent::Updated {
            kind: EntityKind::Node,
            ids: ids.to_vec(),
        });
        Ok(indices.len())
    }

    fn add_nodes_to_group(&mut self, group_id: &str, node_ids: &[String]) -> Result<Group, GraphError> {
        let idx = self.group_index(group_id)?;
        let mut members = self.groups[idx].node_ids.clone();
        members.extend(node_ids.iter().cloned());
        self.replace_members(group_id, members)
    }

    fn remove_nodes_from_group(
        &mut self,
        group_id: &str,
        node_ids: &[String],
    ) -> Result<Group, GraphError> {
        let idx = self.group_index(group_id)?;
        let members: Vec<String> = self.groups[idx]
            .node_ids
            .iter()
            .filter(|id| !node_ids.contains(id))
            .cloned()
            .collect();
        self.replace_members(group_id, members)
    }

    fn set_group_nodes(&mut self, group_id: &str, node_ids: &[String]) -> Result<Group, GraphError> {
        self.replace_members(group_id, node_ids.to_vec())
    }

    fn duplicate_nodes(
        &mut self,
        ids: &[String],
        options: &DuplicateOptions,
    ) -> Result<DuplicateOutcome, GraphError> {
        let originals = ids
            .iter()
            .map(|id| self.node_index(id).map(|idx| self.nodes[idx].clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut alloc = IdAllocator::from_graph(&*self);
        let mut outcome = DuplicateOutcome::default();
        for original in originals {
            let mut clone = original.clone();
            clone.id = alloc.fresh(&original.id);
            clone.position = Some(original.position_or_default().offset(options.offset));
            outcome.id_map.insert(original.id.clone(), clone.id.clone());
            outcome.nodes.push(clone);
        }

        if options.include_edges {
            for edge in &self.edges {
                if let (Some(source), Some(target)) =
                    (outcome.id_map.get(&edge.source), outcome.id_map.get(&edge.target))
                {
                    let mut clone = edge.clone();
                    clone.id = alloc.fresh(&edge.id);
                    clone.source.clone_from(source);
                    clone.target.clone_from(target);
                    outcome.edges.push(clone);
                }
            }
        }

        self.create_nodes(outcome.nodes.clone())?;
        if !outcome.edges.is_empty() {
            self.create_edges(outcome.edges.clone())?;
        }
        Ok(outcome)
    }
}
