//! Fresh id allocation for cloned, generated, and imported entities.
//!
//! Explicit ids only need to be unique within their own collection, so the
//! allocator tracks nodes, edges, and groups separately. Generated ids are
//! kept clear of every collection.

use std::collections::{HashMap, HashSet};

use nodeloom_types::graph::EntityKind;
use uuid::Uuid;

use crate::graph_api::GraphApi;

#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    by_kind: HashMap<EntityKind, HashSet<String>>,
    generated: HashSet<String>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with every node, edge, and group id currently in `graph`.
    pub fn from_graph(graph: &dyn GraphApi) -> Self {
        let snapshot = graph.snapshot();
        let mut by_kind = HashMap::new();
        by_kind.insert(EntityKind::Node, snapshot.nodes.into_iter().map(|n| n.id).collect());
        by_kind.insert(EntityKind::Edge, snapshot.edges.into_iter().map(|e| e.id).collect());
        by_kind.insert(EntityKind::Group, snapshot.groups.into_iter().map(|g| g.id).collect());
        Self {
            by_kind,
            generated: HashSet::new(),
        }
    }

    /// Whether `id` is unavailable for an entity of `kind`.
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.generated.contains(id) || self.by_kind.get(&kind).is_some_and(|ids| ids.contains(id))
    }

    /// Claim `id` for `kind`. Returns `false` if it was already taken.
    pub fn reserve(&mut self, kind: EntityKind, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.generated.contains(&id) {
            return false;
        }
        self.by_kind.entry(kind).or_default().insert(id)
    }

    /// Produce `<prefix>-<suffix>` where the suffix comes from a UUID v7.
    pub fn fresh(&mut self, prefix: &str) -> String {
        loop {
            let uuid = Uuid::now_v7().simple().to_string();
            let id = format!("{prefix}-{}", &uuid[20..]);
            let in_graph = self.by_kind.values().any(|ids| ids.contains(&id));
            if !in_graph && self.generated.insert(id.clone()) {
                return id;
            }
        }
    }

    /// Use `preferred` when it is free for `kind`, otherwise allocate a
    /// fresh id prefixed with the kind's name.
    pub fn claim_or_fresh(&mut self, kind: EntityKind, preferred: Option<&str>) -> String {
        match preferred {
            Some(id) if !id.is_empty() && self.reserve(kind, id) => id.to_string(),
            _ => self.fresh(&kind.to_string()),
        }
    }
}
