//! Mutation plans shared by the transformation skills.
//!
//! A skill first reads the graph and fills a [`MutationPlan`]; nothing is
//! written until [`MutationPlan::apply`] runs the plan in a fixed order:
//! node creates, edge creates, node updates, edge updates, edge deletes,
//! node deletes, then group membership. A dry run returns the plan itself.

use std::collections::HashMap;

use nodeloom_types::graph::{Edge, EdgePatch, Node, NodePatch};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::graph_api::GraphApi;
use crate::skill::{SkillContext, SkillError, SkillOutput};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    pub id: String,
    pub patch: NodePatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeUpdate {
    pub id: String,
    pub patch: EdgePatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupJoin {
    pub group_id: String,
    pub node_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationPlan {
    pub create_nodes: Vec<Node>,
    pub create_edges: Vec<Edge>,
    pub node_updates: Vec<NodeUpdate>,
    pub edge_updates: Vec<EdgeUpdate>,
    pub delete_edges: Vec<String>,
    pub delete_nodes: Vec<String>,
    pub group_joins: Vec<GroupJoin>,
}

/// Counts of what an applied plan did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub nodes_created: usize,
    pub edges_created: usize,
    pub nodes_updated: usize,
    pub edges_updated: usize,
    pub edges_deleted: usize,
    pub nodes_deleted: usize,
    pub group_joins: usize,
}

impl MutationPlan {
    pub fn is_empty(&self) -> bool {
        self.summary() == PlanSummary::default()
    }

    /// What the plan would do if applied in full.
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            nodes_created: self.create_nodes.len(),
            edges_created: self.create_edges.len(),
            nodes_updated: self.node_updates.len(),
            edges_updated: self.edge_updates.len(),
            edges_deleted: self.delete_edges.len(),
            nodes_deleted: self.delete_nodes.len(),
            group_joins: self.group_joins.len(),
        }
    }

    /// Stage a node update, folding it into an earlier update for the same
    /// node so each node receives exactly one patch.
    pub fn update_node(&mut self, id: impl Into<String>, patch: NodePatch) {
        let id = id.into();
        match self.node_updates.iter_mut().find(|u| u.id == id) {
            Some(existing) => merge_node_patch(&mut existing.patch, patch),
            None => self.node_updates.push(NodeUpdate { id, patch }),
        }
    }

    pub fn update_edge(&mut self, id: impl Into<String>, patch: EdgePatch) {
        self.edge_updates.push(EdgeUpdate { id: id.into(), patch });
    }

    pub fn delete_edge(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.delete_edges.contains(&id) {
            self.delete_edges.push(id);
        }
    }

    pub fn delete_node(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.delete_nodes.contains(&id) {
            self.delete_nodes.push(id);
        }
    }

    pub fn join_group(&mut self, group_id: impl Into<String>, node_ids: Vec<String>) {
        let group_id = group_id.into();
        match self.group_joins.iter_mut().find(|j| j.group_id == group_id) {
            Some(join) => join.node_ids.extend(node_ids),
            None => self.group_joins.push(GroupJoin { group_id, node_ids }),
        }
    }

    /// Apply the plan. Not atomic: a failing step stops the remaining steps
    /// but earlier writes stay in place.
    pub fn apply(self, graph: &mut dyn GraphApi) -> Result<PlanSummary, SkillError> {
        let mut summary = PlanSummary::default();

        if !self.create_nodes.is_empty() {
            summary.nodes_created = graph.create_nodes(self.create_nodes)?.len();
        }
        if !self.create_edges.is_empty() {
            summary.edges_created = graph.create_edges(self.create_edges)?.len();
        }
        for update in &self.node_updates {
            graph.update_node(&update.id, &update.patch)?;
            summary.nodes_updated += 1;
        }
        for update in &self.edge_updates {
            graph.update_edge(&update.id, &update.patch)?;
            summary.edges_updated += 1;
        }
        for id in &self.delete_edges {
            // Already gone with an earlier cascade.
            if graph.edge(id).is_some() {
                graph.delete_edge(id)?;
                summary.edges_deleted += 1;
            }
        }
        for id in &self.delete_nodes {
            if graph.node(id).is_some() {
                graph.delete_node(id)?;
                summary.nodes_deleted += 1;
            }
        }
        for join in &self.group_joins {
            graph.add_nodes_to_group(&join.group_id, &join.node_ids)?;
            summary.group_joins += 1;
        }
        Ok(summary)
    }
}

fn merge_node_patch(into: &mut NodePatch, next: NodePatch) {
    if next.label.is_some() {
        into.label = next.label;
    }
    if next.node_type.is_some() {
        into.node_type = next.node_type;
    }
    if next.position.is_some() {
        into.position = next.position;
    }
    if next.width.is_some() {
        into.width = next.width;
    }
    if next.height.is_some() {
        into.height = next.height;
    }
    if next.handles.is_some() {
        into.handles = next.handles;
    }
    if next.state.is_some() {
        into.state = next.state;
    }
    if next.data.is_some() {
        into.data = next.data;
        into.data_mode = next.data_mode;
    }
    if next.extensions.is_some() {
        into.extensions = next.extensions;
    }
}

/// Finish a transformation: return the plan on a dry run, apply it otherwise.
pub(crate) fn finish(
    ctx: &mut SkillContext<'_>,
    plan: MutationPlan,
    mut report: Value,
    warnings: Vec<String>,
) -> Result<SkillOutput, SkillError> {
    let planned = plan.summary();
    let extra = if ctx.dry_run {
        json!({ "applied": false, "summary": planned, "plan": plan })
    } else {
        let applied = plan.apply(&mut *ctx.graph)?;
        tracing::debug!(skill = ctx.skill_id, ?applied, "applied mutation plan");
        json!({ "applied": true, "summary": applied })
    };
    if let (Some(report), Value::Object(mut extra)) = (report.as_object_mut(), extra) {
        report.append(&mut extra);
    }
    Ok(SkillOutput::ok(report).with_warnings(warnings))
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// A field to carry between nodes: either one path used on both sides, or an
/// explicit `{from, to}` pair.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldSpec {
    Path(String),
    Mapped { from: String, to: String },
}

impl FieldSpec {
    pub fn from(&self) -> &str {
        match self {
            Self::Path(path) => path,
            Self::Mapped { from, .. } => from,
        }
    }

    pub fn to(&self) -> &str {
        match self {
            Self::Path(path) => path,
            Self::Mapped { to, .. } => to,
        }
    }
}

/// Recursively merge `patch` into `target`. Objects merge key by key; any
/// other value replaces what was there.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Working copies of node data maps, written back as one replace patch per
/// node that actually changed.
#[derive(Debug, Default)]
pub(crate) struct DataDrafts {
    original: HashMap<String, Map<String, Value>>,
    drafts: Vec<(String, Map<String, Value>)>,
}

impl DataDrafts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, node: &Node) -> &mut Map<String, Value> {
        let index = match self.drafts.iter().position(|(id, _)| *id == node.id) {
            Some(index) => index,
            None => {
                self.original.insert(node.id.clone(), node.data.clone());
                self.drafts.push((node.id.clone(), node.data.clone()));
                self.drafts.len() - 1
            }
        };
        &mut self.drafts[index].1
    }

    pub fn get(&self, id: &str) -> Option<&Map<String, Value>> {
        self.drafts.iter().find(|(d, _)| d == id).map(|(_, data)| data)
    }

    /// Stage a `replace_data` patch for every draft that differs from the
    /// node's original data. Returns the ids that changed.
    pub fn stage(self, plan: &mut MutationPlan) -> Vec<String> {
        let mut changed = Vec::new();
        for (id, data) in self.drafts {
            if self.original.get(&id) != Some(&data) {
                changed.push(id.clone());
                plan.update_node(id, NodePatch::replace_data(data));
            }
        }
        changed
    }
}
