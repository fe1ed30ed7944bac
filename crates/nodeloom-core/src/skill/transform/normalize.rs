use std::collections::{HashMap, HashSet};

use nodeloom_types::graph::{EntityKind, Node};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use super::plan::{DataDrafts, MutationPlan, finish};
use crate::path::{delete_data_path, get_data_path, set_data_path};
use crate::skill::{SkillContext, SkillError, SkillOutput, missing_ids};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeParams {
    pub operations: Vec<NormalizeOp>,
}

/// A field on a specific node.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldRef {
    pub node_id: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum NormalizeOp {
    /// Drop repeated elements (by JSON equality) from an array, keeping the
    /// first occurrence.
    #[serde(rename_all = "camelCase")]
    DedupeArray { node_ids: Vec<String>, path: String },
    MoveField { from: FieldRef, to: FieldRef },
    CopyField { from: FieldRef, to: FieldRef },
    #[serde(rename_all = "camelCase")]
    SetField { node_ids: Vec<String>, path: String, value: Value },
}

impl NormalizeOp {
    fn node_ids(&self) -> Vec<&String> {
        match self {
            Self::DedupeArray { node_ids, .. } | Self::SetField { node_ids, .. } => node_ids.iter().collect(),
            Self::MoveField { from, to } | Self::CopyField { from, to } => vec![&from.node_id, &to.node_id],
        }
    }
}

fn dedupe(items: Vec<Value>) -> (Vec<Value>, usize) {
    let before = items.len();
    let mut kept: Vec<Value> = Vec::with_capacity(before);
    for item in items {
        if !kept.contains(&item) {
            kept.push(item);
        }
    }
    let removed = before - kept.len();
    (kept, removed)
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: NormalizeParams) -> Result<SkillOutput, SkillError> {
    if params.operations.is_empty() {
        return Err(SkillError::invalid("operations must not be empty"));
    }
    let nodes = ctx.graph.nodes();
    let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let missing = missing_ids(params.operations.iter().flat_map(NormalizeOp::node_ids), &present);
    if !missing.is_empty() {
        return Err(SkillError::missing(EntityKind::Node, missing));
    }
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut drafts = DataDrafts::new();
    let mut warnings = Vec::new();
    let mut removed_duplicates = 0;

    for (index, op) in params.operations.iter().enumerate() {
        match op {
            NormalizeOp::DedupeArray { node_ids, path } => {
                for id in node_ids {
                    let data = drafts.get_or_load(by_id[id.as_str()]);
                    match get_data_path(data, path)? {
                        Some(Value::Array(items)) => {
                            let (kept, removed) = dedupe(items);
                            if removed > 0 {
                                set_data_path(data, path, Value::Array(kept))?;
                                removed_duplicates += removed;
                            }
                        }
                        Some(_) => warnings.push(format!("operation {index}: '{path}' on '{id}' is not an array")),
                        None => warnings.push(format!("operation {index}: '{id}' has no '{path}'")),
                    }
                }
            }
            NormalizeOp::MoveField { from, to } | NormalizeOp::CopyField { from, to } => {
                let source = drafts.get_or_load(by_id[from.node_id.as_str()]);
                let Some(value) = get_data_path(source, &from.path)? else {
                    warnings.push(format!("operation {index}: '{}' has no '{}'", from.node_id, from.path));
                    continue;
                };
                if matches!(op, NormalizeOp::MoveField { .. }) {
                    delete_data_path(source, &from.path)?;
                }
                set_data_path(drafts.get_or_load(by_id[to.node_id.as_str()]), &to.path, value)?;
            }
            NormalizeOp::SetField { node_ids, path, value } => {
                for id in node_ids {
                    set_data_path(drafts.get_or_load(by_id[id.as_str()]), path, value.clone())?;
                }
            }
        }
    }

    let mut plan = MutationPlan::default();
    let changed = drafts.stage(&mut plan);
    let report = json!({
        "operations": params.operations.len(),
        "changedNodes": changed,
        "removedDuplicates": removed_duplicates,
    });
    finish(ctx, plan, report, warnings)
}
