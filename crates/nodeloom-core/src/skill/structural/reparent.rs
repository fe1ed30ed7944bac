use std::collections::{BTreeMap, HashSet};

use nodeloom_types::graph::EntityKind;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::grouping::recompute_bounds;
use crate::skill::{SkillContext, SkillError, SkillOutput, missing_ids};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReparentParams {
    pub node_ids: Vec<String>,
    /// Group to move the nodes into. Omit to only ungroup them.
    #[serde(default)]
    pub target_group_id: Option<String>,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: ReparentParams) -> Result<SkillOutput, SkillError> {
    if params.node_ids.is_empty() {
        return Err(SkillError::invalid("nodeIds must not be empty"));
    }
    let nodes = ctx.graph.nodes();
    let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let missing = missing_ids(&params.node_ids, &present);
    if !missing.is_empty() {
        return Err(SkillError::missing(EntityKind::Node, missing));
    }
    if let Some(target) = params.target_group_id.as_deref()
        && ctx.graph.read_group(target).is_none()
    {
        return Err(SkillError::missing(EntityKind::Group, vec![target.to_string()]));
    }

    let moving: HashSet<&str> = params.node_ids.iter().map(String::as_str).collect();
    let target = params.target_group_id.as_deref();

    // Source group id -> members leaving it.
    let mut removals: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for group in ctx.graph.groups() {
        if Some(group.id.as_str()) == target {
            continue;
        }
        let leaving: Vec<String> = group
            .node_ids
            .iter()
            .filter(|id| moving.contains(id.as_str()))
            .cloned()
            .collect();
        if leaving.is_empty() {
            continue;
        }
        let remaining = group.node_ids.len() - leaving.len();
        if remaining < 2 {
            return Err(SkillError::precondition_with(
                format!(
                    "moving nodes out of group '{}' would leave it with {remaining} member(s)",
                    group.id
                ),
                json!({ "groupId": group.id, "remaining": remaining }),
            ));
        }
        removals.insert(group.id, leaving);
    }

    if let Some(target) = target
        && let Some(group) = ctx.graph.read_group(target)
        && group.node_ids.len() + params.node_ids.len() < 2
    {
        return Err(SkillError::precondition(format!(
            "group '{target}' would have fewer than 2 members"
        )));
    }

    if ctx.dry_run {
        return Ok(SkillOutput::ok(json!({
            "removedFrom": removals,
            "added": target.map(|t| json!({ "groupId": t, "nodeIds": params.node_ids })),
        })));
    }

    let padding = ctx.config.group_padding;
    for (group_id, leaving) in &removals {
        ctx.graph.remove_nodes_from_group(group_id, leaving)?;
        recompute_bounds(&mut *ctx.graph, group_id, padding)?;
    }
    if let Some(target) = target {
        ctx.graph.add_nodes_to_group(target, &params.node_ids)?;
        recompute_bounds(&mut *ctx.graph, target, padding)?;
    }
    tracing::debug!(nodes = params.node_ids.len(), sources = removals.len(), group = ?target, "reparented nodes");

    Ok(SkillOutput::ok(json!({
        "removedFrom": removals,
        "added": target.map(|t| json!({ "groupId": t, "nodeIds": params.node_ids })),
    })))
}

#[cfg(test)]
mod tests {
    use nodeloom_types::graph::{Group, Node};
    use serde_json::json;

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{run, sample_store};

    #[tokio::test]
    async fn source_group_cannot_drop_below_two() {
        let mut store = sample_store();
        store.create_nodes(vec![Node::new("d", "task").at(900.0, 0.0)]).unwrap();
        store.create_groups(vec![Group::new("g2", vec!["c".into(), "d".into()])]).unwrap();
        let result = run(
            &mut store,
            "structural.reparent",
            json!({ "nodeIds": ["a"], "targetGroupId": "g2" }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["groupId"], "g1");
        assert!(store.read_group("g1").unwrap().contains("a"));
    }

    #[tokio::test]
    async fn moves_between_groups() {
        let mut store = sample_store();
        store
            .create_nodes(vec![
                Node::new("d", "task").at(900.0, 0.0),
                Node::new("e", "task").at(1200.0, 0.0),
            ])
            .unwrap();
        store
            .add_nodes_to_group("g1", &["c".to_string()])
            .unwrap();
        store.create_groups(vec![Group::new("g2", vec!["d".into(), "e".into()])]).unwrap();

        let result = run(
            &mut store,
            "structural.reparent",
            json!({ "nodeIds": ["c"], "targetGroupId": "g2" }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert!(!store.read_group("g1").unwrap().contains("c"));
        let g2 = store.read_group("g2").unwrap();
        assert!(g2.contains("c"));
        assert!(g2.bounds.x <= 600.0);
    }

    #[tokio::test]
    async fn unknown_target_is_reported() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.reparent",
            json!({ "nodeIds": ["c"], "targetGroupId": "missing" }),
        )
        .await;
        assert!(!result.success);
    }
}
