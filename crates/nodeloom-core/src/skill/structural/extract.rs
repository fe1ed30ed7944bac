use std::collections::HashSet;

use nodeloom_types::graph::{EntityKind, Group, Node};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::geometry::group_bounds;
use super::grouping::new_group_id;
use crate::skill::{SkillContext, SkillError, SkillOutput, missing_ids};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractSubgraphParams {
    pub node_ids: Vec<String>,
    /// Wrap the extracted nodes in a new group.
    #[serde(default)]
    pub create_group: bool,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub group_label: Option<String>,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: ExtractSubgraphParams) -> Result<SkillOutput, SkillError> {
    let snapshot = ctx.graph.snapshot();
    let present: HashSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    let missing = missing_ids(&params.node_ids, &present);
    if !missing.is_empty() {
        return Err(SkillError::missing(EntityKind::Node, missing));
    }

    let selected: HashSet<&str> = params.node_ids.iter().map(String::as_str).collect();
    let nodes: Vec<Node> = snapshot
        .nodes
        .iter()
        .filter(|n| selected.contains(n.id.as_str()))
        .cloned()
        .collect();
    let edges: Vec<_> = snapshot
        .edges
        .iter()
        .filter(|e| selected.contains(e.source.as_str()) && selected.contains(e.target.as_str()))
        .cloned()
        .collect();
    let groups: Vec<_> = snapshot
        .groups
        .iter()
        .filter(|g| g.node_ids.iter().all(|id| selected.contains(id.as_str())))
        .cloned()
        .collect();

    let mut created_group = None;
    if params.create_group {
        if nodes.len() < 2 {
            return Err(SkillError::precondition("a group needs at least 2 nodes"));
        }
        let id = new_group_id(&*ctx.graph, params.group_id.as_deref())?;
        let mut group = Group::new(id, nodes.iter().map(|n| n.id.clone()).collect());
        if let Some(label) = params.group_label {
            group.label = label;
        }
        if let Some(bounds) = group_bounds(&nodes, ctx.config.group_padding) {
            group.bounds = bounds;
        }
        if !ctx.dry_run {
            ctx.graph.create_groups(vec![group.clone()])?;
        }
        created_group = Some(group);
    }

    Ok(SkillOutput::ok(json!({
        "nodes": nodes,
        "edges": edges,
        "groups": groups,
        "createdGroup": created_group,
    })))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store};

    #[tokio::test]
    async fn returns_induced_subgraph() {
        let mut store = sample_store();
        let result = run(&mut store, "structural.extractSubgraph", json!({ "nodeIds": ["a", "b"] })).await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(data["edges"].as_array().unwrap().len(), 1);
        assert_eq!(data["groups"][0]["id"], "g1");
        assert!(data["createdGroup"].is_null());
    }

    #[tokio::test]
    async fn can_wrap_in_group() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.extractSubgraph",
            json!({ "nodeIds": ["b", "c"], "createGroup": true, "groupId": "sub" }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(store.read_group("sub").unwrap().node_ids.len(), 2);
    }

    #[tokio::test]
    async fn wrapping_group_id_must_be_free() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.extractSubgraph",
            json!({ "nodeIds": ["b", "c"], "createGroup": true, "groupId": "g1" }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["duplicateIds"], json!(["g1"]));
        assert_eq!(store.groups().len(), 1);
    }

    #[tokio::test]
    async fn read_only_extract_supports_dry_run() {
        let mut store = sample_store();
        let result = dry_run_unchanged(
            &mut store,
            "structural.extractSubgraph",
            json!({ "nodeIds": ["b", "c"], "createGroup": true }),
        )
        .await;
        assert!(result.success);
        assert!(result.data.unwrap()["createdGroup"].is_object());
    }
}
