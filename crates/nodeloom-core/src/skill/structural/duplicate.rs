use std::collections::HashSet;

use nodeloom_types::graph::{EntityKind, Position};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::graph_api::DuplicateOptions;
use crate::skill::{SkillContext, SkillError, SkillOutput, missing_ids};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateParams {
    pub node_ids: Vec<String>,
    /// Clone edges whose endpoints are both duplicated.
    #[serde(default)]
    pub include_edges: bool,
    /// Defaults to the configured duplicate offset.
    #[serde(default)]
    pub offset: Option<Position>,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: DuplicateParams) -> Result<SkillOutput, SkillError> {
    if params.node_ids.is_empty() {
        return Err(SkillError::invalid("nodeIds must not be empty"));
    }
    let nodes = ctx.graph.nodes();
    let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let missing = missing_ids(&params.node_ids, &present);
    if !missing.is_empty() {
        return Err(SkillError::missing(EntityKind::Node, missing));
    }
    if nodes
        .iter()
        .any(|n| n.is_manifest() && params.node_ids.contains(&n.id))
    {
        return Err(SkillError::precondition("the manifest node cannot be duplicated"));
    }

    let offset = params.offset.unwrap_or(ctx.config.duplicate_offset);
    if ctx.dry_run {
        return Ok(SkillOutput::ok(json!({
            "count": params.node_ids.len(),
            "includeEdges": params.include_edges,
            "offset": offset,
        })));
    }

    let outcome = ctx.graph.duplicate_nodes(
        &params.node_ids,
        &DuplicateOptions {
            include_edges: params.include_edges,
            offset,
        },
    )?;
    tracing::debug!(nodes = outcome.nodes.len(), edges = outcome.edges.len(), "duplicated nodes");
    Ok(SkillOutput::ok(serde_json::to_value(&outcome).unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store};

    #[tokio::test]
    async fn duplicates_with_default_offset() {
        let mut store = sample_store();
        let result = run(&mut store, "structural.duplicate", json!({ "nodeIds": ["a", "b"], "includeEdges": true })).await;
        assert!(result.success, "{:?}", result.error);
        let data = result.data.unwrap();
        let clone_id = data["idMap"]["a"].as_str().unwrap();
        let clone = store.node(clone_id).unwrap();
        assert_eq!(clone.position.unwrap().x, 40.0);
        assert_eq!(data["edges"].as_array().unwrap().len(), 1);
        assert_eq!(store.nodes().len(), 5);
    }

    #[tokio::test]
    async fn missing_node_fails() {
        let mut store = sample_store();
        let result = run(&mut store, "structural.duplicate", json!({ "nodeIds": ["zz"] })).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn dry_run_describes_plan() {
        let mut store = sample_store();
        let result = dry_run_unchanged(
            &mut store,
            "structural.duplicate",
            json!({ "nodeIds": ["a"], "includeEdges": false, "offset": { "x": 10, "y": 0 } }),
        )
        .await;
        let data = result.data.unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["includeEdges"], false);
        assert_eq!(data["offset"]["x"], 10.0);
    }
}
