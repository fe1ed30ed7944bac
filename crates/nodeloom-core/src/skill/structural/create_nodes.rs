use std::collections::HashSet;

use nodeloom_types::graph::{DEFAULT_NODE_HEIGHT, DEFAULT_NODE_WIDTH, Node};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::graph_api::GraphApi;
use crate::skill::{SkillContext, SkillError, SkillOutput};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodesParams {
    /// Node-like objects. Each needs a non-empty string `id`.
    pub nodes: Vec<Value>,
    /// Keep incoming positions instead of leaving placement to layout.
    #[serde(default)]
    pub preserve_positions: bool,
}

/// Nodes ready for insertion, plus any warnings from sanitising them.
pub(crate) struct PreparedNodes {
    pub nodes: Vec<Node>,
    pub warnings: Vec<String>,
}

/// Turn raw node objects into typed nodes. Every entry needs a string id.
pub(crate) fn parse_nodes(raw: Vec<Value>) -> Result<Vec<Node>, SkillError> {
    let mut errors = Vec::new();
    let mut nodes = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        let has_id = value
            .get("id")
            .and_then(Value::as_str)
            .is_some_and(|id| !id.trim().is_empty());
        if !has_id {
            errors.push(json!({ "index": index, "message": "node is missing a string id" }));
            continue;
        }
        match serde_json::from_value::<Node>(value) {
            Ok(node) => nodes.push(node),
            Err(e) => errors.push(json!({ "index": index, "message": e.to_string() })),
        }
    }
    if errors.is_empty() {
        Ok(nodes)
    } else {
        Err(SkillError::precondition_with(
            format!("{} node(s) are malformed", errors.len()),
            json!({ "errors": errors }),
        ))
    }
}

/// Sanitise nodes for insertion and reject id collisions and a second manifest.
///
/// Shared by every path that adds nodes to the graph.
pub(crate) fn prepare_nodes(
    graph: &dyn GraphApi,
    mut nodes: Vec<Node>,
    preserve_positions: bool,
) -> Result<PreparedNodes, SkillError> {
    let existing = graph.nodes();
    let existing_ids: HashSet<&str> = existing.iter().map(|n| n.id.as_str()).collect();

    let mut seen = HashSet::new();
    let mut duplicate_ids = Vec::new();
    for node in &nodes {
        if existing_ids.contains(node.id.as_str()) || !seen.insert(node.id.as_str()) {
            duplicate_ids.push(node.id.clone());
        }
    }
    if !duplicate_ids.is_empty() {
        return Err(SkillError::precondition_with(
            format!("duplicate node ids: {}", duplicate_ids.join(", ")),
            json!({ "duplicateIds": duplicate_ids }),
        ));
    }

    let existing_manifests = existing.iter().filter(|n| n.is_manifest()).count();
    let incoming_manifests = nodes.iter().filter(|n| n.is_manifest()).count();
    if incoming_manifests > 0 && existing_manifests + incoming_manifests > 1 {
        return Err(SkillError::precondition(
            "a graph may contain only one manifest node",
        ));
    }

    let mut warnings = Vec::new();
    let mut suppressed = 0;
    for node in &mut nodes {
        if !(node.width.is_finite() && node.width > 0.0) {
            node.width = DEFAULT_NODE_WIDTH;
        }
        if !(node.height.is_finite() && node.height > 0.0) {
            node.height = DEFAULT_NODE_HEIGHT;
        }
        if !preserve_positions && node.position.take().is_some() {
            suppressed += 1;
        }
    }
    if suppressed > 0 {
        warnings.push(format!(
            "dropped positions of {suppressed} node(s); layout will place them (set preservePositions to keep them)"
        ));
    }

    Ok(PreparedNodes { nodes, warnings })
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: CreateNodesParams) -> Result<SkillOutput, SkillError> {
    let nodes = parse_nodes(params.nodes)?;
    let prepared = prepare_nodes(&*ctx.graph, nodes, params.preserve_positions)?;
    let count = prepared.nodes.len();

    if ctx.dry_run {
        return Ok(SkillOutput::ok(json!({ "nodes": prepared.nodes, "count": count }))
            .with_warnings(prepared.warnings));
    }

    let created = ctx.graph.create_nodes(prepared.nodes)?;
    tracing::debug!(count, "created nodes");
    Ok(SkillOutput::ok(json!({ "created": created, "count": count })).with_warnings(prepared.warnings))
}

#[cfg(test)]
mod tests {
    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store};
    use serde_json::json;

    #[tokio::test]
    async fn duplicate_ids_fail_and_leave_graph_unchanged() {
        let mut store = sample_store();
        let before = store.snapshot();
        let result = run(
            &mut store,
            "structural.createNodes",
            json!({ "nodes": [{ "id": "new" }, { "id": "a" }] }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["duplicateIds"], json!(["a"]));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn duplicates_within_batch_are_rejected() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.createNodes",
            json!({ "nodes": [{ "id": "x" }, { "id": "x" }] }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["duplicateIds"], json!(["x"]));
    }

    #[tokio::test]
    async fn positions_are_stripped_with_warning() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.createNodes",
            json!({ "nodes": [{ "id": "n1", "type": "task", "position": { "x": 5, "y": 5 } }] }),
        )
        .await;
        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
        let node = store.node("n1").unwrap();
        assert!(node.position.is_none());
        assert_eq!(node.width, nodeloom_types::graph::DEFAULT_NODE_WIDTH);
    }

    #[tokio::test]
    async fn preserve_positions_keeps_them() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.createNodes",
            json!({ "nodes": [{ "id": "n1", "position": { "x": 5, "y": 6 } }], "preservePositions": true }),
        )
        .await;
        assert!(result.success);
        assert!(result.warnings.is_empty());
        assert!(store.node("n1").unwrap().position.is_some());
    }

    #[tokio::test]
    async fn missing_id_is_an_error() {
        let mut store = sample_store();
        let result = run(&mut store, "structural.createNodes", json!({ "nodes": [{ "type": "task" }] })).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn second_manifest_is_rejected() {
        let mut store = sample_store();
        let nodes = json!([{ "id": "m1", "type": "manifest" }, { "id": "m2", "type": "manifest" }]);
        let result = run(&mut store, "structural.createNodes", json!({ "nodes": nodes })).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("one manifest"));
    }

    #[tokio::test]
    async fn dry_run_reports_plan_only() {
        let mut store = sample_store();
        let result = dry_run_unchanged(
            &mut store,
            "structural.createNodes",
            json!({ "nodes": [{ "id": "n1" }, { "id": "n2" }] }),
        )
        .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["count"], 2);
    }
}
