use std::collections::{HashMap, HashSet};

use nodeloom_types::graph::{Edge, EdgeKey, EntityKind, Handle, Node};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::graph_api::GraphApi;
use crate::ids::IdAllocator;
use crate::skill::{SkillContext, SkillError, SkillOutput, default_true};

/// One edge to create. Ports are optional when they can be resolved.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, alias = "sourceHandle")]
    pub source_port: Option<String>,
    #[serde(default, alias = "targetHandle")]
    pub target_port: Option<String>,
    #[serde(rename = "type", default)]
    pub edge_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub style: Option<Value>,
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub logic: Option<Value>,
    #[serde(default)]
    pub routing: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEdgesParams {
    pub edges: Vec<EdgeSpec>,
    /// Pick the first compatible handle when several could match.
    #[serde(default)]
    pub allow_handle_inference: bool,
    /// Fail the batch on a duplicate connection instead of skipping it.
    #[serde(default = "default_true")]
    pub fail_on_duplicate: bool,
}

/// Edges ready for insertion.
pub(crate) struct ResolvedEdges {
    pub edges: Vec<Edge>,
    /// Indices (into the input) of specs skipped as duplicates.
    pub skipped: Vec<usize>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Copy)]
pub(crate) enum End {
    Source,
    Target,
}

impl End {
    fn as_str(self) -> &'static str {
        match self {
            End::Source => "source",
            End::Target => "target",
        }
    }

    fn accepts(self, handle: &Handle) -> bool {
        match self {
            End::Source => handle.direction.can_source(),
            End::Target => handle.direction.can_target(),
        }
    }
}

/// Resolve the port on one end of an edge.
///
/// A node without handles takes no port. A named port must exist and face
/// the right way; an omitted one is inferred when exactly one handle fits,
/// or when inference is allowed.
fn resolve_port(
    node: &Node,
    end: End,
    requested: Option<&str>,
    allow_inference: bool,
) -> Result<Option<String>, String> {
    if let Some(port) = requested {
        return match node.handle(port) {
            None => Err(format!("node '{}' has no handle '{port}'", node.id)),
            Some(handle) if !end.accepts(handle) => Err(format!(
                "handle '{port}' on node '{}' is {} and cannot be an edge {}",
                node.id,
                handle.direction.as_str(),
                end.as_str()
            )),
            Some(_) => Ok(Some(port.to_string())),
        };
    }
    if node.handles.is_empty() {
        return Ok(None);
    }
    let candidates: Vec<&Handle> = node.handles.iter().filter(|h| end.accepts(h)).collect();
    match candidates.as_slice() {
        [] => Err(format!("node '{}' has no handle usable as an edge {}", node.id, end.as_str())),
        [only] => Ok(Some(only.id.clone())),
        [first, ..] if allow_inference => Ok(Some(first.id.clone())),
        many => Err(format!(
            "{} port on node '{}' is ambiguous between {}",
            end.as_str(),
            node.id,
            many.iter().map(|h| h.id.as_str()).collect::<Vec<_>>().join(", ")
        )),
    }
}

/// Port for an endpoint moved onto `node`.
///
/// Keeps `current` when `node` has it facing the right way, falls back to the
/// only usable handle, and otherwise leaves the endpoint unbound.
pub(crate) fn rebind_port(node: &Node, end: End, current: Option<&str>) -> Option<String> {
    if let Some(port) = current
        && node.handle(port).is_some_and(|h| end.accepts(h))
    {
        return Some(port.to_string());
    }
    match node.handles.iter().filter(|h| end.accepts(h)).collect::<Vec<_>>().as_slice() {
        [only] => Some(only.id.clone()),
        _ => None,
    }
}

/// Resolve endpoints and ports, assign ids, and filter duplicate connections.
pub(crate) fn resolve_edges(
    graph: &dyn GraphApi,
    specs: Vec<EdgeSpec>,
    allow_inference: bool,
    fail_on_duplicate: bool,
) -> Result<ResolvedEdges, SkillError> {
    let nodes: HashMap<String, Node> = graph.nodes().into_iter().map(|n| (n.id.clone(), n)).collect();
    let mut keys: HashSet<EdgeKey> = graph.edges().iter().map(Edge::key).collect();
    let mut ids = IdAllocator::from_graph(graph);

    let mut errors = Vec::new();
    let mut duplicates = Vec::new();
    let mut skipped = Vec::new();
    let mut edges = Vec::with_capacity(specs.len());

    for (index, spec) in specs.into_iter().enumerate() {
        let (source, target) = match (nodes.get(&spec.source), nodes.get(&spec.target)) {
            (Some(s), Some(t)) => (s, t),
            (s, t) => {
                for (missing, end) in [(s.is_none(), &spec.source), (t.is_none(), &spec.target)] {
                    if missing {
                        errors.push(json!({ "index": index, "message": format!("node '{end}' not found") }));
                    }
                }
                continue;
            }
        };

        let source_port = resolve_port(source, End::Source, spec.source_port.as_deref(), allow_inference);
        let target_port = resolve_port(target, End::Target, spec.target_port.as_deref(), allow_inference);
        let (source_port, target_port) = match (source_port, target_port) {
            (Ok(s), Ok(t)) => (s, t),
            (s, t) => {
                for message in [s.err(), t.err()].into_iter().flatten() {
                    errors.push(json!({ "index": index, "message": message }));
                }
                continue;
            }
        };

        if let Some(id) = spec.id.as_deref()
            && ids.contains(EntityKind::Edge, id)
        {
            errors.push(json!({ "index": index, "message": format!("edge id '{id}' is already in use") }));
            continue;
        }

        let mut edge = Edge::new(String::new(), spec.source, spec.target).with_ports(source_port, target_port);
        let key = edge.key();
        if !keys.insert(key.clone()) {
            duplicates.push(json!({ "index": index, "key": key }));
            skipped.push(index);
            continue;
        }
        edge.id = ids.claim_or_fresh(EntityKind::Edge, spec.id.as_deref());
        edge.edge_type = spec.edge_type;
        edge.label = spec.label;
        edge.style = spec.style;
        edge.state = spec.state;
        edge.logic = spec.logic;
        edge.routing = spec.routing;
        edges.push(edge);
    }

    if !errors.is_empty() {
        return Err(SkillError::precondition_with(
            format!("{} edge(s) could not be resolved", errors.len()),
            json!({ "errors": errors }),
        ));
    }

    let mut warnings = Vec::new();
    if !duplicates.is_empty() {
        if fail_on_duplicate {
            return Err(SkillError::precondition_with(
                format!("{} duplicate connection(s)", duplicates.len()),
                json!({ "duplicates": duplicates }),
            ));
        }
        warnings.push(format!("skipped {} duplicate connection(s)", duplicates.len()));
    }

    Ok(ResolvedEdges { edges, skipped, warnings })
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: CreateEdgesParams) -> Result<SkillOutput, SkillError> {
    let resolved = resolve_edges(
        &*ctx.graph,
        params.edges,
        params.allow_handle_inference,
        params.fail_on_duplicate,
    )?;
    let count = resolved.edges.len();

    if ctx.dry_run {
        return Ok(SkillOutput::ok(json!({
            "edges": resolved.edges,
            "count": count,
            "skipped": resolved.skipped,
        }))
        .with_warnings(resolved.warnings));
    }

    let created = ctx.graph.create_edges(resolved.edges)?;
    tracing::debug!(count, skipped = resolved.skipped.len(), "created edges");
    Ok(SkillOutput::ok(json!({
        "created": created,
        "count": count,
        "skipped": resolved.skipped,
    }))
    .with_warnings(resolved.warnings))
}

#[cfg(test)]
mod tests {
    use nodeloom_types::graph::{Handle, HandleDirection, Node};
    use serde_json::json;

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store};
    use crate::store::Store;

    fn ported_store() -> Store {
        let mut store = sample_store();
        store
            .create_nodes(vec![
                Node::new("src", "task")
                    .with_handle(Handle::new("out", HandleDirection::Output))
                    .with_handle(Handle::new("in", HandleDirection::Input)),
                Node::new("dst", "task")
                    .with_handle(Handle::new("in1", HandleDirection::Input))
                    .with_handle(Handle::new("in2", HandleDirection::Input)),
            ])
            .unwrap();
        store
    }

    #[tokio::test]
    async fn creates_edge_with_fresh_id() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.createEdges",
            json!({ "edges": [{ "source": "a", "target": "c" }] }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        let created = result.data.unwrap()["created"][0].as_str().unwrap().to_string();
        assert!(created.starts_with("edge-"));
        assert_eq!(store.edges().len(), 3);
    }

    #[tokio::test]
    async fn edge_id_is_checked_against_edges_only() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.createEdges",
            json!({ "edges": [{ "id": "a", "source": "a", "target": "c" }] }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(store.edge("a").unwrap().target, "c");

        let result = run(
            &mut store,
            "structural.createEdges",
            json!({ "edges": [{ "id": "e1", "source": "c", "target": "a" }] }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(store.edges().len(), 3);
    }

    #[tokio::test]
    async fn missing_endpoint_fails_with_errors() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.createEdges",
            json!({ "edges": [{ "source": "a", "target": "ghost" }] }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["errors"].as_array().unwrap().len(), 1);
        assert_eq!(store.edges().len(), 2);
    }

    #[tokio::test]
    async fn single_compatible_handle_is_inferred() {
        let mut store = ported_store();
        let result = run(
            &mut store,
            "structural.createEdges",
            json!({ "edges": [{ "id": "p1", "source": "src", "target": "dst", "targetPort": "in2" }] }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        let edge = store.edge("p1").unwrap();
        assert_eq!(edge.source_port.as_deref(), Some("out"));
        assert_eq!(edge.target_port.as_deref(), Some("in2"));
    }

    #[tokio::test]
    async fn ambiguous_handle_needs_inference_flag() {
        let mut store = ported_store();
        let params = json!({ "edges": [{ "source": "src", "target": "dst" }] });
        let result = run(&mut store, "structural.createEdges", params.clone()).await;
        assert!(!result.success);
        assert!(result.data.unwrap()["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("ambiguous"));

        let mut params = params;
        params["allowHandleInference"] = json!(true);
        let result = run(&mut store, "structural.createEdges", params).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn wrong_direction_is_rejected() {
        let mut store = ported_store();
        let result = run(
            &mut store,
            "structural.createEdges",
            json!({ "edges": [{ "source": "src", "sourcePort": "in", "target": "dst", "targetPort": "in1" }] }),
        )
        .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn duplicates_fail_or_skip() {
        let mut store = sample_store();
        let params = json!({ "edges": [{ "source": "a", "target": "b" }] });
        let result = run(&mut store, "structural.createEdges", params).await;
        assert!(!result.success);
        assert!(result.data.unwrap().get("duplicates").is_some());

        let params = json!({
            "edges": [{ "source": "a", "target": "b" }, { "source": "c", "target": "a" }],
            "failOnDuplicate": false
        });
        let result = run(&mut store, "structural.createEdges", params).await;
        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.data.unwrap()["skipped"], json!([0]));
        assert_eq!(store.edges().len(), 3);
    }

    #[tokio::test]
    async fn dry_run_does_not_connect() {
        let mut store = sample_store();
        let result = dry_run_unchanged(
            &mut store,
            "structural.createEdges",
            json!({ "edges": [{ "source": "c", "target": "a" }] }),
        )
        .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["count"], 1);
    }
}
