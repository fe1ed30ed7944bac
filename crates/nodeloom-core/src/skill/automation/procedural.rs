//! Blueprint instantiation with `{{token}}` substitution.

use std::collections::{BTreeMap, HashSet};

use nodeloom_types::graph::{Edge, EntityKind, Group, Node, Position};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::graph_api::GraphApi;
use crate::ids::IdAllocator;
use crate::skill::structural::{EdgeSpec, parse_nodes, prepare_nodes, recompute_bounds};
use crate::skill::{SkillContext, SkillError, SkillOutput};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    #[serde(default)]
    pub nodes: Vec<Value>,
    #[serde(default)]
    pub edges: Vec<Value>,
    #[serde(default)]
    pub groups: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProceduralParams {
    pub blueprint: Blueprint,
    pub count: usize,
    /// Per-iteration token values; reused cyclically when shorter than `count`.
    #[serde(default)]
    pub parameters: Vec<Map<String, Value>>,
    /// Added to every instance's positions once per iteration.
    #[serde(default)]
    pub offset: Position,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupTemplate {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    node_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Token substitution
// ---------------------------------------------------------------------------

/// `{{ name }}` when `s` is exactly one token.
fn whole_token(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
    (!inner.contains("{{") && !inner.contains("}}")).then(|| inner.trim())
}

fn substitute_str(s: &str, tokens: &Map<String, Value>) -> Value {
    if let Some(value) = whole_token(s).and_then(|name| tokens.get(name)) {
        return value.clone();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        match tokens.get(after[..end].trim()) {
            Some(Value::String(text)) => out.push_str(text),
            Some(value) => out.push_str(&value.to_string()),
            // Unknown tokens stay verbatim.
            None => out.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Value::String(out)
}

/// Replace tokens in every string value (not keys) of `value`.
pub fn substitute(value: &Value, tokens: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => substitute_str(s, tokens),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, tokens)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, tokens)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn tokens_for(params: &ProceduralParams, index: usize) -> Map<String, Value> {
    let mut tokens = if params.parameters.is_empty() {
        Map::new()
    } else {
        params.parameters[index % params.parameters.len()].clone()
    };
    tokens.insert("index".into(), json!(index));
    tokens.insert("iteration".into(), json!(index + 1));
    tokens.insert("count".into(), json!(params.count));
    tokens
}

// ---------------------------------------------------------------------------
// Instantiation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Generated {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    groups: Vec<Group>,
    id_maps: Vec<BTreeMap<String, String>>,
}

/// Resolve a reference through the iteration's id map, falling back to an
/// existing graph node.
fn resolve_ref(
    id: &str,
    id_map: &BTreeMap<String, String>,
    existing: &HashSet<String>,
    missing: &mut Vec<String>,
) -> Option<String> {
    if let Some(mapped) = id_map.get(id) {
        return Some(mapped.clone());
    }
    if existing.contains(id) {
        return Some(id.to_string());
    }
    if !missing.iter().any(|m| m == id) {
        missing.push(id.to_string());
    }
    None
}

fn instantiate(graph: &dyn GraphApi, params: &ProceduralParams) -> Result<Generated, SkillError> {
    let existing: HashSet<String> = graph.nodes().into_iter().map(|n| n.id).collect();
    let mut ids = IdAllocator::from_graph(graph);
    let mut out = Generated::default();
    let mut missing = Vec::new();

    for index in 0..params.count {
        let tokens = tokens_for(params, index);
        let mut id_map = BTreeMap::new();

        let mut raw_nodes = Vec::with_capacity(params.blueprint.nodes.len());
        for (k, template) in params.blueprint.nodes.iter().enumerate() {
            let mut node = substitute(template, &tokens);
            let Some(template_id) = node.get("id").and_then(Value::as_str).map(str::to_string) else {
                return Err(SkillError::invalid(format!("blueprint node {k} is missing a string id")));
            };
            if id_map.contains_key(&template_id) {
                return Err(SkillError::invalid(format!("blueprint node id '{template_id}' is repeated")));
            }
            let fresh = ids.fresh(&template_id);
            node["id"] = Value::String(fresh.clone());
            id_map.insert(template_id, fresh);
            raw_nodes.push(node);
        }
        for mut node in parse_nodes(raw_nodes)? {
            node.position = Some(node.position_or_default().offset_scaled(params.offset, index as f64));
            out.nodes.push(node);
        }

        for (k, template) in params.blueprint.edges.iter().enumerate() {
            let spec: EdgeSpec = serde_json::from_value(substitute(template, &tokens))
                .map_err(|e| SkillError::invalid(format!("blueprint edge {k}: {e}")))?;
            let source = resolve_ref(&spec.source, &id_map, &existing, &mut missing);
            let target = resolve_ref(&spec.target, &id_map, &existing, &mut missing);
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            let id = ids.fresh(spec.id.as_deref().unwrap_or("edge"));
            out.edges.push(Edge {
                source_port: spec.source_port,
                target_port: spec.target_port,
                edge_type: spec.edge_type,
                label: spec.label,
                style: spec.style,
                state: spec.state,
                logic: spec.logic,
                routing: spec.routing,
                ..Edge::new(id, source, target)
            });
        }

        for (k, template) in params.blueprint.groups.iter().enumerate() {
            let spec: GroupTemplate = serde_json::from_value(substitute(template, &tokens))
                .map_err(|e| SkillError::invalid(format!("blueprint group {k}: {e}")))?;
            let members: Vec<String> = spec
                .node_ids
                .iter()
                .filter_map(|id| resolve_ref(id, &id_map, &existing, &mut missing))
                .collect();
            let mut group = Group::new(ids.fresh(spec.id.as_deref().unwrap_or("group")), members);
            if let Some(label) = spec.label {
                group.label = label;
            }
            out.groups.push(group);
        }

        out.id_maps.push(id_map);
    }

    if !missing.is_empty() {
        return Err(SkillError::missing(EntityKind::Node, missing));
    }
    Ok(out)
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: ProceduralParams) -> Result<SkillOutput, SkillError> {
    if params.count == 0 {
        return Err(SkillError::invalid("count must be at least 1"));
    }
    if params.count > ctx.config.max_generated_instances {
        return Err(SkillError::invalid(format!(
            "count {} exceeds the limit of {} instances",
            params.count, ctx.config.max_generated_instances
        )));
    }
    if params.blueprint.nodes.is_empty() {
        return Err(SkillError::invalid("blueprint must contain at least one node"));
    }

    let generated = instantiate(&*ctx.graph, &params)?;
    let prepared = prepare_nodes(&*ctx.graph, generated.nodes, true)?;
    let node_ids: Vec<String> = prepared.nodes.iter().map(|n| n.id.clone()).collect();
    let edge_ids: Vec<String> = generated.edges.iter().map(|e| e.id.clone()).collect();
    let group_ids: Vec<String> = generated.groups.iter().map(|g| g.id.clone()).collect();

    let mut data = json!({
        "instances": params.count,
        "nodes": node_ids,
        "edges": edge_ids,
        "groups": group_ids,
        "idMaps": generated.id_maps,
        "applied": !ctx.dry_run,
    });
    if ctx.dry_run {
        data["preview"] = json!({
            "nodes": prepared.nodes,
            "edges": generated.edges,
            "groups": generated.groups,
        });
        return Ok(SkillOutput::ok(data).with_warnings(prepared.warnings));
    }

    let graph = &mut *ctx.graph;
    graph.create_nodes(prepared.nodes)?;
    graph.create_edges(generated.edges)?;
    if !generated.groups.is_empty() {
        graph.create_groups(generated.groups)?;
        for id in &group_ids {
            recompute_bounds(graph, id, ctx.config.group_padding)?;
        }
    }
    info!(
        skill = ctx.skill_id,
        instances = params.count,
        nodes = node_ids.len(),
        "blueprint instantiated"
    );
    Ok(SkillOutput::ok(data).with_warnings(prepared.warnings))
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::substitute;
    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store};

    fn tokens(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn whole_tokens_keep_their_json_type() {
        let t = tokens(json!({ "n": 3, "name": "pump", "cfg": { "on": true } }));
        assert_eq!(substitute(&json!("{{n}}"), &t), json!(3));
        assert_eq!(substitute(&json!("{{ cfg }}"), &t), json!({ "on": true }));
        assert_eq!(substitute(&json!("{{name}}-{{n}}"), &t), json!("pump-3"));
        assert_eq!(substitute(&json!("{{unknown}} x"), &t), json!("{{unknown}} x"));
        assert_eq!(substitute(&json!("open {{ end"), &t), json!("open {{ end"));
    }

    fn blueprint() -> Value {
        json!({
            "blueprint": {
                "nodes": [
                    { "id": "src", "type": "sensor", "label": "Sensor {{iteration}}", "position": { "x": 0, "y": 0 },
                      "data": { "rate": "{{rate}}" } },
                    { "id": "sink", "type": "task", "position": { "x": 200, "y": 0 } }
                ],
                "edges": [
                    { "source": "src", "target": "sink" },
                    { "source": "a", "target": "src" }
                ],
                "groups": [{ "id": "unit", "label": "Unit {{index}}", "nodeIds": ["src", "sink"] }]
            },
            "count": 3,
            "parameters": [{ "rate": 10 }, { "rate": 20 }],
            "offset": { "x": 0, "y": 100 }
        })
    }

    #[tokio::test]
    async fn instantiates_blueprint_with_fresh_ids() {
        let mut store = sample_store();
        let result = run(&mut store, "automation.proceduralGeneration", blueprint()).await;
        assert!(result.success, "{:?}", result.error);
        let data = result.data.unwrap();
        assert_eq!(data["nodes"].as_array().unwrap().len(), 6);
        assert_eq!(data["edges"].as_array().unwrap().len(), 6);
        assert_eq!(store.groups().len(), 4);

        let third_src = data["idMaps"][2]["src"].as_str().unwrap();
        let node = store.node(third_src).unwrap();
        assert_eq!(node.label, "Sensor 3");
        assert_eq!(node.data["rate"], 10);
        assert_eq!(node.position.unwrap().y, 200.0);

        // Edges stay inside their own instance or point at existing nodes.
        let third_sink = data["idMaps"][2]["sink"].as_str().unwrap();
        assert!(store.edges().iter().any(|e| e.source == third_src && e.target == third_sink));
        assert!(store.edges().iter().any(|e| e.source == "a" && e.target == third_src));
    }

    #[tokio::test]
    async fn unknown_references_fail_before_writing() {
        let mut store = sample_store();
        let mut params = blueprint();
        params["blueprint"]["edges"] = json!([{ "source": "src", "target": "nowhere" }]);
        let before = store.snapshot();
        let result = run(&mut store, "automation.proceduralGeneration", params).await;
        assert!(!result.success);
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn count_is_capped() {
        let mut store = sample_store();
        let mut params = blueprint();
        params["count"] = json!(10_000);
        let result = run(&mut store, "automation.proceduralGeneration", params).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("exceeds"));
    }

    #[tokio::test]
    async fn dry_run_previews_instances() {
        let mut store = sample_store();
        let result = dry_run_unchanged(&mut store, "automation.proceduralGeneration", blueprint()).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data.unwrap()["preview"]["nodes"].as_array().unwrap().len(), 6);
    }
}
