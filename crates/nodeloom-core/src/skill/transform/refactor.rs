use std::collections::{HashMap, HashSet};

use nodeloom_types::graph::{Edge, EdgeKey, EdgePatch, EntityKind, Node, Position};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::plan::{DataDrafts, FieldSpec, MutationPlan, deep_merge, finish};
use crate::ids::IdAllocator;
use crate::path::{delete_data_path, get_data_path, set_data_path};
use crate::skill::structural::{End, rebind_port};
use crate::skill::{SkillContext, SkillError, SkillOutput, default_true, missing_ids};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum RefactorParams {
    Split(SplitParams),
    Merge(MergeParams),
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SplitParams {
    pub source_id: String,
    pub parts: Vec<SplitPart>,
    #[serde(default)]
    pub delete_original: bool,
}

/// One node produced by a split. Unset fields are copied from the source.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SplitPart {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Deep-merged over the source's data.
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub position: Option<Position>,
    /// Offset from the source position, used when `position` is absent.
    #[serde(default)]
    pub offset: Option<Position>,
    #[serde(default)]
    pub redirect_incoming: bool,
    #[serde(default)]
    pub redirect_outgoing: bool,
    /// Node ids to connect into this part.
    #[serde(default)]
    pub connect_from: Vec<String>,
    /// Node ids this part connects out to.
    #[serde(default)]
    pub connect_to: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MergeParams {
    pub source_ids: Vec<String>,
    pub target_id: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub remove_from_source: bool,
    #[serde(default = "default_true")]
    pub retarget_edges: bool,
    /// Delete sources whose data is empty once fields are removed.
    #[serde(default)]
    pub delete_empty_sources: bool,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: RefactorParams) -> Result<SkillOutput, SkillError> {
    match params {
        RefactorParams::Split(p) => split(ctx, p),
        RefactorParams::Merge(p) => merge(ctx, p),
    }
}

// ---------------------------------------------------------------------------
// Split
// ---------------------------------------------------------------------------

fn split(ctx: &mut SkillContext<'_>, params: SplitParams) -> Result<SkillOutput, SkillError> {
    if params.parts.is_empty() {
        return Err(SkillError::invalid("parts must not be empty"));
    }
    let source = ctx
        .graph
        .node(&params.source_id)
        .ok_or_else(|| SkillError::missing(EntityKind::Node, vec![params.source_id.clone()]))?;
    if source.is_manifest() {
        return Err(SkillError::precondition("the manifest node cannot be split"));
    }

    let snapshot = ctx.graph.snapshot();
    let mut ids = IdAllocator::from_graph(&*ctx.graph);

    let taken: Vec<String> = params
        .parts
        .iter()
        .filter_map(|p| p.id.clone())
        .filter(|id| ids.contains(EntityKind::Node, id))
        .collect();
    if !taken.is_empty() {
        return Err(SkillError::precondition_with(
            format!("part id(s) already in use: {}", taken.join(", ")),
            json!({ "duplicateIds": taken }),
        ));
    }

    let part_ids: Vec<String> = params
        .parts
        .iter()
        .map(|p| ids.claim_or_fresh(EntityKind::Node, p.id.as_deref()))
        .collect();

    let known: HashSet<&str> = snapshot
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .chain(part_ids.iter().map(String::as_str))
        .collect();
    let missing = missing_ids(
        params.parts.iter().flat_map(|p| p.connect_from.iter().chain(&p.connect_to)),
        &known,
    );
    if !missing.is_empty() {
        return Err(SkillError::missing(EntityKind::Node, missing));
    }

    let mut plan = MutationPlan::default();
    let origin = source.position_or_default();
    for (i, (part, id)) in params.parts.iter().zip(&part_ids).enumerate() {
        let mut node = source.clone();
        node.id.clone_from(id);
        if let Some(node_type) = &part.node_type {
            node.node_type.clone_from(node_type);
        }
        if let Some(label) = &part.label {
            node.label.clone_from(label);
        }
        if let Some(data) = &part.data {
            let mut merged = Value::Object(std::mem::take(&mut node.data));
            deep_merge(&mut merged, &Value::Object(data.clone()));
            if let Value::Object(map) = merged {
                node.data = map;
            }
        }
        node.position = Some(match (part.position, part.offset) {
            (Some(position), _) => position,
            (None, Some(offset)) => origin.offset(offset),
            (None, None) => origin.offset_scaled(ctx.config.duplicate_offset, (i + 1) as f64),
        });
        plan.create_nodes.push(node);
    }

    // Incoming and outgoing edges of the source, self-loops left alone.
    let incoming: Vec<&Edge> = snapshot
        .edges
        .iter()
        .filter(|e| e.target == source.id && e.source != source.id)
        .collect();
    let outgoing: Vec<&Edge> = snapshot
        .edges
        .iter()
        .filter(|e| e.source == source.id && e.target != source.id)
        .collect();

    let mut redirected = 0;
    let mut moved_incoming = false;
    let mut moved_outgoing = false;
    for (part, id) in params.parts.iter().zip(&part_ids) {
        if part.redirect_incoming {
            for edge in &incoming {
                if moved_incoming {
                    let mut clone = (*edge).clone();
                    clone.id = ids.fresh("edge");
                    clone.target.clone_from(id);
                    plan.create_edges.push(clone);
                } else {
                    plan.update_edge(&edge.id, EdgePatch::retarget_target(id, edge.target_port.clone()));
                }
                redirected += 1;
            }
            moved_incoming = true;
        }
        if part.redirect_outgoing {
            for edge in &outgoing {
                if moved_outgoing {
                    let mut clone = (*edge).clone();
                    clone.id = ids.fresh("edge");
                    clone.source.clone_from(id);
                    plan.create_edges.push(clone);
                } else {
                    plan.update_edge(&edge.id, EdgePatch::retarget_source(id, edge.source_port.clone()));
                }
                redirected += 1;
            }
            moved_outgoing = true;
        }
        for from in &part.connect_from {
            plan.create_edges.push(Edge::new(ids.fresh("edge"), from.clone(), id.clone()));
        }
        for to in &part.connect_to {
            plan.create_edges.push(Edge::new(ids.fresh("edge"), id.clone(), to.clone()));
        }
    }

    for group in snapshot.groups.iter().filter(|g| g.contains(&source.id)) {
        plan.join_group(&group.id, part_ids.clone());
    }
    if params.delete_original {
        plan.delete_node(&source.id);
    }

    let report = json!({
        "sourceId": source.id,
        "parts": part_ids,
        "redirected": redirected,
        "deletedOriginal": params.delete_original,
    });
    finish(ctx, plan, report, Vec::new())
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

fn merge(ctx: &mut SkillContext<'_>, params: MergeParams) -> Result<SkillOutput, SkillError> {
    if params.source_ids.is_empty() {
        return Err(SkillError::invalid("sourceIds must not be empty"));
    }
    if params.source_ids.contains(&params.target_id) {
        return Err(SkillError::invalid("targetId must not be one of the sourceIds"));
    }
    let snapshot = ctx.graph.snapshot();
    let present: HashSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    let missing = missing_ids(params.source_ids.iter().chain([&params.target_id]), &present);
    if !missing.is_empty() {
        return Err(SkillError::missing(EntityKind::Node, missing));
    }
    let nodes: HashMap<&str, &Node> = snapshot.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let target = nodes[params.target_id.as_str()];

    let mut warnings = Vec::new();
    let mut drafts = DataDrafts::new();
    let mut written: HashMap<String, String> = HashMap::new();
    let mut copied = 0;
    for source_id in &params.source_ids {
        let source = nodes[source_id.as_str()];
        for field in &params.fields {
            let Some(value) = get_data_path(&source.data, field.from())? else {
                continue;
            };
            let target_data = drafts.get_or_load(target);
            if let Some(previous) = written.get(field.to())
                && get_data_path(target_data, field.to())?.as_ref() != Some(&value)
            {
                warnings.push(format!(
                    "'{}' from '{source_id}' overwrote the value merged from '{previous}'",
                    field.to()
                ));
            }
            set_data_path(target_data, field.to(), value)?;
            written.insert(field.to().to_string(), source_id.clone());
            copied += 1;
            if params.remove_from_source {
                delete_data_path(drafts.get_or_load(source), field.from())?;
            }
        }
    }

    let emptied: Vec<String> = params
        .source_ids
        .iter()
        .filter(|id| {
            drafts
                .get(id)
                .map_or_else(|| nodes[id.as_str()].data.is_empty(), Map::is_empty)
        })
        .cloned()
        .collect();

    let mut plan = MutationPlan::default();
    drafts.stage(&mut plan);

    let mut retargeted = Vec::new();
    let mut dropped = Vec::new();
    if params.retarget_edges {
        let sources: HashSet<&str> = params.source_ids.iter().map(String::as_str).collect();
        let redirect = |id: &str| {
            if sources.contains(id) {
                params.target_id.clone()
            } else {
                id.to_string()
            }
        };
        let mut keys: HashSet<EdgeKey> = snapshot
            .edges
            .iter()
            .filter(|e| !sources.contains(e.source.as_str()) && !sources.contains(e.target.as_str()))
            .map(Edge::key)
            .collect();
        for edge in snapshot
            .edges
            .iter()
            .filter(|e| sources.contains(e.source.as_str()) || sources.contains(e.target.as_str()))
        {
            let mut moved = edge.clone();
            moved.source = redirect(&edge.source);
            moved.target = redirect(&edge.target);
            let mut patch = EdgePatch::default();
            if moved.source != edge.source {
                moved.source_port = rebind_port(target, End::Source, edge.source_port.as_deref());
                patch = EdgePatch::retarget_source(moved.source.clone(), moved.source_port.clone());
            }
            if moved.target != edge.target {
                moved.target_port = rebind_port(target, End::Target, edge.target_port.as_deref());
                patch.target = Some(moved.target.clone());
                patch.target_port = Some(moved.target_port.clone());
            }
            if moved.source == moved.target || !keys.insert(moved.key()) {
                plan.delete_edge(&edge.id);
                dropped.push(edge.id.clone());
                continue;
            }
            plan.update_edge(&edge.id, patch);
            retargeted.push(edge.id.clone());
        }
    }

    if params.delete_empty_sources {
        for id in &emptied {
            plan.delete_node(id);
        }
    }

    let report = json!({
        "targetId": params.target_id,
        "fieldsCopied": copied,
        "retargeted": retargeted,
        "droppedEdges": dropped,
        "deletedSources": if params.delete_empty_sources { emptied } else { Vec::new() },
    });
    finish(ctx, plan, report, warnings)
}

#[cfg(test)]
mod tests {
    use nodeloom_types::graph::{Edge, Handle, HandleDirection, Node};
    use nodeloom_types::manifest::MutationAuthority;
    use serde_json::json;

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store, store_with_authority};

    #[tokio::test]
    async fn split_redirects_edges_and_joins_groups() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "transform.refactor",
            json!({
                "mode": "split",
                "sourceId": "b",
                "parts": [
                    { "id": "b1", "redirectIncoming": true },
                    { "id": "b2", "redirectOutgoing": true, "data": { "role": "tail" } }
                ],
                "deleteOriginal": true
            }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert!(store.node("b").is_none());
        assert_eq!(store.edge("e1").unwrap().target, "b1");
        assert_eq!(store.edge("e2").unwrap().source, "b2");
        assert_eq!(store.node("b2").unwrap().data["role"], "tail");
        let group = store.read_group("g1").unwrap();
        assert!(group.contains("b1") && group.contains("b2"));
    }

    #[tokio::test]
    async fn split_second_redirecting_part_gets_clones() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "transform.refactor",
            json!({
                "mode": "split",
                "sourceId": "b",
                "parts": [{ "id": "b1", "redirectIncoming": true }, { "id": "b2", "redirectIncoming": true }]
            }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        let into_parts: Vec<Edge> = store
            .edges()
            .into_iter()
            .filter(|e| e.source == "a")
            .collect();
        assert_eq!(into_parts.len(), 2);
        assert!(store.node("b").is_some());
    }

    #[tokio::test]
    async fn split_rejects_taken_part_id() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "transform.refactor",
            json!({ "mode": "split", "sourceId": "b", "parts": [{ "id": "c" }] }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["duplicateIds"], json!(["c"]));
    }

    #[tokio::test]
    async fn merge_copies_fields_and_drops_degenerate_edges() {
        let mut store = sample_store();
        store
            .update_node("a", &nodeloom_types::graph::NodePatch {
                data: Some(json!({ "config": { "rate": 5 } }).as_object().cloned().unwrap()),
                ..Default::default()
            })
            .unwrap();
        let result = run(
            &mut store,
            "transform.refactor",
            json!({
                "mode": "merge",
                "sourceIds": ["a"],
                "targetId": "b",
                "fields": [{ "from": "config.rate", "to": "rate" }],
                "removeFromSource": true,
                "deleteEmptySources": true
            }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(store.node("b").unwrap().data["rate"], 5);
        // a -> b becomes b -> b and is dropped.
        assert!(store.edge("e1").is_none());
        assert_eq!(result.data.unwrap()["droppedEdges"], json!(["e1"]));
        // `config` is left as an empty object, so `a` is not empty.
        assert!(store.node("a").is_some());
    }

    #[tokio::test]
    async fn merge_retargets_and_dedupes() {
        let mut store = sample_store();
        store.create_nodes(vec![Node::new("d", "task")]).unwrap();
        store
            .create_edges(vec![Edge::new("e3", "d", "c"), Edge::new("e4", "d", "a")])
            .unwrap();
        let result = run(
            &mut store,
            "transform.refactor",
            json!({ "mode": "merge", "sourceIds": ["d"], "targetId": "b", "deleteEmptySources": true }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        // d -> c duplicates b -> c.
        assert!(store.edge("e3").is_none());
        assert_eq!(store.edge("e4").unwrap().source, "b");
        assert!(store.node("d").is_none());
    }

    #[tokio::test]
    async fn merge_rebinds_ports_onto_the_target() {
        let mut store = crate::store::Store::default();
        store
            .create_nodes(vec![
                Node::new("x", "task").with_handle(Handle::new("xo", HandleDirection::Output)),
                Node::new("s", "task").with_handle(Handle::new("sin", HandleDirection::Input)),
                Node::new("t", "task").with_handle(Handle::new("tin", HandleDirection::Input)),
            ])
            .unwrap();
        store
            .create_edges(vec![Edge::new("e1", "x", "s").with_ports(Some("xo"), Some("sin"))])
            .unwrap();
        let result = run(
            &mut store,
            "transform.refactor",
            json!({ "mode": "merge", "sourceIds": ["s"], "targetId": "t" }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);

        let edge = store.edge("e1").unwrap();
        assert_eq!(edge.target, "t");
        assert_eq!(edge.source_port.as_deref(), Some("xo"));
        assert_eq!(edge.target_port.as_deref(), Some("tin"));

        let ports = run(&mut store, "validation.ports", json!({})).await;
        assert!(ports.success, "{:?}", ports.data);
    }

    #[tokio::test]
    async fn merge_unbinds_a_port_the_target_cannot_take() {
        let mut store = crate::store::Store::default();
        store
            .create_nodes(vec![
                Node::new("x", "task").with_handle(Handle::new("xo", HandleDirection::Output)),
                Node::new("s", "task").with_handle(Handle::new("sin", HandleDirection::Input)),
                Node::new("t", "task"),
            ])
            .unwrap();
        store
            .create_edges(vec![Edge::new("e1", "x", "s").with_ports(Some("xo"), Some("sin"))])
            .unwrap();
        let result = run(
            &mut store,
            "transform.refactor",
            json!({ "mode": "merge", "sourceIds": ["s"], "targetId": "t" }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(store.edge("e1").unwrap().target_port, None);
    }

    #[tokio::test]
    async fn merge_with_retargeting_is_blocked_when_append_only() {
        let mut store = store_with_authority(MutationAuthority {
            append_only: true,
            ..MutationAuthority::default()
        });
        let result = run(
            &mut store,
            "transform.refactor",
            json!({ "mode": "merge", "sourceIds": ["a"], "targetId": "b" }),
        )
        .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("append-only"));
    }

    #[tokio::test]
    async fn split_dry_run_returns_plan() {
        let mut store = sample_store();
        let result = dry_run_unchanged(
            &mut store,
            "transform.refactor",
            json!({ "mode": "split", "sourceId": "a", "parts": [{}, {}] }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        let data = result.data.unwrap();
        assert_eq!(data["applied"], false);
        assert_eq!(data["plan"]["createNodes"].as_array().unwrap().len(), 2);
    }
}
