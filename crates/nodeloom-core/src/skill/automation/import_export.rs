//! Subgraph export and id-remapping import.

use std::collections::{BTreeMap, HashSet};

use nodeloom_types::graph::{Edge, EntityKind, GraphSnapshot, Group, Node, Position};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::graph_api::GraphApi;
use crate::ids::IdAllocator;
use crate::skill::structural::{prepare_nodes, recompute_bounds};
use crate::skill::{SkillContext, SkillError, SkillOutput, missing_ids};

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub version: u32,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ImportExportParams {
    Export(ExportParams),
    Import(ImportParams),
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    /// Export only these nodes. Absent means the whole graph.
    #[serde(default)]
    pub node_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportParams {
    pub payload: ExportPayload,
    #[serde(default)]
    pub offset: Option<Position>,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: ImportExportParams) -> Result<SkillOutput, SkillError> {
    match params {
        ImportExportParams::Export(p) => {
            let payload = export_subset(&ctx.graph.snapshot(), p.node_ids.as_deref())?;
            let data = serde_json::to_value(&payload)
                .map_err(|e| SkillError::precondition(format!("export could not be serialized: {e}")))?;
            Ok(SkillOutput::ok(data))
        }
        ImportExportParams::Import(p) => import(ctx, p),
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Restrict `snapshot` to `node_ids`. Edges and groups survive only when
/// every node they reference is in the subset.
pub fn export_subset(snapshot: &GraphSnapshot, node_ids: Option<&[String]>) -> Result<ExportPayload, SkillError> {
    let Some(wanted) = node_ids else {
        return Ok(ExportPayload {
            version: EXPORT_VERSION,
            nodes: snapshot.nodes.clone(),
            edges: snapshot.edges.clone(),
            groups: snapshot.groups.clone(),
        });
    };
    let present: HashSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    let missing = missing_ids(wanted, &present);
    if !missing.is_empty() {
        return Err(SkillError::missing(EntityKind::Node, missing));
    }

    let keep: HashSet<&str> = wanted.iter().map(String::as_str).collect();
    Ok(ExportPayload {
        version: EXPORT_VERSION,
        nodes: snapshot
            .nodes
            .iter()
            .filter(|n| keep.contains(n.id.as_str()))
            .cloned()
            .collect(),
        edges: snapshot
            .edges
            .iter()
            .filter(|e| keep.contains(e.source.as_str()) && keep.contains(e.target.as_str()))
            .cloned()
            .collect(),
        groups: snapshot
            .groups
            .iter()
            .filter(|g| g.node_ids.iter().all(|id| keep.contains(id.as_str())))
            .cloned()
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdMap {
    nodes: BTreeMap<String, String>,
    edges: BTreeMap<String, String>,
    groups: BTreeMap<String, String>,
}

/// The payload with every id replaced, plus what was dropped on the way.
struct Remapped {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    groups: Vec<Group>,
    id_map: IdMap,
    warnings: Vec<String>,
}

fn remap(graph: &dyn GraphApi, payload: ExportPayload, offset: Option<Position>) -> Remapped {
    let mut ids = IdAllocator::from_graph(graph);
    let mut has_manifest = graph.nodes().iter().any(Node::is_manifest);
    let mut id_map = IdMap::default();
    let mut warnings = Vec::new();

    let mut nodes = Vec::with_capacity(payload.nodes.len());
    for mut node in payload.nodes {
        if node.is_manifest() {
            if has_manifest {
                warnings.push(format!("skipped manifest '{}': the graph already has one", node.id));
                continue;
            }
            has_manifest = true;
        }
        let fresh = ids.fresh(&node.id);
        id_map.nodes.insert(std::mem::replace(&mut node.id, fresh.clone()), fresh);
        if let (Some(position), Some(delta)) = (node.position, offset) {
            node.position = Some(position.offset(delta));
        }
        nodes.push(node);
    }

    let mut edges = Vec::with_capacity(payload.edges.len());
    for mut edge in payload.edges {
        let (Some(source), Some(target)) = (id_map.nodes.get(&edge.source), id_map.nodes.get(&edge.target)) else {
            warnings.push(format!("skipped edge '{}': an endpoint is not part of the import", edge.id));
            continue;
        };
        edge.source = source.clone();
        edge.target = target.clone();
        let fresh = ids.fresh(&edge.id);
        id_map.edges.insert(std::mem::replace(&mut edge.id, fresh.clone()), fresh);
        edges.push(edge);
    }

    let mut groups = Vec::with_capacity(payload.groups.len());
    for mut group in payload.groups {
        let members: Vec<String> = group
            .node_ids
            .iter()
            .filter_map(|id| id_map.nodes.get(id).cloned())
            .collect();
        if members.len() < 2 {
            warnings.push(format!("skipped group '{}': fewer than two imported members", group.id));
            continue;
        }
        group.node_ids = members;
        let fresh = ids.fresh(&group.id);
        id_map.groups.insert(std::mem::replace(&mut group.id, fresh.clone()), fresh);
        groups.push(group);
    }

    Remapped {
        nodes,
        edges,
        groups,
        id_map,
        warnings,
    }
}

fn import(ctx: &mut SkillContext<'_>, params: ImportParams) -> Result<SkillOutput, SkillError> {
    if params.payload.version != EXPORT_VERSION {
        return Err(SkillError::invalid(format!(
            "unsupported payload version {} (expected {EXPORT_VERSION})",
            params.payload.version
        )));
    }
    let remapped = remap(&*ctx.graph, params.payload, params.offset);
    let prepared = prepare_nodes(&*ctx.graph, remapped.nodes, true)?;

    let created = json!({
        "nodes": prepared.nodes.iter().map(|n| &n.id).collect::<Vec<_>>(),
        "edges": remapped.edges.iter().map(|e| &e.id).collect::<Vec<_>>(),
        "groups": remapped.groups.iter().map(|g| &g.id).collect::<Vec<_>>(),
    });
    let data = json!({
        "idMap": remapped.id_map,
        "created": created,
        "applied": !ctx.dry_run,
    });
    let mut warnings = remapped.warnings;
    warnings.extend(prepared.warnings);
    if ctx.dry_run {
        return Ok(SkillOutput::ok(data).with_warnings(warnings));
    }

    let graph = &mut *ctx.graph;
    let node_count = prepared.nodes.len();
    graph.create_nodes(prepared.nodes)?;
    if !remapped.edges.is_empty() {
        graph.create_edges(remapped.edges)?;
    }
    if !remapped.groups.is_empty() {
        let group_ids = graph.create_groups(remapped.groups)?;
        for id in &group_ids {
            recompute_bounds(graph, id, ctx.config.group_padding)?;
        }
    }
    info!(skill = ctx.skill_id, nodes = node_count, "payload imported");
    Ok(SkillOutput::ok(data).with_warnings(warnings))
}
