use std::fmt::Write as _;

use nodeloom_types::graph::GraphSnapshot;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::skill::{SkillContext, SkillError, SkillOutput, default_true};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Json,
    Markdown,
    Csv,
}

impl ArtifactFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Markdown => "text/markdown",
            Self::Csv => "text/csv",
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompileArtifactParams {
    #[serde(default)]
    pub format: ArtifactFormat,
    #[serde(default = "default_true")]
    pub include_manifest: bool,
}

/// Drop manifest nodes and every reference to them.
fn without_manifest(mut snapshot: GraphSnapshot) -> GraphSnapshot {
    let manifests: Vec<String> = snapshot
        .nodes
        .iter()
        .filter(|n| n.is_manifest())
        .map(|n| n.id.clone())
        .collect();
    if manifests.is_empty() {
        return snapshot;
    }
    snapshot.nodes.retain(|n| !n.is_manifest());
    snapshot
        .edges
        .retain(|e| !manifests.iter().any(|m| e.touches(m)));
    for group in &mut snapshot.groups {
        group.node_ids.retain(|id| !manifests.contains(id));
    }
    snapshot
}

fn graph_title(snapshot: &GraphSnapshot) -> String {
    snapshot
        .manifest()
        .and_then(|m| m.data.get("identity"))
        .and_then(|identity| identity.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("Graph")
        .to_string()
}

/// Escape a markdown table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn render_markdown(snapshot: &GraphSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", graph_title(snapshot));

    let _ = writeln!(out, "## Nodes ({})\n", snapshot.nodes.len());
    out.push_str("| id | type | label |\n|---|---|---|\n");
    for node in &snapshot.nodes {
        let _ = writeln!(out, "| {} | {} | {} |", cell(&node.id), cell(&node.node_type), cell(&node.label));
    }

    let _ = writeln!(out, "\n## Edges ({})\n", snapshot.edges.len());
    out.push_str("| id | source | target |\n|---|---|---|\n");
    for edge in &snapshot.edges {
        let source = match &edge.source_port {
            Some(port) => format!("{}.{port}", edge.source),
            None => edge.source.clone(),
        };
        let target = match &edge.target_port {
            Some(port) => format!("{}.{port}", edge.target),
            None => edge.target.clone(),
        };
        let _ = writeln!(out, "| {} | {} | {} |", cell(&edge.id), cell(&source), cell(&target));
    }

    if !snapshot.groups.is_empty() {
        let _ = writeln!(out, "\n## Groups ({})\n", snapshot.groups.len());
        for group in &snapshot.groups {
            let _ = writeln!(out, "- **{}** {}: {}", group.id, group.label, group.node_ids.join(", "));
        }
    }
    out
}

/// Quote a CSV field when it needs it.
fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn csv_row(fields: [&str; 7]) -> String {
    let mut row = fields.map(csv_field).join(",");
    row.push('\n');
    row
}

fn render_csv(snapshot: &GraphSnapshot) -> String {
    let mut out = csv_row(["kind", "id", "type", "label", "source", "target", "members"]);
    for node in &snapshot.nodes {
        out.push_str(&csv_row(["node", &node.id, &node.node_type, &node.label, "", "", ""]));
    }
    for edge in &snapshot.edges {
        out.push_str(&csv_row([
            "edge",
            &edge.id,
            edge.edge_type.as_deref().unwrap_or(""),
            edge.label.as_deref().unwrap_or(""),
            &edge.source,
            &edge.target,
            "",
        ]));
    }
    for group in &snapshot.groups {
        let members = group.node_ids.join(";");
        out.push_str(&csv_row(["group", &group.id, "", &group.label, "", "", &members]));
    }
    out
}

pub fn compile(snapshot: &GraphSnapshot, format: ArtifactFormat) -> Result<String, SkillError> {
    match format {
        ArtifactFormat::Json => serde_json::to_string_pretty(snapshot)
            .map_err(|e| SkillError::precondition(format!("graph could not be serialized: {e}"))),
        ArtifactFormat::Markdown => Ok(render_markdown(snapshot)),
        ArtifactFormat::Csv => Ok(render_csv(snapshot)),
    }
}

pub(super) fn run(ctx: &SkillContext<'_>, params: CompileArtifactParams) -> Result<SkillOutput, SkillError> {
    let mut snapshot = ctx.graph.snapshot();
    if !params.include_manifest {
        snapshot = without_manifest(snapshot);
    }
    let content = compile(&snapshot, params.format)?;
    let checksum = format!("{:x}", Sha256::digest(content.as_bytes()));
    Ok(SkillOutput::ok(json!({
        "format": params.format,
        "mimeType": params.format.mime_type(),
        "checksum": checksum,
        "stats": {
            "nodes": snapshot.nodes.len(),
            "edges": snapshot.edges.len(),
            "groups": snapshot.groups.len(),
            "bytes": content.len(),
        },
        "content": content,
    })))
}
