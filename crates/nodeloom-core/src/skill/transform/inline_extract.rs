use nodeloom_types::graph::{Edge, EntityKind, Node, Position};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, json};

use super::plan::{DataDrafts, FieldSpec, MutationPlan, finish};
use crate::ids::IdAllocator;
use crate::path::{delete_data_path, get_data_path, set_data_path};
use crate::skill::{SkillContext, SkillError, SkillOutput};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum InlineExtractParams {
    Inline(InlineParams),
    Extract(ExtractParams),
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InlineParams {
    pub source_id: String,
    pub target_id: String,
    pub fields: Vec<FieldSpec>,
    /// Delete the whole source node instead of just the moved fields.
    #[serde(default)]
    pub delete_source: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewNodeSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractParams {
    pub source_id: String,
    pub fields: Vec<FieldSpec>,
    pub new_node: NewNodeSpec,
    #[serde(default)]
    pub strip_fields: bool,
    /// Add an edge from the source to the new node.
    #[serde(default)]
    pub connect: bool,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: InlineExtractParams) -> Result<SkillOutput, SkillError> {
    match params {
        InlineExtractParams::Inline(p) => inline(ctx, p),
        InlineExtractParams::Extract(p) => extract(ctx, p),
    }
}

fn require_node(ctx: &SkillContext<'_>, id: &str) -> Result<Node, SkillError> {
    ctx.graph
        .node(id)
        .ok_or_else(|| SkillError::missing(EntityKind::Node, vec![id.to_string()]))
}

fn inline(ctx: &mut SkillContext<'_>, params: InlineParams) -> Result<SkillOutput, SkillError> {
    if params.fields.is_empty() {
        return Err(SkillError::invalid("fields must not be empty"));
    }
    if params.source_id == params.target_id {
        return Err(SkillError::invalid("sourceId and targetId must differ"));
    }
    let source = require_node(ctx, &params.source_id)?;
    let target = require_node(ctx, &params.target_id)?;
    if params.delete_source && source.is_manifest() {
        return Err(SkillError::precondition("the manifest node cannot be deleted"));
    }

    let mut drafts = DataDrafts::new();
    let mut warnings = Vec::new();
    let mut moved = Vec::new();
    for field in &params.fields {
        let Some(value) = get_data_path(&source.data, field.from())? else {
            warnings.push(format!("'{}' has no '{}'", source.id, field.from()));
            continue;
        };
        set_data_path(drafts.get_or_load(&target), field.to(), value)?;
        if !params.delete_source {
            delete_data_path(drafts.get_or_load(&source), field.from())?;
        }
        moved.push(field.to().to_string());
    }

    let mut plan = MutationPlan::default();
    drafts.stage(&mut plan);
    if params.delete_source {
        plan.delete_node(&source.id);
    }
    let report = json!({
        "sourceId": source.id,
        "targetId": target.id,
        "inlined": moved,
        "deletedSource": params.delete_source,
    });
    finish(ctx, plan, report, warnings)
}

fn extract(ctx: &mut SkillContext<'_>, params: ExtractParams) -> Result<SkillOutput, SkillError> {
    if params.fields.is_empty() {
        return Err(SkillError::invalid("fields must not be empty"));
    }
    let source = require_node(ctx, &params.source_id)?;
    let mut ids = IdAllocator::from_graph(&*ctx.graph);
    if let Some(id) = params.new_node.id.as_deref()
        && ids.contains(EntityKind::Node, id)
    {
        return Err(SkillError::precondition_with(
            format!("node id '{id}' already exists"),
            json!({ "duplicateIds": [id] }),
        ));
    }
    let new_id = ids.claim_or_fresh(EntityKind::Node, params.new_node.id.as_deref());

    let mut data = Map::new();
    let mut warnings = Vec::new();
    let mut drafts = DataDrafts::new();
    for field in &params.fields {
        let Some(value) = get_data_path(&source.data, field.from())? else {
            warnings.push(format!("'{}' has no '{}'", source.id, field.from()));
            continue;
        };
        set_data_path(&mut data, field.to(), value)?;
        if params.strip_fields {
            delete_data_path(drafts.get_or_load(&source), field.from())?;
        }
    }

    let position = params
        .new_node
        .position
        .unwrap_or_else(|| source.position_or_default().offset(ctx.config.duplicate_offset));
    let mut node = Node::new(new_id.clone(), params.new_node.node_type).at(position.x, position.y);
    if let Some(label) = params.new_node.label {
        node = node.with_label(label);
    }
    node.data = data;

    let mut plan = MutationPlan::default();
    plan.create_nodes.push(node);
    if params.connect {
        plan.create_edges
            .push(Edge::new(ids.fresh("edge"), source.id.clone(), new_id.clone()));
    }
    drafts.stage(&mut plan);

    let report = json!({
        "sourceId": source.id,
        "nodeId": new_id,
        "connected": params.connect,
        "strippedFields": params.strip_fields,
    });
    finish(ctx, plan, report, warnings)
}

#[cfg(test)]
mod tests {
    use nodeloom_types::graph::NodePatch;
    use nodeloom_types::manifest::MutationAuthority;
    use serde_json::json;

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{run, sample_store, store_with_authority};
    use crate::store::Store;

    fn with_config(mut store: Store) -> Store {
        store
            .update_node("a", &NodePatch {
                data: json!({ "config": { "rate": 5, "unit": "s" }, "name": "A" }).as_object().cloned(),
                ..NodePatch::default()
            })
            .unwrap();
        store
    }

    #[tokio::test]
    async fn inline_moves_fields() {
        let mut store = with_config(sample_store());
        let result = run(
            &mut store,
            "transform.inlineExtract",
            json!({ "mode": "inline", "sourceId": "a", "targetId": "b", "fields": ["config", "missing"] }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(store.node("b").unwrap().data["config"]["rate"], 5);
        assert!(!store.node("a").unwrap().data.contains_key("config"));
    }

    #[tokio::test]
    async fn inline_can_delete_source() {
        let mut store = with_config(sample_store());
        let result = run(
            &mut store,
            "transform.inlineExtract",
            json!({ "mode": "inline", "sourceId": "a", "targetId": "c", "fields": ["name"], "deleteSource": true }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert!(store.node("a").is_none());
        assert_eq!(store.node("c").unwrap().data["name"], "A");
    }

    #[tokio::test]
    async fn extract_spins_off_connected_node() {
        let mut store = with_config(sample_store());
        let result = run(
            &mut store,
            "transform.inlineExtract",
            json!({
                "mode": "extract",
                "sourceId": "a",
                "fields": [{ "from": "config.rate", "to": "rate" }],
                "newNode": { "id": "cfg", "type": "config", "label": "Config" },
                "stripFields": true,
                "connect": true
            }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        let cfg = store.node("cfg").unwrap();
        assert_eq!(cfg.data["rate"], 5);
        assert_eq!(cfg.position.unwrap().x, 40.0);
        assert_eq!(store.node("a").unwrap().data["config"], json!({ "unit": "s" }));
        assert!(store.edges().iter().any(|e| e.source == "a" && e.target == "cfg"));
    }

    #[tokio::test]
    async fn inline_delete_is_gated_by_policy() {
        let mut store = store_with_authority(MutationAuthority {
            allow_delete: false,
            ..MutationAuthority::default()
        });
        let result = run(
            &mut store,
            "transform.inlineExtract",
            json!({ "mode": "inline", "sourceId": "a", "targetId": "b", "fields": ["x"], "deleteSource": true }),
        )
        .await;
        assert!(!result.success);
        assert!(store.node("a").is_some());
    }
}
