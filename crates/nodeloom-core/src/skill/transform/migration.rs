use std::collections::HashSet;

use nodeloom_types::graph::{EntityKind, Node, NodePatch, PatchMode};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::plan::{DataDrafts, FieldSpec, MutationPlan, deep_merge, finish};
use crate::path::{delete_data_path, get_data_path, set_data_path};
use crate::skill::{SkillContext, SkillError, SkillOutput, missing_ids};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypeMigrationParams {
    #[serde(default)]
    pub node_ids: Option<Vec<String>>,
    /// Select every node of this type when `nodeIds` is absent.
    #[serde(default)]
    pub from_type: Option<String>,
    #[serde(default)]
    pub remap: Vec<FieldSpec>,
    #[serde(default)]
    pub remove: Vec<String>,
    /// Path to value, written only where the path is absent.
    #[serde(default)]
    pub defaults: Map<String, Value>,
    /// Path to value, always written.
    #[serde(default)]
    pub overrides: Map<String, Value>,
    #[serde(default)]
    pub new_type: Option<String>,
    #[serde(default)]
    pub new_label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePatch {
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub extensions: Option<Map<String, Value>>,
    #[serde(rename = "type", default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaUpgradeParams {
    #[serde(default)]
    pub node_ids: Option<Vec<String>>,
    #[serde(default)]
    pub node_type: Option<String>,
    pub target_version: String,
    #[serde(default)]
    pub patch: UpgradePatch,
    /// Record `targetVersion` under this key of the manifest's
    /// `dependencies.schemaVersions`.
    #[serde(default)]
    pub subsystem: Option<String>,
}

/// Resolve the node selection: explicit ids (all must exist), else every
/// non-manifest node matching `node_type`, else every non-manifest node when
/// `all_by_default` is set.
fn select(
    nodes: &[Node],
    node_ids: Option<&[String]>,
    node_type: Option<&str>,
    all_by_default: bool,
) -> Result<Vec<Node>, SkillError> {
    if let Some(ids) = node_ids {
        let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let missing = missing_ids(ids, &present);
        if !missing.is_empty() {
            return Err(SkillError::missing(EntityKind::Node, missing));
        }
        return Ok(nodes.iter().filter(|n| ids.contains(&n.id)).cloned().collect());
    }
    match node_type {
        Some(node_type) => Ok(nodes
            .iter()
            .filter(|n| !n.is_manifest() && n.node_type == node_type)
            .cloned()
            .collect()),
        None if all_by_default => Ok(nodes.iter().filter(|n| !n.is_manifest()).cloned().collect()),
        None => Err(SkillError::invalid("either nodeIds or a node type selector is required")),
    }
}

// ---------------------------------------------------------------------------
// typeMigration
// ---------------------------------------------------------------------------

pub(super) fn type_migration(
    ctx: &mut SkillContext<'_>,
    params: TypeMigrationParams,
) -> Result<SkillOutput, SkillError> {
    let nodes = ctx.graph.nodes();
    let selected = select(&nodes, params.node_ids.as_deref(), params.from_type.as_deref(), false)?;
    let mut warnings = Vec::new();
    if selected.is_empty() {
        warnings.push("no nodes matched the selection".to_string());
    }

    let mut drafts = DataDrafts::new();
    for node in &selected {
        let data = drafts.get_or_load(node);
        for field in &params.remap {
            if let Some(value) = get_data_path(data, field.from())? {
                delete_data_path(data, field.from())?;
                set_data_path(data, field.to(), value)?;
            }
        }
        for path in &params.remove {
            delete_data_path(data, path)?;
        }
        for (path, value) in &params.defaults {
            if get_data_path(data, path)?.is_none() {
                set_data_path(data, path, value.clone())?;
            }
        }
        for (path, value) in &params.overrides {
            set_data_path(data, path, value.clone())?;
        }
    }

    let mut plan = MutationPlan::default();
    drafts.stage(&mut plan);
    if params.new_type.is_some() || params.new_label.is_some() {
        for node in &selected {
            plan.update_node(
                &node.id,
                NodePatch {
                    node_type: params.new_type.clone(),
                    label: params.new_label.clone(),
                    ..NodePatch::default()
                },
            );
        }
    }

    let migrated: Vec<&str> = plan.node_updates.iter().map(|u| u.id.as_str()).collect();
    let report = json!({
        "selected": selected.len(),
        "migrated": migrated,
        "newType": params.new_type,
    });
    finish(ctx, plan, report, warnings)
}

// ---------------------------------------------------------------------------
// schemaUpgrade
// ---------------------------------------------------------------------------

pub(super) fn schema_upgrade(
    ctx: &mut SkillContext<'_>,
    params: SchemaUpgradeParams,
) -> Result<SkillOutput, SkillError> {
    if params.target_version.trim().is_empty() {
        return Err(SkillError::invalid("targetVersion must not be empty"));
    }
    if let Some(subsystem) = &params.subsystem
        && (subsystem.is_empty() || subsystem.contains('.'))
    {
        return Err(SkillError::invalid(format!("invalid subsystem name '{subsystem}'")));
    }
    let mut warnings = Vec::new();
    if semver::Version::parse(&params.target_version).is_err() {
        warnings.push(format!("targetVersion '{}' is not a semantic version", params.target_version));
    }

    let nodes = ctx.graph.nodes();
    let selected = select(&nodes, params.node_ids.as_deref(), params.node_type.as_deref(), true)?;

    let mut drafts = DataDrafts::new();
    if let Some(patch) = &params.patch.data {
        let patch = Value::Object(patch.clone());
        for node in &selected {
            let data = drafts.get_or_load(node);
            let mut merged = Value::Object(std::mem::take(data));
            deep_merge(&mut merged, &patch);
            if let Value::Object(map) = merged {
                *data = map;
            }
        }
    }

    let mut previous_version = Value::Null;
    if let Some(subsystem) = &params.subsystem {
        match nodes.iter().find(|n| n.is_manifest()) {
            Some(manifest) => {
                let data = drafts.get_or_load(manifest);
                let path = format!("dependencies.schemaVersions.{subsystem}");
                previous_version = get_data_path(data, &path)?.unwrap_or(Value::Null);
                set_data_path(data, &path, Value::String(params.target_version.clone()))?;
                set_data_path(data, "identity.updatedAt", Value::String(ctx.now.to_rfc3339()))?;
            }
            None => warnings.push(format!(
                "graph has no manifest; schema version for '{subsystem}' was not recorded"
            )),
        }
    }

    let mut plan = MutationPlan::default();
    drafts.stage(&mut plan);
    let UpgradePatch {
        extensions,
        node_type,
        label,
        ..
    } = params.patch;
    if extensions.is_some() || node_type.is_some() || label.is_some() {
        for node in &selected {
            let extensions = extensions.as_ref().map(|ext| {
                let mut merged = Value::Object(node.extensions.clone());
                deep_merge(&mut merged, &Value::Object(ext.clone()));
                match merged {
                    Value::Object(map) => map,
                    _ => Map::new(),
                }
            });
            plan.update_node(
                &node.id,
                NodePatch {
                    node_type: node_type.clone(),
                    label: label.clone(),
                    extensions,
                    data_mode: PatchMode::Replace,
                    ..NodePatch::default()
                },
            );
        }
    }

    let upgraded: Vec<&str> = selected.iter().map(|n| n.id.as_str()).collect();
    let report = json!({
        "targetVersion": params.target_version,
        "upgraded": upgraded,
        "subsystem": params.subsystem,
        "previousVersion": previous_version,
    });
    finish(ctx, plan, report, warnings)
}
