use std::collections::HashSet;

use nodeloom_types::graph::{EntityKind, Group, GroupPatch, Node};
use nodeloom_types::skill::MutationAction;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::geometry::group_bounds;
use crate::graph_api::GraphApi;
use crate::ids::IdAllocator;
use crate::skill::{SkillContext, SkillError, SkillOutput, default_true, missing_ids};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupAction {
    Create,
    Dissolve,
    Add,
    Remove,
    Set,
}

impl GroupAction {
    pub fn required_mutation(&self) -> MutationAction {
        match self {
            Self::Create => MutationAction::Create,
            Self::Dissolve => MutationAction::Delete,
            Self::Add | Self::Remove | Self::Set => MutationAction::Update,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Dissolve => "dissolve",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Set => "set",
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupingParams {
    pub action: GroupAction,
    /// Required for every action but `create`, where it is optional.
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub node_ids: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Let `create`, `add`, and `set` take nodes that already belong to
    /// another group.
    #[serde(default)]
    pub allow_regroup: bool,
    #[serde(default = "default_true")]
    pub recompute_bounds: bool,
    /// Overrides the configured group padding.
    #[serde(default)]
    pub padding: Option<f64>,
}

/// Refit a group's bounds around its current members.
pub(crate) fn recompute_bounds(
    graph: &mut dyn GraphApi,
    group_id: &str,
    padding: f64,
) -> Result<Option<Group>, SkillError> {
    let Some(group) = graph.read_group(group_id) else {
        return Ok(None);
    };
    let members: Vec<Node> = group.node_ids.iter().filter_map(|id| graph.node(id)).collect();
    match group_bounds(&members, padding) {
        Some(bounds) => Ok(Some(graph.update_group(group_id, &GroupPatch::bounds(bounds))?)),
        None => Ok(Some(group)),
    }
}

/// Nodes in `node_ids` that already belong to a group other than `except`.
fn already_grouped(graph: &dyn GraphApi, node_ids: &[String], except: Option<&str>) -> Vec<String> {
    let grouped: HashSet<String> = graph
        .groups()
        .into_iter()
        .filter(|g| Some(g.id.as_str()) != except)
        .flat_map(|g| g.node_ids)
        .collect();
    node_ids.iter().filter(|id| grouped.contains(*id)).cloned().collect()
}

fn dedupe(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(id.as_str())).cloned().collect()
}

/// The id for a new group: `requested` when given, which must be free.
pub(crate) fn new_group_id(graph: &dyn GraphApi, requested: Option<&str>) -> Result<String, SkillError> {
    let mut ids = IdAllocator::from_graph(graph);
    match requested {
        Some(id) if ids.contains(EntityKind::Group, id) => Err(SkillError::precondition_with(
            format!("group id '{id}' already exists"),
            json!({ "duplicateIds": [id] }),
        )),
        _ => Ok(ids.claim_or_fresh(EntityKind::Group, requested)),
    }
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: GroupingParams) -> Result<SkillOutput, SkillError> {
    let padding = params.padding.unwrap_or(ctx.config.group_padding);
    let node_ids = dedupe(&params.node_ids);

    let nodes = ctx.graph.nodes();
    let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let missing = missing_ids(&node_ids, &present);
    if !missing.is_empty() {
        return Err(SkillError::missing(EntityKind::Node, missing));
    }

    let existing = match (params.action, params.group_id.as_deref()) {
        (GroupAction::Create, _) => None,
        (action, None) => {
            return Err(SkillError::invalid(format!("groupId is required for '{}'", action.as_str())));
        }
        (_, Some(id)) => match ctx.graph.read_group(id) {
            Some(group) => Some(group),
            None => return Err(SkillError::missing(EntityKind::Group, vec![id.to_string()])),
        },
    };

    if matches!(params.action, GroupAction::Create | GroupAction::Add | GroupAction::Set) && !params.allow_regroup {
        let except = existing.as_ref().map(|g| g.id.as_str());
        let conflicts = already_grouped(&*ctx.graph, &node_ids, except);
        if !conflicts.is_empty() {
            return Err(SkillError::precondition_with(
                format!("node(s) already grouped: {}", conflicts.join(", ")),
                json!({ "alreadyGrouped": conflicts }),
            ));
        }
    }

    match (params.action, existing) {
        (GroupAction::Create, _) => {
            if node_ids.len() < 2 {
                return Err(SkillError::precondition(format!(
                    "a group needs at least 2 nodes, got {}",
                    node_ids.len()
                )));
            }
            let id = new_group_id(&*ctx.graph, params.group_id.as_deref())?;
            let members: Vec<&Node> = nodes.iter().filter(|n| node_ids.contains(&n.id)).collect();
            let mut group = Group::new(id, node_ids.clone());
            if let Some(label) = params.label {
                group.label = label;
            }
            if let Some(bounds) = group_bounds(members, padding) {
                group.bounds = bounds;
            }
            if ctx.dry_run {
                return Ok(SkillOutput::ok(json!({ "action": "create", "group": group })));
            }
            ctx.graph.create_groups(vec![group.clone()])?;
            tracing::debug!(group = %group.id, members = node_ids.len(), "created group");
            Ok(SkillOutput::ok(json!({ "action": "create", "group": group })))
        }
        (GroupAction::Dissolve, Some(group)) => {
            if ctx.dry_run {
                return Ok(SkillOutput::ok(json!({ "action": "dissolve", "group": group })));
            }
            let removed = ctx.graph.delete_group(&group.id)?;
            Ok(SkillOutput::ok(json!({ "action": "dissolve", "group": removed })))
        }
        (action, Some(group)) => {
            let planned: Vec<String> = match action {
                GroupAction::Add => dedupe(&[group.node_ids.clone(), node_ids.clone()].concat()),
                GroupAction::Remove => group
                    .node_ids
                    .iter()
                    .filter(|id| !node_ids.contains(id))
                    .cloned()
                    .collect(),
                _ => node_ids.clone(),
            };
            if planned.len() < 2 {
                return Err(SkillError::precondition_with(
                    format!(
                        "'{}' would leave group '{}' with {} member(s); dissolve it instead",
                        action.as_str(),
                        group.id,
                        planned.len()
                    ),
                    json!({ "groupId": group.id, "remaining": planned }),
                ));
            }
            if ctx.dry_run {
                return Ok(SkillOutput::ok(json!({
                    "action": action.as_str(),
                    "groupId": group.id,
                    "nodeIds": planned,
                })));
            }
            let mut updated = match action {
                GroupAction::Add => ctx.graph.add_nodes_to_group(&group.id, &node_ids)?,
                GroupAction::Remove => ctx.graph.remove_nodes_from_group(&group.id, &node_ids)?,
                _ => ctx.graph.set_group_nodes(&group.id, &node_ids)?,
            };
            if params.recompute_bounds
                && let Some(refit) = recompute_bounds(&mut *ctx.graph, &group.id, padding)?
            {
                updated = refit;
            }
            Ok(SkillOutput::ok(json!({ "action": action.as_str(), "group": updated })))
        }
        // Every non-create action resolved `existing` above.
        (action, None) => Err(SkillError::invalid(format!("groupId is required for '{}'", action.as_str()))),
    }
}

#[cfg(test)]
mod tests {
    use nodeloom_types::manifest::MutationAuthority;
    use serde_json::json;

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store, store_with_authority};

    #[tokio::test]
    async fn create_needs_two_nodes() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.grouping",
            json!({ "action": "create", "nodeIds": ["c"] }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(store.groups().len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_already_grouped_nodes_unless_allowed() {
        let mut store = sample_store();
        let params = json!({ "action": "create", "groupId": "g2", "nodeIds": ["b", "c"] });
        let result = run(&mut store, "structural.grouping", params.clone()).await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["alreadyGrouped"], json!(["b"]));

        let mut params = params;
        params["allowRegroup"] = json!(true);
        let result = run(&mut store, "structural.grouping", params).await;
        assert!(result.success, "{:?}", result.error);
        let group = store.read_group("g2").unwrap();
        assert_eq!(group.node_ids, vec!["b".to_string(), "c".to_string()]);
        assert!(group.bounds.width > 0.0);
    }

    #[tokio::test]
    async fn create_rejects_a_taken_group_id() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.grouping",
            json!({ "action": "create", "groupId": "g1", "nodeIds": ["b", "c"], "allowRegroup": true }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["duplicateIds"], json!(["g1"]));
        let groups: Vec<String> = store.groups().into_iter().map(|g| g.id).collect();
        assert_eq!(groups, vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn group_id_may_match_a_node_id() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.grouping",
            json!({ "action": "create", "groupId": "c", "nodeIds": ["b", "c"], "allowRegroup": true }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert!(store.read_group("c").is_some());
    }

    #[tokio::test]
    async fn remove_below_two_members_fails() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.grouping",
            json!({ "action": "remove", "groupId": "g1", "nodeIds": ["a"] }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(store.read_group("g1").unwrap().node_ids.len(), 2);
    }

    #[tokio::test]
    async fn add_refits_bounds() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.grouping",
            json!({ "action": "add", "groupId": "g1", "nodeIds": ["c"] }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        let group = store.read_group("g1").unwrap();
        assert_eq!(group.node_ids.len(), 3);
        assert!(group.bounds.width > 600.0);
    }

    #[tokio::test]
    async fn dissolve_is_refused_when_append_only() {
        let mut store = store_with_authority(MutationAuthority {
            append_only: true,
            ..MutationAuthority::default()
        });
        let result = run(
            &mut store,
            "structural.grouping",
            json!({ "action": "dissolve", "groupId": "g1" }),
        )
        .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("append-only"));
        assert!(store.read_group("g1").is_some());
    }

    #[tokio::test]
    async fn unknown_group_is_reported() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "structural.grouping",
            json!({ "action": "set", "groupId": "nope", "nodeIds": ["a", "b"] }),
        )
        .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn dry_run_dissolve_keeps_group() {
        let mut store = sample_store();
        let result = dry_run_unchanged(
            &mut store,
            "structural.grouping",
            json!({ "action": "dissolve", "groupId": "g1" }),
        )
        .await;
        assert!(result.success);
    }
}
