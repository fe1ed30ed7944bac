//! Mutation command language shared by batchMutation, simulationStep, and
//! script runners.
//!
//! Commands run strictly in order. The first failure stops the run; commands
//! already applied stay applied.

use std::collections::BTreeSet;

use nodeloom_types::config::EngineConfig;
use nodeloom_types::graph::{EdgePatch, Group, Node, NodePatch, Position};
use nodeloom_types::skill::MutationAction;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::graph_api::GraphApi;
use crate::policy::assert_mutation_allowed;
use crate::skill::SkillError;
use crate::skill::structural::{EdgeSpec, prepare_nodes, recompute_bounds, resolve_edges};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    CreateNodes {
        nodes: Vec<Node>,
    },
    CreateEdges {
        edges: Vec<EdgeSpec>,
    },
    CreateGroups {
        groups: Vec<Group>,
    },
    UpdateNode {
        #[serde(alias = "nodeId")]
        id: String,
        patch: NodePatch,
    },
    #[serde(rename_all = "camelCase")]
    UpdateNodes {
        #[serde(alias = "nodeIds")]
        ids: Vec<String>,
        patch: NodePatch,
    },
    UpdateEdge {
        #[serde(alias = "edgeId")]
        id: String,
        patch: EdgePatch,
    },
    UpdateEdges {
        #[serde(alias = "edgeIds")]
        ids: Vec<String>,
        patch: EdgePatch,
    },
    #[serde(rename_all = "camelCase")]
    Delete {
        #[serde(default, alias = "ids")]
        node_ids: Vec<String>,
        #[serde(default)]
        edge_ids: Vec<String>,
        #[serde(default)]
        group_ids: Vec<String>,
    },
    DeleteNode {
        #[serde(alias = "nodeId")]
        id: String,
    },
    DeleteEdge {
        #[serde(alias = "edgeId")]
        id: String,
    },
    DeleteGroup {
        #[serde(alias = "groupId")]
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    Translate {
        #[serde(alias = "ids")]
        node_ids: Vec<String>,
        delta: Position,
    },
    Move {
        #[serde(alias = "nodeId")]
        id: String,
        position: Position,
    },
    #[serde(rename_all = "camelCase")]
    AddNodesToGroup { group_id: String, node_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    RemoveNodesFromGroup { group_id: String, node_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    SetGroupNodes { group_id: String, node_ids: Vec<String> },
    /// Nested commands, flattened in place.
    Batch { commands: Vec<Command> },
    /// Same as `batch`; there is no rollback.
    Transaction { commands: Vec<Command> },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateNodes { .. } => "createNodes",
            Self::CreateEdges { .. } => "createEdges",
            Self::CreateGroups { .. } => "createGroups",
            Self::UpdateNode { .. } => "updateNode",
            Self::UpdateNodes { .. } => "updateNodes",
            Self::UpdateEdge { .. } => "updateEdge",
            Self::UpdateEdges { .. } => "updateEdges",
            Self::Delete { .. } => "delete",
            Self::DeleteNode { .. } => "deleteNode",
            Self::DeleteEdge { .. } => "deleteEdge",
            Self::DeleteGroup { .. } => "deleteGroup",
            Self::Translate { .. } => "translate",
            Self::Move { .. } => "move",
            Self::AddNodesToGroup { .. } => "addNodesToGroup",
            Self::RemoveNodesFromGroup { .. } => "removeNodesFromGroup",
            Self::SetGroupNodes { .. } => "setGroupNodes",
            Self::Batch { .. } => "batch",
            Self::Transaction { .. } => "transaction",
        }
    }

    /// The action a primitive command needs. `None` for containers.
    fn action(&self) -> Option<MutationAction> {
        use MutationAction::*;
        match self {
            Self::CreateNodes { .. } | Self::CreateEdges { .. } | Self::CreateGroups { .. } => Some(Create),
            Self::Delete { .. } | Self::DeleteNode { .. } | Self::DeleteEdge { .. } | Self::DeleteGroup { .. } => {
                Some(Delete)
            }
            Self::Batch { .. } | Self::Transaction { .. } => None,
            _ => Some(Update),
        }
    }

    /// Every action needed by `commands`, nested ones included.
    pub fn required_actions(commands: &[Command]) -> BTreeSet<MutationAction> {
        Self::flatten(commands).into_iter().filter_map(Command::action).collect()
    }

    /// Primitive commands in execution order.
    pub fn flatten(commands: &[Command]) -> Vec<&Command> {
        fn walk<'a>(commands: &'a [Command], out: &mut Vec<&'a Command>) {
            for command in commands {
                match command {
                    Command::Batch { commands } | Command::Transaction { commands } => walk(commands, out),
                    primitive => out.push(primitive),
                }
            }
        }
        let mut out = Vec::new();
        walk(commands, &mut out);
        out
    }

    /// Node ids the commands create, change, move, or delete, in first-seen order.
    pub fn touched_nodes(commands: &[Command]) -> Vec<String> {
        let mut touched: Vec<String> = Vec::new();
        let mut push = |id: &String| {
            if !touched.contains(id) {
                touched.push(id.clone());
            }
        };
        for command in Self::flatten(commands) {
            match command {
                Self::CreateNodes { nodes } => nodes.iter().for_each(|n| push(&n.id)),
                Self::UpdateNode { id, .. } | Self::DeleteNode { id } | Self::Move { id, .. } => push(id),
                Self::UpdateNodes { ids, .. } => ids.iter().for_each(&mut push),
                Self::Delete { node_ids, .. }
                | Self::Translate { node_ids, .. }
                | Self::AddNodesToGroup { node_ids, .. }
                | Self::RemoveNodesFromGroup { node_ids, .. }
                | Self::SetGroupNodes { node_ids, .. } => node_ids.iter().for_each(&mut push),
                _ => {}
            }
        }
        touched
    }

    fn apply(&self, graph: &mut dyn GraphApi, config: &EngineConfig) -> Result<(), SkillError> {
        match self {
            Self::CreateNodes { nodes } => {
                let prepared = prepare_nodes(&*graph, nodes.clone(), true)?;
                graph.create_nodes(prepared.nodes)?;
            }
            Self::CreateEdges { edges } => {
                let resolved = resolve_edges(&*graph, edges.clone(), false, true)?;
                graph.create_edges(resolved.edges)?;
            }
            Self::CreateGroups { groups } => {
                let ids = graph.create_groups(groups.clone())?;
                for id in &ids {
                    recompute_bounds(graph, id, config.group_padding)?;
                }
            }
            Self::UpdateNode { id, patch } => {
                graph.update_node(id, patch)?;
            }
            Self::UpdateNodes { ids, patch } => {
                graph.update_nodes(ids, patch)?;
            }
            Self::UpdateEdge { id, patch } => {
                graph.update_edge(id, patch)?;
            }
            Self::UpdateEdges { ids, patch } => {
                graph.update_edges(ids, patch)?;
            }
            Self::Delete {
                node_ids,
                edge_ids,
                group_ids,
            } => {
                for id in edge_ids {
                    graph.delete_edge(id)?;
                }
                for id in group_ids {
                    graph.delete_group(id)?;
                }
                for id in node_ids {
                    graph.delete_node(id)?;
                }
            }
            Self::DeleteNode { id } => {
                graph.delete_node(id)?;
            }
            Self::DeleteEdge { id } => {
                graph.delete_edge(id)?;
            }
            Self::DeleteGroup { id } => {
                graph.delete_group(id)?;
            }
            Self::Translate { node_ids, delta } => {
                graph.translate_nodes(node_ids, *delta)?;
            }
            Self::Move { id, position } => {
                graph.update_node(id, &NodePatch::position(*position))?;
            }
            Self::AddNodesToGroup { group_id, node_ids } => {
                graph.add_nodes_to_group(group_id, node_ids)?;
                recompute_bounds(graph, group_id, config.group_padding)?;
            }
            Self::RemoveNodesFromGroup { group_id, node_ids } => {
                graph.remove_nodes_from_group(group_id, node_ids)?;
                recompute_bounds(graph, group_id, config.group_padding)?;
            }
            Self::SetGroupNodes { group_id, node_ids } => {
                graph.set_group_nodes(group_id, node_ids)?;
                recompute_bounds(graph, group_id, config.group_padding)?;
            }
            Self::Batch { .. } | Self::Transaction { .. } => {}
        }
        Ok(())
    }
}

/// Decode raw command values, reporting every malformed entry at once.
pub fn parse_commands(raw: Vec<Value>) -> Result<Vec<Command>, SkillError> {
    let mut errors = Vec::new();
    let mut commands = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<Command>(value) {
            Ok(command) => commands.push(command),
            Err(e) => errors.push(json!({ "index": index, "message": e.to_string() })),
        }
    }
    if errors.is_empty() {
        Ok(commands)
    } else {
        Err(SkillError::precondition_with(
            format!("{} malformed command(s)", errors.len()),
            json!({ "errors": errors }),
        ))
    }
}

/// The command that stopped a run.
#[derive(Debug)]
pub struct CommandFailure {
    /// Position in the flattened command list; also the number applied.
    pub index: usize,
    pub kind: &'static str,
    pub error: SkillError,
}

impl CommandFailure {
    pub fn message(&self) -> String {
        format!("command {} ({}) failed: {}", self.index, self.kind, self.error)
    }

    pub fn detail(&self) -> Value {
        json!({
            "failedIndex": self.index,
            "command": self.kind,
            "applied": self.index,
            "error": self.error.to_string(),
        })
    }

    pub fn into_error(self) -> SkillError {
        SkillError::precondition_with(self.message(), self.detail())
    }
}

/// Apply `commands` in order, checking each one against the manifest policy
/// as it stands at that moment. Returns how many primitive commands ran.
pub fn apply_commands(
    graph: &mut dyn GraphApi,
    commands: &[Command],
    config: &EngineConfig,
) -> Result<usize, CommandFailure> {
    let flat = Command::flatten(commands);
    for (index, command) in flat.iter().enumerate() {
        let fail = |error: SkillError| CommandFailure {
            index,
            kind: command.kind(),
            error,
        };
        if let Some(action) = command.action() {
            assert_mutation_allowed(&*graph, action).map_err(|e| fail(e.into()))?;
        }
        command.apply(graph, config).map_err(fail)?;
        tracing::trace!(index, command = command.kind(), "applied command");
    }
    Ok(flat.len())
}

#[cfg(test)]
mod tests {
    use nodeloom_types::manifest::MutationAuthority;
    use serde_json::json;

    use super::*;
    use crate::skill::test_support::{sample_store, store_with_authority};

    fn commands(value: Value) -> Vec<Command> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn nested_commands_flatten_in_order() {
        let list = commands(json!([
            { "type": "move", "id": "a", "position": { "x": 1, "y": 2 } },
            { "type": "transaction", "commands": [
                { "type": "deleteEdge", "id": "e1" },
                { "type": "batch", "commands": [{ "type": "deleteNode", "id": "c" }] }
            ] }
        ]));
        let kinds: Vec<&str> = Command::flatten(&list).iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, ["move", "deleteEdge", "deleteNode"]);
        assert_eq!(
            Command::required_actions(&list),
            BTreeSet::from([MutationAction::Update, MutationAction::Delete])
        );
        assert_eq!(Command::touched_nodes(&list), ["a", "c"]);
    }

    #[test]
    fn first_failure_stops_without_rollback() {
        let mut store = sample_store();
        let list = commands(json!([
            { "type": "translate", "nodeIds": ["a"], "delta": { "x": 10, "y": 0 } },
            { "type": "deleteNode", "id": "ghost" },
            { "type": "deleteNode", "id": "c" }
        ]));
        let failure = apply_commands(&mut store, &list, &EngineConfig::default()).unwrap_err();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.kind, "deleteNode");
        assert_eq!(store.node("a").unwrap().position.unwrap().x, 10.0);
        assert!(store.node("c").is_some());
    }

    #[test]
    fn each_command_is_checked_against_policy() {
        let mut store = store_with_authority(MutationAuthority {
            append_only: true,
            ..MutationAuthority::default()
        });
        let list = commands(json!([
            { "type": "updateNode", "id": "a", "patch": { "label": "A" } },
            { "type": "delete", "edgeIds": ["e1"] }
        ]));
        let failure = apply_commands(&mut store, &list, &EngineConfig::default()).unwrap_err();
        assert_eq!(failure.index, 1);
        assert!(failure.message().contains("append-only"));
        assert_eq!(store.node("a").unwrap().label, "A");
        assert!(store.edge("e1").is_some());
    }

    #[test]
    fn malformed_commands_are_reported_together() {
        let err = parse_commands(vec![
            json!({ "type": "move", "id": "a", "position": { "x": 0, "y": 0 } }),
            json!({ "type": "explode" }),
            json!({ "id": "b" }),
        ])
        .unwrap_err();
        assert_eq!(err.data().unwrap()["errors"].as_array().unwrap().len(), 2);
    }
}
