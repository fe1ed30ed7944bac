use std::collections::HashSet;

use nodeloom_types::validation::{IssueCode, ValidationIssue, ValidationReport};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::skill::{SkillContext, SkillOutput};

/// Command types that overwrite the whole graph in one step.
const REPLACE_COMMANDS: [&str; 4] = ["replaceGraph", "setGraph", "loadGraph", "overwriteGraph"];

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnsafeMutationParams {
    /// Raw command objects, each with a `type` field.
    pub commands: Vec<Value>,
    /// Overrides the configured mass-delete threshold.
    #[serde(default)]
    pub mass_delete_threshold: Option<usize>,
}

/// Inline nested `batch` and `transaction` commands, depth first.
fn flatten<'a>(commands: &'a [Value], out: &mut Vec<&'a Value>) {
    for command in commands {
        match command_type(command) {
            "batch" | "transaction" => {
                if let Some(nested) = command.get("commands").and_then(Value::as_array) {
                    flatten(nested, out);
                }
            }
            _ => out.push(command),
        }
    }
}

fn command_type(command: &Value) -> &str {
    command.get("type").and_then(Value::as_str).unwrap_or_default()
}

fn strings<'a>(command: &'a Value, key: &str) -> impl Iterator<Item = &'a str> {
    command
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

/// Ids of the objects under `key` (`nodes`, `edges`, `groups`).
fn created_ids<'a>(command: &'a Value, key: &str) -> impl Iterator<Item = &'a str> {
    command
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("id").and_then(Value::as_str))
}

/// Ids a command deletes.
fn deleted_ids(command: &Value) -> Vec<&str> {
    let single = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| command.get(*k).and_then(Value::as_str))
            .into_iter()
            .collect::<Vec<_>>()
    };
    match command_type(command) {
        "deleteNode" => single(&["id", "nodeId"]),
        "deleteEdge" => single(&["id", "edgeId"]),
        "deleteGroup" => single(&["id", "groupId"]),
        "delete" | "deleteNodes" => strings(command, "nodeIds")
            .chain(strings(command, "edgeIds"))
            .chain(strings(command, "groupIds"))
            .chain(strings(command, "ids"))
            .collect(),
        _ => Vec::new(),
    }
}

/// Static analysis of a command list. Pure: never touches a graph.
pub fn analyze_commands(commands: &[Value], mass_delete_threshold: usize) -> (ValidationReport, usize, usize) {
    let mut flat = Vec::new();
    flatten(commands, &mut flat);

    let mut report = ValidationReport::default();
    let mut deleted: HashSet<&str> = HashSet::new();
    let mut delete_count = 0;

    for (index, command) in flat.iter().enumerate() {
        let kind = command_type(command);
        if REPLACE_COMMANDS.contains(&kind) {
            report.error(ValidationIssue::new(
                IssueCode::DirectReplace,
                format!("command {index} ('{kind}') replaces the whole graph"),
            ));
            continue;
        }
        if kind == "clearGraph" {
            report.error(ValidationIssue::new(
                IssueCode::ClearGraph,
                format!("command {index} clears the whole graph"),
            ));
            continue;
        }

        let ids = deleted_ids(command);
        delete_count += ids.len();
        deleted.extend(ids);

        let recreated: Vec<&str> = match kind {
            "createNodes" => created_ids(command, "nodes").collect(),
            "createEdges" => created_ids(command, "edges").collect(),
            "createGroups" => created_ids(command, "groups").collect(),
            _ => Vec::new(),
        };
        for id in recreated.into_iter().filter(|id| deleted.contains(id)) {
            report.error(ValidationIssue::new(
                IssueCode::DeleteRecreate,
                format!("command {index} recreates '{id}' after deleting it"),
            ));
        }
    }

    if delete_count > mass_delete_threshold {
        report.error(ValidationIssue::new(
            IssueCode::MassDelete,
            format!("{delete_count} deletions exceed the threshold of {mass_delete_threshold}"),
        ));
    }
    (report, flat.len(), delete_count)
}

pub(super) fn run(ctx: &SkillContext<'_>, params: UnsafeMutationParams) -> SkillOutput {
    let threshold = params
        .mass_delete_threshold
        .unwrap_or(ctx.config.mass_delete_threshold);
    let (report, command_count, delete_count) = analyze_commands(&params.commands, threshold);
    SkillOutput::from_report(
        report,
        json!({
            "commandCount": command_count,
            "deleteCount": delete_count,
            "massDeleteThreshold": threshold,
        }),
    )
}

#[cfg(test)]
mod tests {
    use nodeloom_types::validation::IssueCode;
    use serde_json::json;

    use super::analyze_commands;
    use crate::skill::test_support::{run, sample_store};

    #[test]
    fn flags_replace_and_clear_inside_nested_batches() {
        let commands = vec![json!({
            "type": "transaction",
            "commands": [
                { "type": "batch", "commands": [{ "type": "setGraph", "graph": {} }] },
                { "type": "clearGraph" }
            ]
        })];
        let (report, count, _) = analyze_commands(&commands, 10);
        assert_eq!(count, 2);
        assert!(report.has_error(IssueCode::DirectReplace));
        assert!(report.has_error(IssueCode::ClearGraph));
    }

    #[test]
    fn delete_then_recreate_is_flagged() {
        let commands = vec![
            json!({ "type": "deleteNode", "id": "a" }),
            json!({ "type": "createNodes", "nodes": [{ "id": "a" }] }),
        ];
        let (report, _, deletes) = analyze_commands(&commands, 10);
        assert_eq!(deletes, 1);
        assert!(report.has_error(IssueCode::DeleteRecreate));
    }

    #[test]
    fn mass_delete_respects_threshold() {
        let ids: Vec<String> = (0..11).map(|i| format!("n{i}")).collect();
        let commands = vec![json!({ "type": "delete", "nodeIds": ids })];
        assert!(analyze_commands(&commands, 10).0.has_error(IssueCode::MassDelete));
        assert!(analyze_commands(&commands, 11).0.is_valid());
    }

    #[tokio::test]
    async fn safe_commands_pass() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "validation.unsafeMutation",
            json!({ "commands": [{ "type": "move", "id": "a", "position": { "x": 1, "y": 1 } }] }),
        )
        .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["deleteCount"], 0);
    }
}
