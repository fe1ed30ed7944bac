use nodeloom_types::graph::EntityKind;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;

use super::commands::{apply_commands, parse_commands};
use crate::script::{ScriptError, ScriptRequest};
use crate::skill::{SkillContext, SkillError, SkillOutput, default_true};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScriptExecutionParams {
    #[serde(default)]
    pub script: Option<String>,
    /// Run the script stored in this node's `data.script` (or `data.code`).
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default = "empty_object")]
    pub input: Value,
    #[serde(default = "default_true")]
    pub apply_commands: bool,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn resolve_script(ctx: &SkillContext<'_>, params: &ScriptExecutionParams) -> Result<String, SkillError> {
    if let Some(script) = params.script.as_deref().filter(|s| !s.trim().is_empty()) {
        return Ok(script.to_string());
    }
    let Some(node_id) = params.node_id.as_deref() else {
        return Err(SkillError::invalid("either script or nodeId is required"));
    };
    let node = ctx
        .graph
        .node(node_id)
        .ok_or_else(|| SkillError::missing(EntityKind::Node, vec![node_id.to_string()]))?;
    ["script", "code"]
        .iter()
        .find_map(|key| node.data.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| SkillError::precondition(format!("node '{node_id}' carries no script")))
}

pub(super) async fn run(ctx: &mut SkillContext<'_>, params: ScriptExecutionParams) -> Result<SkillOutput, SkillError> {
    let script = resolve_script(ctx, &params)?;

    if ctx.dry_run {
        return Ok(SkillOutput::ok(json!({
            "runner": ctx.runner.map(|r| r.name()),
            "available": ctx.runner.is_some_and(|r| r.is_available()),
            "scriptBytes": script.len(),
        })));
    }

    let runner = ctx
        .runner
        .ok_or_else(|| ScriptError::Unavailable("no script runner is registered".to_string()))?;
    if !runner.is_available() {
        return Err(ScriptError::Unavailable(format!("runner '{}' is not available", runner.name())).into());
    }

    let request = ScriptRequest {
        script,
        input: params.input,
        graph: ctx.graph.snapshot(),
    };
    let response = runner.run(request).await?;
    let commands = parse_commands(response.commands)
        .map_err(|e| ScriptError::InvalidOutput(e.to_string()))?;

    let applied = if params.apply_commands && !commands.is_empty() {
        apply_commands(&mut *ctx.graph, &commands, ctx.config).map_err(|f| f.into_error())?
    } else {
        0
    };
    info!(
        skill = ctx.skill_id,
        runner = runner.name(),
        commands = commands.len(),
        applied,
        "script finished"
    );

    Ok(SkillOutput::ok(json!({
        "runner": runner.name(),
        "output": response.output,
        "logs": response.logs,
        "commandCount": commands.len(),
        "appliedCount": applied,
    })))
}

#[cfg(test)]
mod tests {
    use nodeloom_types::config::EngineConfig;
    use nodeloom_types::graph::Node;
    use nodeloom_types::manifest::MutationAuthority;
    use nodeloom_types::skill::SkillResult;
    use serde_json::{Value, json};

    use crate::graph_api::GraphApi;
    use crate::registry::SkillRegistry;
    use crate::script::{BoxScriptRunner, ScriptError, ScriptRequest, ScriptResponse, ScriptRunner};
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store, store_with_authority};
    use crate::store::Store;

    /// Echoes its input and replays `input.commands` as mutation commands.
    struct EchoRunner;

    impl ScriptRunner for EchoRunner {
        fn name(&self) -> &str {
            "echo"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn run(&self, request: ScriptRequest) -> Result<ScriptResponse, ScriptError> {
            let commands = request
                .input
                .get("commands")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            Ok(ScriptResponse {
                output: json!({ "script": request.script, "nodes": request.graph.nodes.len() }),
                commands,
                logs: vec!["ran".to_string()],
            })
        }
    }

    async fn run_with_echo(store: &mut Store, params: Value) -> SkillResult {
        SkillRegistry::with_builtin_skills(EngineConfig::default())
            .with_runner(BoxScriptRunner::new(EchoRunner))
            .execute_skill(store, "automation.scriptExecution", params)
            .await
    }

    #[tokio::test]
    async fn runner_output_and_commands_are_applied() {
        let mut store = sample_store();
        let result = run_with_echo(
            &mut store,
            json!({
                "script": "return 1",
                "input": { "commands": [{ "type": "updateNode", "id": "a", "patch": { "label": "scripted" } }] }
            }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        let data = result.data.unwrap();
        assert_eq!(data["output"]["nodes"], 3);
        assert_eq!(data["appliedCount"], 1);
        assert_eq!(store.node("a").unwrap().label, "scripted");
    }

    #[tokio::test]
    async fn script_can_come_from_a_node() {
        let mut store = sample_store();
        store
            .create_nodes(vec![Node::new("s", "script").with_data("code", json!("go()"))])
            .unwrap();
        let result = run_with_echo(&mut store, json!({ "nodeId": "s", "applyCommands": false })).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data.unwrap()["output"]["script"], "go()");
    }

    #[tokio::test]
    async fn script_commands_are_checked_per_command() {
        let mut store = store_with_authority(MutationAuthority {
            allow_delete: false,
            ..MutationAuthority::default()
        });
        let result = run_with_echo(
            &mut store,
            json!({ "script": "x", "input": { "commands": [{ "type": "deleteNode", "id": "a" }] } }),
        )
        .await;
        assert!(!result.success);
        assert!(store.node("a").is_some());
    }

    #[tokio::test]
    async fn missing_runner_is_unavailable() {
        let mut store = sample_store();
        let result = run(&mut store, "automation.scriptExecution", json!({ "script": "x" })).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unavailable"));

        let preview = dry_run_unchanged(&mut store, "automation.scriptExecution", json!({ "script": "x" })).await;
        assert!(preview.success);
        assert_eq!(preview.data.unwrap()["available"], false);
    }
}
