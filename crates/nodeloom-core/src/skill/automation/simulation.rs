use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::commands::{Command, apply_commands};
use crate::graph_api::GraphApi;
use crate::skill::{SkillContext, SkillError, SkillOutput};
use crate::store::Store;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStepParams {
    pub mutations: Vec<Command>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Current state of each touched node, `null` where it does not exist.
fn capture(graph: &dyn GraphApi, touched: &[String]) -> Value {
    let states: Map<String, Value> = touched
        .iter()
        .map(|id| {
            let state = graph
                .node(id)
                .and_then(|n| serde_json::to_value(n).ok())
                .unwrap_or(Value::Null);
            (id.clone(), state)
        })
        .collect();
    Value::Object(states)
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: SimulationStepParams) -> Result<SkillOutput, SkillError> {
    if Command::flatten(&params.mutations).is_empty() {
        return Err(SkillError::invalid("mutations must not be empty"));
    }
    let touched = Command::touched_nodes(&params.mutations);
    let before = capture(&*ctx.graph, &touched);

    let mut scratch;
    let target: &mut dyn GraphApi = if ctx.dry_run {
        scratch = Store::restore(ctx.graph.snapshot());
        &mut scratch
    } else {
        &mut *ctx.graph
    };
    let outcome = apply_commands(target, &params.mutations, ctx.config);
    let after = capture(target, &touched);
    let mut data = json!({
        "label": params.label,
        "touched": touched,
        "before": before,
        "after": after,
        "applied": !ctx.dry_run,
    });

    // Commands are not rolled back, so a failed step still hands back the
    // pre-state of everything it may have touched.
    match outcome {
        Ok(count) => {
            data["appliedCount"] = json!(count);
            Ok(SkillOutput::ok(data))
        }
        Err(failure) => {
            data["appliedCount"] = json!(failure.index);
            data["stoppedAt"] = failure.detail();
            Ok(SkillOutput {
                data,
                warnings: Vec::new(),
                failure: Some(failure.message()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store};

    fn step() -> Value {
        json!({
            "label": "nudge",
            "mutations": [
                { "type": "translate", "nodeIds": ["a"], "delta": { "x": 0, "y": 50 } },
                { "type": "deleteNode", "id": "c" },
                { "type": "createNodes", "nodes": [{ "id": "z", "type": "task" }] }
            ]
        })
    }

    #[tokio::test]
    async fn records_before_and_after_for_touched_nodes() {
        let mut store = sample_store();
        let result = run(&mut store, "automation.simulationStep", step()).await;
        assert!(result.success, "{:?}", result.error);
        let data = result.data.unwrap();
        assert_eq!(data["touched"], json!(["a", "c", "z"]));
        assert_eq!(data["before"]["a"]["position"]["y"], 0.0);
        assert_eq!(data["after"]["a"]["position"]["y"], 50.0);
        assert_eq!(data["before"]["c"]["id"], "c");
        assert!(data["after"]["c"].is_null());
        assert!(data["before"]["z"].is_null());
        assert!(data["before"].get("b").is_none());
        assert!(store.node("c").is_none());
    }

    #[tokio::test]
    async fn failed_step_still_reports_before_state() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "automation.simulationStep",
            json!({ "mutations": [
                { "type": "move", "id": "a", "position": { "x": 999, "y": 999 } },
                { "type": "deleteNode", "id": "ghost" }
            ] }),
        )
        .await;
        assert!(!result.success);
        let data = result.data.unwrap();
        assert_eq!(data["appliedCount"], 1);
        assert_eq!(data["stoppedAt"]["failedIndex"], 1);
        assert_eq!(data["stoppedAt"]["command"], "deleteNode");
        assert_eq!(data["before"]["a"]["position"]["x"], 0.0);
        assert_eq!(data["after"]["a"]["position"]["x"], 999.0);
        // The first command stays applied.
        assert_eq!(store.node("a").unwrap().position.unwrap().x, 999.0);
    }

    #[tokio::test]
    async fn dry_run_previews_after_state() {
        let mut store = sample_store();
        let result = dry_run_unchanged(&mut store, "automation.simulationStep", step()).await;
        assert!(result.success, "{:?}", result.error);
        let data = result.data.unwrap();
        assert_eq!(data["after"]["z"]["id"], "z");
        assert_eq!(data["applied"], false);
    }
}
