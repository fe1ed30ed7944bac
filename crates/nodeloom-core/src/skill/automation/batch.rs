use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::commands::{Command, apply_commands};
use crate::skill::{SkillContext, SkillError, SkillOutput};
use crate::store::Store;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchMutationParams {
    pub commands: Vec<Command>,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: BatchMutationParams) -> Result<SkillOutput, SkillError> {
    let total = Command::flatten(&params.commands).len();
    if total == 0 {
        return Err(SkillError::invalid("commands must not be empty"));
    }

    if ctx.dry_run {
        // Replay on a private copy to find where a live run would stop.
        let mut scratch = Store::restore(ctx.graph.snapshot());
        return Ok(match apply_commands(&mut scratch, &params.commands, ctx.config) {
            Ok(count) => SkillOutput::ok(json!({
                "applied": false,
                "commandCount": total,
                "wouldApply": count,
            })),
            Err(failure) => SkillOutput {
                data: json!({
                    "applied": false,
                    "commandCount": total,
                    "wouldApply": failure.index,
                    "stoppedAt": failure.detail(),
                }),
                warnings: Vec::new(),
                failure: Some(format!("batch would stop: {}", failure.message())),
            },
        });
    }

    let applied = apply_commands(&mut *ctx.graph, &params.commands, ctx.config).map_err(|f| f.into_error())?;
    info!(skill = ctx.skill_id, applied, "batch applied");
    Ok(SkillOutput::ok(json!({
        "applied": true,
        "commandCount": total,
        "appliedCount": applied,
    })))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{dry_run_unchanged, run, sample_store};

    #[tokio::test]
    async fn applies_commands_in_order() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "automation.batchMutation",
            json!({ "commands": [
                { "type": "createNodes", "nodes": [{ "id": "d", "type": "task", "position": { "x": 900, "y": 0 } }] },
                { "type": "createEdges", "edges": [{ "source": "c", "target": "d" }] },
                { "type": "updateNodes", "ids": ["a", "d"], "patch": { "label": "touched" } },
                { "type": "delete", "edgeIds": ["e1"] }
            ] }),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data.unwrap()["appliedCount"], 4);
        assert_eq!(store.node("d").unwrap().label, "touched");
        assert!(store.edges().iter().any(|e| e.source == "c" && e.target == "d"));
        assert!(store.edge("e1").is_none());
    }

    #[tokio::test]
    async fn failure_keeps_earlier_commands() {
        let mut store = sample_store();
        let result = run(
            &mut store,
            "automation.batchMutation",
            json!({ "commands": [
                { "type": "move", "id": "a", "position": { "x": 5, "y": 5 } },
                { "type": "updateNode", "id": "ghost", "patch": { "label": "x" } },
                { "type": "deleteNode", "id": "b" }
            ] }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["failedIndex"], 1);
        assert_eq!(store.node("a").unwrap().position.unwrap().x, 5.0);
        assert!(store.node("b").is_some());
    }

    #[tokio::test]
    async fn dry_run_reports_where_it_would_stop() {
        let mut store = sample_store();
        let result = dry_run_unchanged(
            &mut store,
            "automation.batchMutation",
            json!({ "commands": [
                { "type": "deleteNode", "id": "c" },
                { "type": "deleteEdge", "id": "e2" }
            ] }),
        )
        .await;
        // e2 went with c on the scratch copy.
        assert!(!result.success);
        let data = result.data.unwrap();
        assert_eq!(data["wouldApply"], 1);
        assert_eq!(data["stoppedAt"]["command"], "deleteEdge");
    }
}
