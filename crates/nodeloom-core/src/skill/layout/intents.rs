use nodeloom_types::event::GraphEvent;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::skill::{SkillContext, SkillError, SkillOutput};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LayoutIntentParams {
    /// Layout algorithm hint forwarded to the layout engine.
    #[serde(default)]
    pub layout_type: Option<String>,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, trigger: &str, params: LayoutIntentParams) -> Result<SkillOutput, SkillError> {
    let event = GraphEvent::EdgeIntentCaptured {
        trigger: trigger.to_string(),
        layout_type: params.layout_type,
        timestamp: ctx.now,
        source: format!("skill:{}", ctx.skill_id),
    };
    if ctx.dry_run {
        return Ok(SkillOutput::ok(json!({ "event": event, "published": false })));
    }
    let receivers = ctx.events.publish(event.clone());
    tracing::debug!(skill = ctx.skill_id, trigger, receivers, "published layout intent");
    Ok(SkillOutput::ok(json!({
        "event": event,
        "published": true,
        "receivers": receivers,
    })))
}

#[cfg(test)]
mod tests {
    use nodeloom_types::config::EngineConfig;
    use nodeloom_types::event::GraphEvent;
    use serde_json::json;

    use crate::event::EventBus;
    use crate::registry::SkillRegistry;
    use crate::skill::test_support::{dry_run_unchanged, sample_store};

    #[tokio::test]
    async fn auto_layout_publishes_intent() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let registry = SkillRegistry::with_builtin_skills(EngineConfig::default()).with_event_bus(bus);
        let mut store = sample_store();

        let result = registry
            .execute_skill(&mut store, "layout.autoLayout", json!({ "layoutType": "layered" }))
            .await;
        assert!(result.success);

        match rx.recv().await.unwrap() {
            GraphEvent::EdgeIntentCaptured { trigger, layout_type, source, .. } => {
                assert_eq!(trigger, "layout");
                assert_eq!(layout_type.as_deref(), Some("layered"));
                assert_eq!(source, "skill:layout.autoLayout");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dry_run_returns_event_without_publishing() {
        let mut store = sample_store();
        let result = dry_run_unchanged(&mut store, "layout.rerouteEdges", json!({})).await;
        let data = result.data.unwrap();
        assert_eq!(data["published"], false);
        assert_eq!(data["event"]["trigger"], "reroute");
    }
}
