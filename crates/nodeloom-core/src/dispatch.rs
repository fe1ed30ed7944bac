//! Intent dispatcher.
//!
//! An intent is an ordered list of skill stages run against one graph. The
//! dispatcher owns the current cancellation token: beginning a new intent
//! cancels the previous one. Tokens are checked only between stages, so a
//! stage that has started always runs to completion.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use nodeloom_types::event::GraphEvent;
use nodeloom_types::skill::SkillResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::graph_api::GraphApi;
use crate::registry::SkillRegistry;
use crate::skill::ValidationSkill;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown intent kind '{0}'")]
    UnknownKind(String),

    #[error("intent '{0}' has no stages")]
    NoStages(String),
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentStage {
    pub skill_id: String,
    #[serde(default)]
    pub params: Value,
}

impl IntentStage {
    pub fn new(skill_id: impl Into<String>, params: Value) -> Self {
        Self {
            skill_id: skill_id.into(),
            params,
        }
    }
}

/// A unit of user intent: explicit stages, or a kind from the built-in table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub kind: String,
    #[serde(default)]
    pub stages: Vec<IntentStage>,
    /// Params handed to every stage derived from `kind`.
    #[serde(default)]
    pub params: Value,
}

impl Intent {
    pub fn from_kind(kind: impl Into<String>, params: Value) -> Self {
        Self {
            kind: kind.into(),
            stages: Vec::new(),
            params,
        }
    }

    pub fn with_stages(kind: impl Into<String>, stages: Vec<IntentStage>) -> Self {
        Self {
            kind: kind.into(),
            stages,
            params: Value::Null,
        }
    }

    /// Explicit stages when present, otherwise the kind's table entry.
    pub fn resolve_stages(&self) -> Result<Vec<IntentStage>, DispatchError> {
        if !self.stages.is_empty() {
            return Ok(self.stages.clone());
        }
        let skills = skills_for_kind(&self.kind).ok_or_else(|| DispatchError::UnknownKind(self.kind.clone()))?;
        if skills.is_empty() {
            return Err(DispatchError::NoStages(self.kind.clone()));
        }
        Ok(skills
            .into_iter()
            .map(|id| IntentStage::new(id, self.params.clone()))
            .collect())
    }
}

/// Skill ids an intent kind expands to.
pub fn skills_for_kind(kind: &str) -> Option<Vec<&'static str>> {
    match kind {
        "layout" => Some(vec!["layout.autoLayout"]),
        "tidy" => Some(vec!["layout.avoidCollisions", "layout.normalizeSpacing"]),
        "validate" => Some(ValidationSkill::ALL.iter().map(ValidationSkill::id).collect()),
        "export" => Some(vec!["automation.importExport"]),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutcome {
    pub skill_id: String,
    pub result: SkillResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentOutcome {
    pub intent_id: Uuid,
    pub kind: String,
    pub stages: Vec<StageOutcome>,
    pub cancelled: bool,
    /// Every stage ran and succeeded.
    pub success: bool,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// IntentDispatcher
// ---------------------------------------------------------------------------

/// Runs intents one at a time through a [`SkillRegistry`].
///
/// Callers serialise intents against a graph; the dispatcher only makes sure
/// a superseded intent stops at its next stage boundary.
pub struct IntentDispatcher {
    registry: SkillRegistry,
    current: Mutex<CancellationToken>,
}

impl std::fmt::Debug for IntentDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentDispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl IntentDispatcher {
    pub fn new(registry: SkillRegistry) -> Self {
        Self {
            registry,
            current: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Cancel the current token and install a fresh one, returned to the caller.
    pub fn begin(&self) -> CancellationToken {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = CancellationToken::new();
        current.clone()
    }

    /// Cancel whatever intent is in flight without starting a new one.
    pub fn cancel_current(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Begin a new intent (superseding any running one) and run it.
    pub async fn dispatch(&self, graph: &mut dyn GraphApi, intent: Intent) -> Result<IntentOutcome, DispatchError> {
        let token = self.begin();
        self.dispatch_with(graph, intent, &token).await
    }

    /// Run `intent` under an existing token.
    pub async fn dispatch_with(
        &self,
        graph: &mut dyn GraphApi,
        intent: Intent,
        token: &CancellationToken,
    ) -> Result<IntentOutcome, DispatchError> {
        let stages = intent.resolve_stages()?;
        let intent_id = Uuid::now_v7();
        let started = Instant::now();
        let events = self.registry.events();
        let stage_count = stages.len();

        tracing::info!(intent_id = %intent_id, kind = %intent.kind, stages = stage_count, "dispatching intent");
        events.publish(GraphEvent::IntentStarted {
            intent_id,
            kind: intent.kind.clone(),
            stages: stage_count,
        });

        let mut outcomes: Vec<StageOutcome> = Vec::with_capacity(stage_count);
        let mut cancelled = false;
        for (index, stage) in stages.into_iter().enumerate() {
            if token.is_cancelled() {
                cancelled = true;
                tracing::info!(intent_id = %intent_id, completed = index, "intent cancelled");
                events.publish(GraphEvent::IntentCancelled {
                    intent_id,
                    completed_stages: index,
                });
                break;
            }

            let result = self
                .registry
                .execute_skill(graph, &stage.skill_id, stage.params)
                .await;
            let success = result.success;
            tracing::debug!(intent_id = %intent_id, skill = %stage.skill_id, index, success, "stage completed");
            events.publish(GraphEvent::IntentStageCompleted {
                intent_id,
                skill_id: stage.skill_id.clone(),
                index,
                success,
            });
            outcomes.push(StageOutcome {
                skill_id: stage.skill_id,
                result,
            });
            if !success {
                break;
            }
        }

        let success = !cancelled && outcomes.len() == stage_count && outcomes.iter().all(|o| o.result.success);
        let duration_ms = started.elapsed().as_millis() as u64;
        events.publish(GraphEvent::IntentFinished {
            intent_id,
            success,
            duration_ms,
        });

        Ok(IntentOutcome {
            intent_id,
            kind: intent.kind,
            stages: outcomes,
            cancelled,
            success,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use nodeloom_types::config::EngineConfig;
    use nodeloom_types::skill::{SkillCategory, SkillContracts, SkillDescriptor};
    use serde_json::json;

    use super::*;
    use crate::skill::test_support::sample_store;
    use crate::skill::{SkillContext, SkillError, SkillHandler, SkillOutput};

    /// Cancels the given token while it runs, like a user starting a new intent.
    struct Interrupt(CancellationToken);

    impl SkillHandler for Interrupt {
        fn descriptor(&self) -> SkillDescriptor {
            SkillDescriptor {
                id: "test.interrupt".to_string(),
                title: "Interrupt".to_string(),
                description: String::new(),
                category: SkillCategory::Custom,
                supports_dry_run: true,
                mutations: Vec::new(),
                contracts: SkillContracts::default(),
            }
        }

        async fn run(&self, _ctx: &mut SkillContext<'_>, _params: Value) -> Result<SkillOutput, SkillError> {
            self.0.cancel();
            Ok(SkillOutput::ok(json!({ "interrupted": true })))
        }
    }

    fn dispatcher() -> IntentDispatcher {
        IntentDispatcher::new(SkillRegistry::with_builtin_skills(EngineConfig::default()))
    }

    #[test]
    fn kinds_expand_to_skill_stages() {
        let tidy = Intent::from_kind("tidy", json!({ "axis": "x" })).resolve_stages().unwrap();
        assert_eq!(tidy.len(), 2);
        assert_eq!(tidy[1].skill_id, "layout.normalizeSpacing");
        assert_eq!(tidy[1].params["axis"], "x");
        assert_eq!(skills_for_kind("validate").unwrap().len(), 7);
        assert_eq!(
            Intent::from_kind("dance", Value::Null).resolve_stages(),
            Err(DispatchError::UnknownKind("dance".to_string()))
        );
    }

    #[test]
    fn begin_supersedes_previous_token() {
        let dispatcher = dispatcher();
        let first = dispatcher.begin();
        let second = dispatcher.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        dispatcher.cancel_current();
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn runs_stages_in_order_and_reports_events() {
        let dispatcher = dispatcher();
        let mut events = dispatcher.registry().events().subscribe();
        let mut store = sample_store();
        let outcome = dispatcher
            .dispatch(&mut store, Intent::from_kind("tidy", json!({ "axis": "x", "spacing": 50 })))
            .await
            .unwrap();
        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.stages.len(), 2);

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(kinds.first(), Some(&"intentStarted"));
        assert_eq!(kinds.last(), Some(&"intentFinished"));
        assert_eq!(kinds.iter().filter(|k| **k == "intentStageCompleted").count(), 2);
    }

    #[tokio::test]
    async fn stops_at_first_failed_stage() {
        let dispatcher = dispatcher();
        let mut store = sample_store();
        let intent = Intent::with_stages(
            "custom",
            vec![
                IntentStage::new("structural.grouping", json!({ "action": "create", "nodeIds": ["a"] })),
                IntentStage::new("layout.autoLayout", Value::Null),
            ],
        );
        let outcome = dispatcher.dispatch(&mut store, intent).await.unwrap();
        assert!(!outcome.success);
        assert!(!outcome.cancelled);
        assert_eq!(outcome.stages.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_is_checked_between_stages() {
        let mut registry = SkillRegistry::with_builtin_skills(EngineConfig::default());
        let token = CancellationToken::new();
        registry.register_handler(Interrupt(token.clone())).unwrap();
        let dispatcher = IntentDispatcher::new(registry);

        let mut store = sample_store();
        let before = store.snapshot();
        let intent = Intent::with_stages(
            "custom",
            vec![
                IntentStage::new("test.interrupt", Value::Null),
                IntentStage::new("layout.autoLayout", Value::Null),
            ],
        );
        let outcome = dispatcher.dispatch_with(&mut store, intent, &token).await.unwrap();
        assert!(outcome.cancelled);
        assert!(!outcome.success);
        assert_eq!(outcome.stages.len(), 1);
        assert!(outcome.stages[0].result.success);
        assert_eq!(store.snapshot(), before);
    }
}
