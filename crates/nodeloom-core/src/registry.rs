//! Skill registry and dispatch.
//!
//! `execute_skill` runs one skill through a fixed pipeline:
//! lookup -> dry-run support -> param decode -> manifest policy -> run ->
//! normalise. The policy gate lives here, driven by each request's declared
//! mutations, so no skill can forget it. Every failure (including a panic
//! inside a skill) comes back as a `SkillResult` with `success: false`.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::FutureExt;
use nodeloom_types::catalog::DefinitionCatalog;
use nodeloom_types::config::EngineConfig;
use nodeloom_types::skill::{SkillCategory, SkillDescriptor, SkillResult};
use serde::Serialize;
use serde_json::Value;

use crate::event::EventBus;
use crate::graph_api::{GraphApi, ReadOnlyGraph};
use crate::policy::manifest_mutation_policy;
use crate::script::BoxScriptRunner;
use crate::skill::{
    Skill, SkillContext, SkillError, SkillHandler, SkillOutput, SkillRequest, builtin_skills,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("skill id must not be empty")]
    EmptyId,

    #[error("skill '{0}' is already registered")]
    Duplicate(String),
}

// ---------------------------------------------------------------------------
// Description
// ---------------------------------------------------------------------------

/// Descriptor plus the JSON Schema of the skill's parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDescription {
    #[serde(flatten)]
    pub descriptor: SkillDescriptor,
    pub params_schema: Value,
}

// ---------------------------------------------------------------------------
// SkillRegistry
// ---------------------------------------------------------------------------

pub struct SkillRegistry {
    skills: BTreeMap<String, Skill>,
    events: EventBus,
    config: Arc<EngineConfig>,
    runner: Option<BoxScriptRunner>,
    definitions: Option<Arc<DefinitionCatalog>>,
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.skills.len())
            .field("runner", &self.runner)
            .field("definitions", &self.definitions.as_ref().map(|d| d.len()))
            .finish()
    }
}

impl SkillRegistry {
    /// An empty registry.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            skills: BTreeMap::new(),
            events: EventBus::new(config.event_bus_capacity),
            config: Arc::new(config),
            runner: None,
            definitions: None,
        }
    }

    /// A registry preloaded with every built-in skill.
    pub fn with_builtin_skills(config: EngineConfig) -> Self {
        let mut registry = Self::new(config);
        for skill in builtin_skills() {
            if let Err(e) = registry.register(skill) {
                tracing::error!(error = %e, "failed to register built-in skill");
            }
        }
        registry
    }

    pub fn with_runner(mut self, runner: BoxScriptRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_definitions(mut self, catalog: DefinitionCatalog) -> Self {
        self.definitions = Some(Arc::new(catalog));
        self
    }

    /// Share an existing event bus instead of the registry's own.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn register(&mut self, skill: Skill) -> Result<(), RegistryError> {
        let id = skill.descriptor().id;
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if self.skills.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        tracing::debug!(skill = %id, "registered skill");
        self.skills.insert(id, skill);
        Ok(())
    }

    pub fn register_handler<H: SkillHandler + 'static>(&mut self, handler: H) -> Result<(), RegistryError> {
        self.register(Skill::custom(handler))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.skills.contains_key(id)
    }

    /// Descriptors of every registered skill, sorted by id.
    pub fn list_skills(&self) -> Vec<SkillDescriptor> {
        self.skills.values().map(Skill::descriptor).collect()
    }

    pub fn list_category(&self, category: SkillCategory) -> Vec<SkillDescriptor> {
        self.list_skills()
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    pub fn describe_skill(&self, id: &str) -> Option<SkillDescription> {
        self.skills.get(id).map(|skill| SkillDescription {
            descriptor: skill.descriptor(),
            params_schema: skill.params_schema(),
        })
    }

    /// Run a skill against `graph`. Never fails: errors come back as a
    /// result with `success: false`.
    pub async fn execute_skill(&self, graph: &mut dyn GraphApi, id: &str, params: Value) -> SkillResult {
        let started = Instant::now();
        let dry_run = params.get("dryRun").and_then(Value::as_bool).unwrap_or(false);
        tracing::debug!(skill = %id, dry_run, "executing skill");

        let mut warnings = Vec::new();
        let outcome = self.dispatch(graph, id, &params, dry_run, &mut warnings).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                warnings.extend(output.warnings);
                tracing::debug!(
                    skill = %id,
                    dry_run,
                    success = output.failure.is_none(),
                    warnings = warnings.len(),
                    elapsed_ms,
                    "skill completed"
                );
                SkillResult {
                    success: output.failure.is_none(),
                    data: Some(output.data),
                    error: output.failure,
                    warnings,
                }
            }
            Err(err) => {
                match &err {
                    SkillError::Policy(_) => {
                        tracing::warn!(skill = %id, error = %err, "mutation rejected by manifest policy")
                    }
                    SkillError::Panicked(_) => {
                        tracing::warn!(skill = %id, error = %err, "recovered from skill panic")
                    }
                    _ => tracing::debug!(skill = %id, error = %err, elapsed_ms, "skill failed"),
                }
                SkillResult {
                    success: false,
                    data: err.data().cloned(),
                    error: Some(err.to_string()),
                    warnings,
                }
            }
        }
    }

    async fn dispatch(
        &self,
        graph: &mut dyn GraphApi,
        id: &str,
        params: &Value,
        dry_run: bool,
        warnings: &mut Vec<String>,
    ) -> Result<SkillOutput, SkillError> {
        let skill = self
            .skills
            .get(id)
            .ok_or_else(|| SkillError::UnknownSkill(id.to_string()))?;
        let descriptor = skill.descriptor();
        if dry_run && !descriptor.supports_dry_run {
            return Err(SkillError::DryRunUnsupported(id.to_string()));
        }

        let request = skill.decode(params)?;

        let required = request.required_mutations();
        if !required.is_empty() {
            let policy = manifest_mutation_policy(&*graph);
            for action in &required {
                policy.check(*action)?;
            }
            warnings.extend(policy.warnings);
        }

        let skill_ids: Vec<String> = self.skills.keys().cloned().collect();
        let now = Utc::now();
        if dry_run {
            let mut view = ReadOnlyGraph::new(&*graph);
            let mut ctx = self.context(&mut view, id, now, true, &skill_ids);
            run_guarded(request, &mut ctx).await
        } else {
            let mut ctx = self.context(graph, id, now, false, &skill_ids);
            run_guarded(request, &mut ctx).await
        }
    }

    fn context<'a>(
        &'a self,
        graph: &'a mut dyn GraphApi,
        skill_id: &'a str,
        now: chrono::DateTime<Utc>,
        dry_run: bool,
        skill_ids: &'a [String],
    ) -> SkillContext<'a> {
        SkillContext {
            graph,
            now,
            dry_run,
            skill_id,
            events: &self.events,
            config: &self.config,
            runner: self.runner.as_ref(),
            definitions: self.definitions.as_deref(),
            skill_ids,
        }
    }
}

/// Run a request, converting a panic into `SkillError::Panicked`.
async fn run_guarded(request: SkillRequest, ctx: &mut SkillContext<'_>) -> Result<SkillOutput, SkillError> {
    match AssertUnwindSafe(request.run(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(SkillError::Panicked(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use nodeloom_types::graph::{GraphSnapshot, Node};
    use nodeloom_types::manifest::{ManifestData, MutationAuthority};
    use nodeloom_types::skill::{MutationAction, SkillContracts};
    use serde_json::json;

    struct Boom;

    impl SkillHandler for Boom {
        fn descriptor(&self) -> SkillDescriptor {
            SkillDescriptor {
                id: "custom.boom".to_string(),
                title: "Boom".to_string(),
                description: "Always panics".to_string(),
                category: SkillCategory::Custom,
                supports_dry_run: false,
                mutations: Vec::new(),
                contracts: SkillContracts::default(),
            }
        }

        async fn run(&self, _ctx: &mut SkillContext<'_>, _params: Value) -> Result<SkillOutput, SkillError> {
            panic!("kaboom");
        }
    }

    struct Named(&'static str);

    impl SkillHandler for Named {
        fn descriptor(&self) -> SkillDescriptor {
            SkillDescriptor {
                id: self.0.to_string(),
                title: String::new(),
                description: String::new(),
                category: SkillCategory::Custom,
                supports_dry_run: true,
                mutations: vec![MutationAction::Create],
                contracts: SkillContracts::default(),
            }
        }

        async fn run(&self, _ctx: &mut SkillContext<'_>, _params: Value) -> Result<SkillOutput, SkillError> {
            Ok(SkillOutput::ok(json!({ "ran": true })))
        }
    }

    fn registry() -> SkillRegistry {
        SkillRegistry::with_builtin_skills(EngineConfig::default())
    }

    #[test]
    fn register_rejects_empty_and_duplicate_ids() {
        let mut reg = SkillRegistry::new(EngineConfig::default());
        assert_eq!(reg.register_handler(Named("")), Err(RegistryError::EmptyId));
        reg.register_handler(Named("custom.a")).unwrap();
        assert_eq!(
            reg.register_handler(Named("custom.a")),
            Err(RegistryError::Duplicate("custom.a".to_string()))
        );
    }

    #[test]
    fn list_skills_is_sorted_and_complete() {
        let reg = registry();
        let ids: Vec<String> = reg.list_skills().into_iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), 29);
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert!(ids.contains(&"layout.avoidCollisions".to_string()));
    }

    #[test]
    fn describe_includes_params_schema() {
        let reg = registry();
        let description = reg.describe_skill("structural.createNodes").unwrap();
        let json = serde_json::to_value(&description).unwrap();
        assert_eq!(json["id"], "structural.createNodes");
        assert!(json["paramsSchema"].is_object());
        assert!(reg.describe_skill("nope").is_none());
    }

    #[tokio::test]
    async fn unknown_skill_is_a_failed_result() {
        let reg = registry();
        let mut store = Store::new();
        let result = reg.execute_skill(&mut store, "nope.nothing", json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown skill"));
    }

    #[tokio::test]
    async fn panics_are_normalised() {
        let mut reg = registry();
        reg.register_handler(Boom).unwrap();
        let mut store = Store::new();
        let result = reg.execute_skill(&mut store, "custom.boom", json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("kaboom"));
    }

    #[tokio::test]
    async fn dry_run_refused_when_unsupported() {
        let mut reg = registry();
        reg.register_handler(Boom).unwrap();
        let mut store = Store::new();
        let result = reg
            .execute_skill(&mut store, "custom.boom", json!({ "dryRun": true }))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("does not support dry run"));
    }

    /// Params that get each built-in skill past decoding on `sample_store`.
    fn sweep_params(id: &str) -> Value {
        let nudge = json!({ "type": "move", "id": "a", "position": { "x": 5, "y": 5 } });
        match id {
            "structural.createNodes" => json!({ "nodes": [{ "id": "z", "type": "task" }] }),
            "structural.createEdges" => json!({ "edges": [{ "source": "a", "target": "c" }] }),
            "structural.grouping" => json!({ "action": "dissolve", "groupId": "g1" }),
            "structural.reparent" => json!({ "nodeIds": ["c"], "targetGroupId": "g1" }),
            "structural.duplicate" => json!({ "nodeIds": ["a", "b"], "includeEdges": true }),
            "structural.extractSubgraph" => json!({ "nodeIds": ["b", "c"], "createGroup": true }),
            "layout.autoLayout" | "layout.rerouteEdges" | "layout.avoidCollisions" => json!({}),
            "layout.alignDistribute" => json!({ "nodeIds": ["a", "c"], "mode": "right" }),
            "layout.normalizeSpacing" => json!({ "spacing": 100 }),
            "transform.refactor" => json!({ "mode": "split", "sourceId": "a", "parts": [{}, {}] }),
            "transform.normalize" => json!({ "operations": [
                { "op": "setField", "nodeIds": ["a", "b"], "path": "normalized", "value": true }
            ] }),
            "transform.typeMigration" => json!({ "fromType": "task", "newType": "step", "defaults": { "rate": 1 } }),
            "transform.schemaUpgrade" => json!({ "nodeIds": ["a"], "targetVersion": "v2", "patch": { "label": "A" } }),
            "transform.inlineExtract" => json!({ "mode": "inline", "sourceId": "a", "targetId": "b", "fields": ["name"] }),
            "automation.scriptExecution" => json!({ "script": "x" }),
            "automation.batchMutation" => json!({ "commands": [{ "type": "deleteNode", "id": "a" }] }),
            "automation.proceduralGeneration" => json!({
                "blueprint": { "nodes": [{ "id": "n", "type": "task" }] },
                "count": 2
            }),
            "automation.simulationStep" => json!({ "mutations": [nudge] }),
            "automation.compileArtifact" => json!({ "format": "json" }),
            "automation.importExport" => json!({ "mode": "export" }),
            "validation.unsafeMutation" => json!({ "commands": [nudge] }),
            _ => json!({}),
        }
    }

    #[tokio::test]
    async fn no_builtin_dry_run_touches_the_graph() {
        let reg = registry();
        let mut store = crate::skill::test_support::sample_store();
        let before = store.snapshot();
        for descriptor in reg.list_skills() {
            let id = descriptor.id.as_str();
            let mut params = sweep_params(id);
            params["dryRun"] = json!(true);
            let result = reg.execute_skill(&mut store, id, params).await;
            assert_eq!(store.snapshot(), before, "dry run of {id} changed the graph");

            if descriptor.category == SkillCategory::Validation {
                // The verdict depends on the graph; the check itself must run.
                assert!(result.data.is_some(), "{id} produced no report: {:?}", result.error);
                assert!(
                    !result.error.as_deref().is_some_and(|e| e.starts_with("invalid parameters")),
                    "{id} rejected its params: {:?}",
                    result.error
                );
            } else {
                assert!(result.success, "dry run of {id} failed: {:?}", result.error);
            }
        }
    }

    #[tokio::test]
    async fn invalid_params_are_reported() {
        let reg = registry();
        let mut store = Store::new();
        let result = reg
            .execute_skill(&mut store, "structural.createNodes", json!({ "nodes": "oops" }))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("invalid parameters"));
    }

    #[tokio::test]
    async fn policy_gate_runs_before_custom_skills() {
        let mut reg = registry();
        reg.register_handler(Named("custom.create")).unwrap();
        let manifest = ManifestData::new("g", "G", "static")
            .with_authority(MutationAuthority {
                allow_create: false,
                ..MutationAuthority::default()
            })
            .into_node("manifest");
        let mut store = Store::restore(GraphSnapshot {
            nodes: vec![manifest, Node::new("a", "task")],
            ..GraphSnapshot::default()
        });
        let result = reg.execute_skill(&mut store, "custom.create", json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("forbids create"));
    }
}
