//! Automation skills: scripts, command batches, procedural generation,
//! simulation steps, artifacts, and import/export.

mod artifact;
mod batch;
mod commands;
mod import_export;
mod procedural;
mod script;
mod simulation;

use std::collections::BTreeSet;

use nodeloom_types::skill::{MutationAction, SkillCategory, SkillDescriptor};
use serde_json::Value;

pub use self::artifact::{ArtifactFormat, CompileArtifactParams, compile};
pub use self::batch::BatchMutationParams;
pub use self::commands::{Command, CommandFailure, apply_commands, parse_commands};
pub use self::import_export::{
    EXPORT_VERSION, ExportParams, ExportPayload, ImportExportParams, ImportParams, export_subset,
};
pub use self::procedural::{Blueprint, ProceduralParams, substitute};
pub use self::script::ScriptExecutionParams;
pub use self::simulation::SimulationStepParams;

use super::{SkillContext, SkillError, SkillOutput, actions, contracts, decode, schema_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutomationSkill {
    ScriptExecution,
    BatchMutation,
    ProceduralGeneration,
    SimulationStep,
    CompileArtifact,
    ImportExport,
}

impl AutomationSkill {
    pub const ALL: [AutomationSkill; 6] = [
        Self::ScriptExecution,
        Self::BatchMutation,
        Self::ProceduralGeneration,
        Self::SimulationStep,
        Self::CompileArtifact,
        Self::ImportExport,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::ScriptExecution => "automation.scriptExecution",
            Self::BatchMutation => "automation.batchMutation",
            Self::ProceduralGeneration => "automation.proceduralGeneration",
            Self::SimulationStep => "automation.simulationStep",
            Self::CompileArtifact => "automation.compileArtifact",
            Self::ImportExport => "automation.importExport",
        }
    }

    pub fn descriptor(&self) -> SkillDescriptor {
        use MutationAction::*;
        let (title, description, mutations, contracts) = match self {
            Self::ScriptExecution => (
                "Script execution",
                "Run a script in the registered sandboxed runner and apply the commands it returns.",
                vec![Create, Update, Delete],
                contracts(&["script", "nodeId", "input", "applyCommands"], &["output", "logs", "appliedCount"], &[]),
            ),
            Self::BatchMutation => (
                "Batch mutation",
                "Apply a list of mutation commands in order, stopping at the first failure.",
                vec![Create, Update, Delete],
                contracts(&["commands"], &["appliedCount"], &[]),
            ),
            Self::ProceduralGeneration => (
                "Procedural generation",
                "Instantiate a node, edge, and group blueprint several times with token substitution.",
                vec![Create],
                contracts(&["blueprint", "count", "parameters", "offset"], &["nodes", "edges", "groups", "idMaps"], &[]),
            ),
            Self::SimulationStep => (
                "Simulation step",
                "Apply a mutation bundle and record before and after states of the touched nodes.",
                vec![Create, Update, Delete],
                contracts(&["mutations", "label"], &["touched", "before", "after"], &[]),
            ),
            Self::CompileArtifact => (
                "Compile artifact",
                "Serialize the graph to JSON, Markdown, or CSV with a content checksum.",
                vec![],
                contracts(&["format", "includeManifest"], &["content", "checksum", "stats"], &["mutation"]),
            ),
            Self::ImportExport => (
                "Import or export",
                "Export a subgraph payload, or import one with every id remapped.",
                vec![Create],
                contracts(&["mode", "nodeIds", "payload", "offset"], &["version", "idMap", "created"], &[]),
            ),
        };
        SkillDescriptor {
            id: self.id().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: SkillCategory::Automation,
            supports_dry_run: true,
            mutations,
            contracts,
        }
    }

    pub fn params_schema(&self) -> Value {
        match self {
            Self::ScriptExecution => schema_of::<ScriptExecutionParams>(),
            Self::BatchMutation => schema_of::<BatchMutationParams>(),
            Self::ProceduralGeneration => schema_of::<ProceduralParams>(),
            Self::SimulationStep => schema_of::<SimulationStepParams>(),
            Self::CompileArtifact => schema_of::<CompileArtifactParams>(),
            Self::ImportExport => schema_of::<ImportExportParams>(),
        }
    }

    pub fn decode(&self, params: &Value) -> Result<AutomationRequest, SkillError> {
        Ok(match self {
            Self::ScriptExecution => AutomationRequest::ScriptExecution(decode(params)?),
            Self::BatchMutation => AutomationRequest::BatchMutation(decode(params)?),
            Self::ProceduralGeneration => AutomationRequest::ProceduralGeneration(decode(params)?),
            Self::SimulationStep => AutomationRequest::SimulationStep(decode(params)?),
            Self::CompileArtifact => AutomationRequest::CompileArtifact(decode(params)?),
            Self::ImportExport => AutomationRequest::ImportExport(decode(params)?),
        })
    }
}

#[derive(Debug, Clone)]
pub enum AutomationRequest {
    ScriptExecution(ScriptExecutionParams),
    BatchMutation(BatchMutationParams),
    ProceduralGeneration(ProceduralParams),
    SimulationStep(SimulationStepParams),
    CompileArtifact(CompileArtifactParams),
    ImportExport(ImportExportParams),
}

impl AutomationRequest {
    pub fn required_mutations(&self) -> BTreeSet<MutationAction> {
        use MutationAction::*;
        match self {
            // Script commands are unknown until the runner returns; each is
            // checked as it is applied.
            Self::ScriptExecution(_) | Self::CompileArtifact(_) => BTreeSet::new(),
            Self::BatchMutation(p) => Command::required_actions(&p.commands),
            Self::SimulationStep(p) => Command::required_actions(&p.mutations),
            Self::ProceduralGeneration(_) => actions(&[Create]),
            Self::ImportExport(ImportExportParams::Export(_)) => BTreeSet::new(),
            Self::ImportExport(ImportExportParams::Import(_)) => actions(&[Create]),
        }
    }

    pub async fn run(self, ctx: &mut SkillContext<'_>) -> Result<SkillOutput, SkillError> {
        match self {
            Self::ScriptExecution(p) => script::run(ctx, p).await,
            Self::BatchMutation(p) => batch::run(ctx, p),
            Self::ProceduralGeneration(p) => procedural::run(ctx, p),
            Self::SimulationStep(p) => simulation::run(ctx, p),
            Self::CompileArtifact(p) => artifact::run(ctx, p),
            Self::ImportExport(p) => import_export::run(ctx, p),
        }
    }
}

#[cfg(test)]
mod tests {
    use nodeloom_types::manifest::MutationAuthority;
    use serde_json::json;

    use crate::graph_api::GraphApi;
    use crate::skill::test_support::{run, store_with_authority};

    #[tokio::test]
    async fn batch_is_gated_before_any_command_runs() {
        let mut store = store_with_authority(MutationAuthority {
            append_only: true,
            ..MutationAuthority::default()
        });
        let result = run(
            &mut store,
            "automation.batchMutation",
            json!({ "commands": [
                { "type": "updateNode", "id": "a", "patch": { "label": "changed" } },
                { "type": "deleteNode", "id": "c" }
            ] }),
        )
        .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("append-only"));
        assert_eq!(store.node("a").unwrap().label, "");
    }
}
