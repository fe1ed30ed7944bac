//! Validation skills.
//!
//! Every validation skill is read-only and reports findings as a
//! [`ValidationReport`]: the call fails iff the report has errors.
//! `orphans` only ever warns.

mod dependencies;
mod intent;
mod manifest;
mod orphans;
mod ports;
mod schema;
mod unsafe_mutation;

use nodeloom_types::skill::{SkillCategory, SkillDescriptor};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

pub use self::dependencies::DependencyParams;
pub use self::manifest::validate_manifest;
pub use self::orphans::find_orphans;
pub use self::ports::validate_ports;
pub use self::schema::{validate_edges, validate_groups, validate_nodes, validate_schema};
pub use self::unsafe_mutation::{UnsafeMutationParams, analyze_commands};

use super::{SkillContext, SkillError, SkillOutput, contracts, decode, schema_of};

/// Params for validators that take nothing but `dryRun`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoParams {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationSkill {
    Schema,
    Ports,
    Manifest,
    Dependencies,
    Orphans,
    UnsafeMutation,
    Intent,
}

impl ValidationSkill {
    pub const ALL: [ValidationSkill; 7] = [
        Self::Schema,
        Self::Ports,
        Self::Manifest,
        Self::Dependencies,
        Self::Orphans,
        Self::UnsafeMutation,
        Self::Intent,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Schema => "validation.schema",
            Self::Ports => "validation.ports",
            Self::Manifest => "validation.manifest",
            Self::Dependencies => "validation.dependencies",
            Self::Orphans => "validation.orphans",
            Self::UnsafeMutation => "validation.unsafeMutation",
            Self::Intent => "validation.intent",
        }
    }

    /// Validators that look only at the graph. `unsafeMutation` is excluded
    /// because it needs a command list.
    pub fn graph_checks() -> impl Iterator<Item = ValidationSkill> {
        Self::ALL.into_iter().filter(|s| *s != Self::UnsafeMutation)
    }

    pub fn descriptor(&self) -> SkillDescriptor {
        let (title, description, contracts) = match self {
            Self::Schema => (
                "Schema validation",
                "Check ids, endpoints, group sizes, and dimensions of every entity.",
                contracts(&[], &["valid", "errors", "warnings"], &[]),
            ),
            Self::Ports => (
                "Port validation",
                "Check that edge ports exist, face the right way, and carry compatible data types.",
                contracts(&[], &["valid", "errors", "warnings"], &[]),
            ),
            Self::Manifest => (
                "Manifest validation",
                "Check that exactly one manifest exists and that its sections are complete.",
                contracts(&[], &["valid", "errors", "warnings"], &[]),
            ),
            Self::Dependencies => (
                "Dependency validation",
                "Check that required node types, skills, and definitions are available.",
                contracts(
                    &["requiredNodeTypes", "requiredSkills", "requiredDefinitions"],
                    &["valid", "errors", "warnings", "checked"],
                    &[],
                ),
            ),
            Self::Orphans => (
                "Orphan detection",
                "Warn about nodes with no edges and no group.",
                contracts(&[], &["valid", "warnings", "orphans"], &[]),
            ),
            Self::UnsafeMutation => (
                "Unsafe mutation analysis",
                "Statically flag destructive patterns in a proposed command list.",
                contracts(&["commands", "massDeleteThreshold"], &["valid", "errors", "warnings"], &[]),
            ),
            Self::Intent => (
                "Intent validation",
                "Cross-check the manifest's intent against what the graph contains.",
                contracts(&[], &["valid", "errors", "warnings", "intent"], &[]),
            ),
        };
        SkillDescriptor {
            id: self.id().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: SkillCategory::Validation,
            supports_dry_run: true,
            mutations: Vec::new(),
            contracts,
        }
    }

    pub fn params_schema(&self) -> Value {
        match self {
            Self::Dependencies => schema_of::<DependencyParams>(),
            Self::UnsafeMutation => schema_of::<UnsafeMutationParams>(),
            _ => schema_of::<NoParams>(),
        }
    }

    pub fn decode(&self, params: &Value) -> Result<ValidationRequest, SkillError> {
        Ok(match self {
            Self::Schema => ValidationRequest::Schema,
            Self::Ports => ValidationRequest::Ports,
            Self::Manifest => ValidationRequest::Manifest,
            Self::Dependencies => ValidationRequest::Dependencies(decode(params)?),
            Self::Orphans => ValidationRequest::Orphans,
            Self::UnsafeMutation => ValidationRequest::UnsafeMutation(decode(params)?),
            Self::Intent => ValidationRequest::Intent,
        })
    }
}

#[derive(Debug, Clone)]
pub enum ValidationRequest {
    Schema,
    Ports,
    Manifest,
    Dependencies(DependencyParams),
    Orphans,
    UnsafeMutation(UnsafeMutationParams),
    Intent,
}

impl ValidationRequest {
    pub fn run(self, ctx: &mut SkillContext<'_>) -> Result<SkillOutput, SkillError> {
        let snapshot = ctx.graph.snapshot();
        Ok(match self {
            Self::Schema => SkillOutput::from_report(validate_schema(&snapshot), Value::Null),
            Self::Ports => SkillOutput::from_report(validate_ports(&snapshot), Value::Null),
            Self::Manifest => SkillOutput::from_report(validate_manifest(&snapshot), Value::Null),
            Self::Dependencies(p) => dependencies::run(ctx, &snapshot, p),
            Self::Orphans => orphans::run(&snapshot),
            Self::UnsafeMutation(p) => unsafe_mutation::run(ctx, p),
            Self::Intent => intent::run(&snapshot),
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use nodeloom_types::graph::GraphSnapshot;

    use crate::store::Store;

    /// A store holding `snapshot` as-is, invariant violations included.
    pub fn broken(snapshot: GraphSnapshot) -> Store {
        Store::restore(snapshot)
    }
}
