//! Transformation skills: refactor, normalize, typeMigration, schemaUpgrade,
//! inlineExtract.
//!
//! Each skill reads the graph, builds a complete [`MutationPlan`], and only
//! then writes. The plan is applied in a fixed order (creates, node updates,
//! edge updates, deletes, group membership) so redirected edges always see
//! the nodes they point at. Application is best-effort: a failing step stops
//! the rest, and earlier steps are not rolled back.

mod inline_extract;
mod migration;
mod normalize;
mod plan;
mod refactor;

use std::collections::BTreeSet;

use nodeloom_types::skill::{MutationAction, SkillCategory, SkillDescriptor};
use serde_json::Value;

pub use self::inline_extract::{ExtractParams, InlineExtractParams, InlineParams, NewNodeSpec};
pub use self::migration::{SchemaUpgradeParams, TypeMigrationParams, UpgradePatch};
pub use self::normalize::{FieldRef, NormalizeOp, NormalizeParams};
pub use self::plan::{FieldSpec, MutationPlan, PlanSummary, deep_merge};
pub use self::refactor::{MergeParams, RefactorParams, SplitParams, SplitPart};

use super::{SkillContext, SkillError, SkillOutput, actions, contracts, decode, schema_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformSkill {
    Refactor,
    Normalize,
    TypeMigration,
    SchemaUpgrade,
    InlineExtract,
}

impl TransformSkill {
    pub const ALL: [TransformSkill; 5] = [
        Self::Refactor,
        Self::Normalize,
        Self::TypeMigration,
        Self::SchemaUpgrade,
        Self::InlineExtract,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Refactor => "transform.refactor",
            Self::Normalize => "transform.normalize",
            Self::TypeMigration => "transform.typeMigration",
            Self::SchemaUpgrade => "transform.schemaUpgrade",
            Self::InlineExtract => "transform.inlineExtract",
        }
    }

    pub fn descriptor(&self) -> SkillDescriptor {
        use MutationAction::*;
        let (title, description, mutations, contracts) = match self {
            Self::Refactor => (
                "Refactor",
                "Split a node into parts or merge several nodes into one, rewiring edges.",
                vec![Create, Update, Delete],
                contracts(&["mode", "sourceId", "parts", "sourceIds", "targetId", "fields"], &["plan", "summary"], &[]),
            ),
            Self::Normalize => (
                "Normalize data",
                "Deduplicate arrays and move, copy, or set data fields, one patch per node.",
                vec![Update],
                contracts(&["operations"], &["changedNodes", "summary"], &[]),
            ),
            Self::TypeMigration => (
                "Type migration",
                "Remap, remove, default, and override data fields and optionally retype nodes.",
                vec![Update],
                contracts(
                    &["nodeIds", "fromType", "remap", "remove", "defaults", "overrides", "newType"],
                    &["migrated", "summary"],
                    &[],
                ),
            ),
            Self::SchemaUpgrade => (
                "Schema upgrade",
                "Merge patch fragments into nodes and record the target schema version.",
                vec![Update],
                contracts(&["targetVersion", "patch", "subsystem"], &["upgraded", "summary"], &[]),
            ),
            Self::InlineExtract => (
                "Inline or extract",
                "Move fields into another node, or spin named fields off into a new node.",
                vec![Create, Update, Delete],
                contracts(&["mode", "sourceId", "fields"], &["summary"], &[]),
            ),
        };
        SkillDescriptor {
            id: self.id().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: SkillCategory::Transformation,
            supports_dry_run: true,
            mutations,
            contracts,
        }
    }

    pub fn params_schema(&self) -> Value {
        match self {
            Self::Refactor => schema_of::<RefactorParams>(),
            Self::Normalize => schema_of::<NormalizeParams>(),
            Self::TypeMigration => schema_of::<TypeMigrationParams>(),
            Self::SchemaUpgrade => schema_of::<SchemaUpgradeParams>(),
            Self::InlineExtract => schema_of::<InlineExtractParams>(),
        }
    }

    pub fn decode(&self, params: &Value) -> Result<TransformRequest, SkillError> {
        Ok(match self {
            Self::Refactor => TransformRequest::Refactor(decode(params)?),
            Self::Normalize => TransformRequest::Normalize(decode(params)?),
            Self::TypeMigration => TransformRequest::TypeMigration(decode(params)?),
            Self::SchemaUpgrade => TransformRequest::SchemaUpgrade(decode(params)?),
            Self::InlineExtract => TransformRequest::InlineExtract(decode(params)?),
        })
    }
}

#[derive(Debug, Clone)]
pub enum TransformRequest {
    Refactor(RefactorParams),
    Normalize(NormalizeParams),
    TypeMigration(TypeMigrationParams),
    SchemaUpgrade(SchemaUpgradeParams),
    InlineExtract(InlineExtractParams),
}

impl TransformRequest {
    pub fn required_mutations(&self) -> BTreeSet<MutationAction> {
        use MutationAction::*;
        match self {
            Self::Refactor(RefactorParams::Split(p)) if p.delete_original => actions(&[Create, Update, Delete]),
            Self::Refactor(RefactorParams::Split(_)) => actions(&[Create, Update]),
            // Retargeting may drop self-loops and duplicate edges.
            Self::Refactor(RefactorParams::Merge(p)) if p.delete_empty_sources || p.retarget_edges => {
                actions(&[Update, Delete])
            }
            Self::Refactor(RefactorParams::Merge(_)) => actions(&[Update]),
            Self::Normalize(_) | Self::TypeMigration(_) | Self::SchemaUpgrade(_) => actions(&[Update]),
            Self::InlineExtract(InlineExtractParams::Inline(p)) if p.delete_source => actions(&[Update, Delete]),
            Self::InlineExtract(InlineExtractParams::Inline(_)) => actions(&[Update]),
            Self::InlineExtract(InlineExtractParams::Extract(p)) if p.strip_fields => actions(&[Create, Update]),
            Self::InlineExtract(InlineExtractParams::Extract(_)) => actions(&[Create]),
        }
    }

    pub fn run(self, ctx: &mut SkillContext<'_>) -> Result<SkillOutput, SkillError> {
        match self {
            Self::Refactor(p) => refactor::run(ctx, p),
            Self::Normalize(p) => normalize::run(ctx, p),
            Self::TypeMigration(p) => migration::type_migration(ctx, p),
            Self::SchemaUpgrade(p) => migration::schema_upgrade(ctx, p),
            Self::InlineExtract(p) => inline_extract::run(ctx, p),
        }
    }
}
