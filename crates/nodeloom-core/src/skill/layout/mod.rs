//! Layout skills.
//!
//! `autoLayout` and `rerouteEdges` only publish an intent for the external
//! layout engine. The other three move nodes themselves and report every
//! move as `{id, from, to}`.

mod align;
mod collisions;
mod intents;
mod spacing;

use std::collections::{BTreeSet, HashSet};

use nodeloom_types::graph::{EntityKind, Node, NodePatch, Position};
use nodeloom_types::skill::{MutationAction, SkillCategory, SkillDescriptor};
use serde::Serialize;
use serde_json::Value;

pub use self::align::{AlignDistributeParams, AlignMode};
pub use self::collisions::{AvoidCollisionsParams, MAX_COLLISION_SHIFTS};
pub use self::intents::LayoutIntentParams;
pub use self::spacing::NormalizeSpacingParams;

use super::{SkillContext, SkillError, SkillOutput, actions, contracts, decode, missing_ids, schema_of};
use crate::graph_api::GraphApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutSkill {
    AutoLayout,
    RerouteEdges,
    AvoidCollisions,
    AlignDistribute,
    NormalizeSpacing,
}

impl LayoutSkill {
    pub const ALL: [LayoutSkill; 5] = [
        Self::AutoLayout,
        Self::RerouteEdges,
        Self::AvoidCollisions,
        Self::AlignDistribute,
        Self::NormalizeSpacing,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::AutoLayout => "layout.autoLayout",
            Self::RerouteEdges => "layout.rerouteEdges",
            Self::AvoidCollisions => "layout.avoidCollisions",
            Self::AlignDistribute => "layout.alignDistribute",
            Self::NormalizeSpacing => "layout.normalizeSpacing",
        }
    }

    pub fn descriptor(&self) -> SkillDescriptor {
        let (title, description, mutations, contracts) = match self {
            Self::AutoLayout => (
                "Auto layout",
                "Ask the layout engine to lay out the whole graph.",
                vec![],
                contracts(&["layoutType"], &["event"], &["direct geometry"]),
            ),
            Self::RerouteEdges => (
                "Reroute edges",
                "Ask the layout engine to recompute edge routes.",
                vec![],
                contracts(&[], &["event"], &["direct geometry"]),
            ),
            Self::AvoidCollisions => (
                "Avoid collisions",
                "Shift nodes along an axis until their padded boxes stop overlapping.",
                vec![MutationAction::Update],
                contracts(&["nodeIds", "axis", "spacing", "padding"], &["moves"], &["moving locked nodes"]),
            ),
            Self::AlignDistribute => (
                "Align and distribute",
                "Align nodes to an edge or center of their bounding box, or spread them evenly.",
                vec![MutationAction::Update],
                contracts(&["nodeIds", "mode"], &["moves"], &["moving locked nodes"]),
            ),
            Self::NormalizeSpacing => (
                "Normalize spacing",
                "Place nodes at a fixed pitch along an axis, anchored on locked nodes.",
                vec![MutationAction::Update],
                contracts(&["nodeIds", "axis", "spacing"], &["moves"], &["moving locked nodes"]),
            ),
        };
        SkillDescriptor {
            id: self.id().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: SkillCategory::Layout,
            supports_dry_run: true,
            mutations,
            contracts,
        }
    }

    pub fn params_schema(&self) -> Value {
        match self {
            Self::AutoLayout | Self::RerouteEdges => schema_of::<LayoutIntentParams>(),
            Self::AvoidCollisions => schema_of::<AvoidCollisionsParams>(),
            Self::AlignDistribute => schema_of::<AlignDistributeParams>(),
            Self::NormalizeSpacing => schema_of::<NormalizeSpacingParams>(),
        }
    }

    pub fn decode(&self, params: &Value) -> Result<LayoutRequest, SkillError> {
        Ok(match self {
            Self::AutoLayout => LayoutRequest::AutoLayout(decode(params)?),
            Self::RerouteEdges => LayoutRequest::RerouteEdges(decode(params)?),
            Self::AvoidCollisions => LayoutRequest::AvoidCollisions(decode(params)?),
            Self::AlignDistribute => LayoutRequest::AlignDistribute(decode(params)?),
            Self::NormalizeSpacing => LayoutRequest::NormalizeSpacing(decode(params)?),
        })
    }
}

#[derive(Debug, Clone)]
pub enum LayoutRequest {
    AutoLayout(LayoutIntentParams),
    RerouteEdges(LayoutIntentParams),
    AvoidCollisions(AvoidCollisionsParams),
    AlignDistribute(AlignDistributeParams),
    NormalizeSpacing(NormalizeSpacingParams),
}

impl LayoutRequest {
    pub fn required_mutations(&self) -> BTreeSet<MutationAction> {
        match self {
            Self::AutoLayout(_) | Self::RerouteEdges(_) => BTreeSet::new(),
            _ => actions(&[MutationAction::Update]),
        }
    }

    pub fn run(self, ctx: &mut SkillContext<'_>) -> Result<SkillOutput, SkillError> {
        match self {
            Self::AutoLayout(p) => intents::run(ctx, "layout", p),
            Self::RerouteEdges(p) => intents::run(ctx, "reroute", p),
            Self::AvoidCollisions(p) => collisions::run(ctx, p),
            Self::AlignDistribute(p) => align::run(ctx, p),
            Self::NormalizeSpacing(p) => spacing::run(ctx, p),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// One planned node move.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeMove {
    pub id: String,
    pub from: Position,
    pub to: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shifts: Option<usize>,
}

/// The nodes a layout skill works on: the named ones, or every non-manifest
/// node when no ids are given.
pub(crate) fn select_nodes(graph: &dyn GraphApi, ids: Option<&[String]>) -> Result<Vec<Node>, SkillError> {
    let nodes = graph.nodes();
    match ids {
        None => Ok(nodes.into_iter().filter(|n| !n.is_manifest()).collect()),
        Some(ids) => {
            let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            let missing = missing_ids(ids, &present);
            if !missing.is_empty() {
                return Err(SkillError::missing(EntityKind::Node, missing));
            }
            let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            Ok(nodes.into_iter().filter(|n| wanted.contains(n.id.as_str())).collect())
        }
    }
}

/// Apply planned moves unless this is a dry run.
pub(crate) fn apply_moves(ctx: &mut SkillContext<'_>, moves: &[NodeMove]) -> Result<(), SkillError> {
    if ctx.dry_run {
        return Ok(());
    }
    for mv in moves {
        ctx.graph.update_node(&mv.id, &NodePatch::position(mv.to))?;
    }
    tracing::debug!(skill = ctx.skill_id, moved = moves.len(), "applied layout moves");
    Ok(())
}

/// Warning for locked nodes a skill left in place.
pub(crate) fn locked_warning(locked: &[String]) -> Option<String> {
    (!locked.is_empty()).then(|| format!("skipped locked node(s): {}", locked.join(", ")))
}
