//! Structural skills: create, connect, group, reparent, duplicate, extract.

mod create_edges;
mod create_nodes;
mod duplicate;
mod extract;
mod grouping;
mod reparent;

use std::collections::BTreeSet;

use nodeloom_types::skill::{MutationAction, SkillCategory, SkillDescriptor};
use serde_json::Value;

pub use self::create_edges::{CreateEdgesParams, EdgeSpec};
pub use self::create_nodes::CreateNodesParams;
pub use self::duplicate::DuplicateParams;
pub use self::extract::ExtractSubgraphParams;
pub use self::grouping::{GroupAction, GroupingParams};
pub use self::reparent::ReparentParams;

pub(crate) use self::create_edges::{End, rebind_port, resolve_edges};
pub(crate) use self::create_nodes::{parse_nodes, prepare_nodes};
pub(crate) use self::grouping::recompute_bounds;

use super::{SkillContext, SkillError, SkillOutput, actions, contracts, decode, schema_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuralSkill {
    CreateNodes,
    CreateEdges,
    Grouping,
    Reparent,
    Duplicate,
    ExtractSubgraph,
}

impl StructuralSkill {
    pub const ALL: [StructuralSkill; 6] = [
        Self::CreateNodes,
        Self::CreateEdges,
        Self::Grouping,
        Self::Reparent,
        Self::Duplicate,
        Self::ExtractSubgraph,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::CreateNodes => "structural.createNodes",
            Self::CreateEdges => "structural.createEdges",
            Self::Grouping => "structural.grouping",
            Self::Reparent => "structural.reparent",
            Self::Duplicate => "structural.duplicate",
            Self::ExtractSubgraph => "structural.extractSubgraph",
        }
    }

    pub fn descriptor(&self) -> SkillDescriptor {
        use MutationAction::*;
        let (title, description, mutations, contracts) = match self {
            Self::CreateNodes => (
                "Create nodes",
                "Insert a batch of nodes, rejecting the batch on any id collision.",
                vec![Create],
                contracts(&["nodes"], &["created"], &["duplicate ids", "second manifest"]),
            ),
            Self::CreateEdges => (
                "Create edges",
                "Connect nodes, resolving or inferring handles and skipping or rejecting duplicates.",
                vec![Create],
                contracts(&["edges"], &["created"], &["dangling endpoints"]),
            ),
            Self::Grouping => (
                "Grouping",
                "Create, dissolve, or change the membership of a node group.",
                vec![Create, Update, Delete],
                contracts(&["action", "nodeIds", "groupId"], &["group"], &["groups under two nodes"]),
            ),
            Self::Reparent => (
                "Reparent nodes",
                "Move nodes out of their current groups and into a target group.",
                vec![Update],
                contracts(&["nodeIds", "targetGroupId"], &["removedFrom", "added"], &[]),
            ),
            Self::Duplicate => (
                "Duplicate nodes",
                "Clone nodes (and optionally their induced edges) with fresh ids and an offset.",
                vec![Create],
                contracts(&["nodeIds"], &["idMap", "nodes", "edges"], &[]),
            ),
            Self::ExtractSubgraph => (
                "Extract subgraph",
                "Return the induced subgraph of a node set, optionally wrapping it in a group.",
                vec![Create],
                contracts(&["nodeIds"], &["nodes", "edges", "groups"], &[]),
            ),
        };
        SkillDescriptor {
            id: self.id().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: SkillCategory::Structural,
            supports_dry_run: true,
            mutations,
            contracts,
        }
    }

    pub fn params_schema(&self) -> Value {
        match self {
            Self::CreateNodes => schema_of::<CreateNodesParams>(),
            Self::CreateEdges => schema_of::<CreateEdgesParams>(),
            Self::Grouping => schema_of::<GroupingParams>(),
            Self::Reparent => schema_of::<ReparentParams>(),
            Self::Duplicate => schema_of::<DuplicateParams>(),
            Self::ExtractSubgraph => schema_of::<ExtractSubgraphParams>(),
        }
    }

    pub fn decode(&self, params: &Value) -> Result<StructuralRequest, SkillError> {
        Ok(match self {
            Self::CreateNodes => StructuralRequest::CreateNodes(decode(params)?),
            Self::CreateEdges => StructuralRequest::CreateEdges(decode(params)?),
            Self::Grouping => StructuralRequest::Grouping(decode(params)?),
            Self::Reparent => StructuralRequest::Reparent(decode(params)?),
            Self::Duplicate => StructuralRequest::Duplicate(decode(params)?),
            Self::ExtractSubgraph => StructuralRequest::ExtractSubgraph(decode(params)?),
        })
    }
}

#[derive(Debug, Clone)]
pub enum StructuralRequest {
    CreateNodes(CreateNodesParams),
    CreateEdges(CreateEdgesParams),
    Grouping(GroupingParams),
    Reparent(ReparentParams),
    Duplicate(DuplicateParams),
    ExtractSubgraph(ExtractSubgraphParams),
}

impl StructuralRequest {
    pub fn required_mutations(&self) -> BTreeSet<MutationAction> {
        use MutationAction::*;
        match self {
            Self::CreateNodes(_) | Self::CreateEdges(_) | Self::Duplicate(_) => actions(&[Create]),
            Self::Grouping(p) => actions(&[p.action.required_mutation()]),
            Self::Reparent(_) => actions(&[Update]),
            Self::ExtractSubgraph(p) if p.create_group => actions(&[Create]),
            Self::ExtractSubgraph(_) => BTreeSet::new(),
        }
    }

    pub fn run(self, ctx: &mut SkillContext<'_>) -> Result<SkillOutput, SkillError> {
        match self {
            Self::CreateNodes(p) => create_nodes::run(ctx, p),
            Self::CreateEdges(p) => create_edges::run(ctx, p),
            Self::Grouping(p) => grouping::run(ctx, p),
            Self::Reparent(p) => reparent::run(ctx, p),
            Self::Duplicate(p) => duplicate::run(ctx, p),
            Self::ExtractSubgraph(p) => extract::run(ctx, p),
        }
    }
}
