use crate::graph::EntityKind;

/// Ordinary domain failures raised by a graph store.
///
/// These are expected outcomes of a mutation request, not bugs: skills turn
/// them into precondition failures on the result they return.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("edge '{0}' not found")]
    EdgeNotFound(String),

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("{kind} id '{id}' already exists")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("{kind} id must not be empty")]
    EmptyId { kind: EntityKind },

    #[error("edge '{edge}' references missing node '{node}'")]
    MissingEndpoint { edge: String, node: String },

    #[error("group '{group}' needs at least two member nodes, got {count}")]
    GroupTooSmall { group: String, count: usize },

    #[error("group '{group}' references missing node '{node}'")]
    MissingMember { group: String, node: String },

    #[error("graph is read-only in dry-run mode")]
    ReadOnly,
}

impl GraphError {
    /// Whether the failure is a dangling reference to a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound(_)
                | Self::EdgeNotFound(_)
                | Self::GroupNotFound(_)
                | Self::MissingEndpoint { .. }
                | Self::MissingMember { .. }
        )
    }
}
