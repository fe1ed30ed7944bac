use nodeloom_types::error::GraphError;
use nodeloom_types::graph::EntityKind;
use serde_json::{Value, json};

use crate::path::PathError;
use crate::policy::PolicyError;
use crate::script::ScriptError;

/// Why a skill invocation did not complete.
///
/// Never escapes the registry: `execute_skill` normalises every variant into
/// a failed `SkillResult`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SkillError {
    #[error("unknown skill '{0}'")]
    UnknownSkill(String),

    #[error("skill '{0}' does not support dry run")]
    DryRunUnsupported(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Referenced entities are missing or the request conflicts with the
    /// graph. `data` carries the structured detail returned to the caller.
    #[error("{message}")]
    Precondition { message: String, data: Option<Value> },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("skill panicked: {0}")]
    Panicked(String),
}

impl SkillError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            data: None,
        }
    }

    pub fn precondition_with(message: impl Into<String>, data: Value) -> Self {
        Self::Precondition {
            message: message.into(),
            data: Some(data),
        }
    }

    /// Precondition failure for entities referenced by params but absent
    /// from the graph.
    pub fn missing(kind: EntityKind, ids: Vec<String>) -> Self {
        let errors: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "entity": kind, "id": id, "message": format!("{kind} '{id}' not found") }))
            .collect();
        Self::precondition_with(
            format!("{kind}(s) not found: {}", ids.join(", ")),
            json!({ "errors": errors }),
        )
    }

    /// Structured detail for the failed result, if any.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Precondition { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}
