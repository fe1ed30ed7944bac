//! Structured validation findings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::EntityKind;

/// Machine-readable code attached to every validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    DuplicateId,
    MissingNode,
    MissingHandle,
    TypeMismatch,
    DirectionMismatch,
    AmbiguousHandle,
    GroupTooSmall,
    InvalidDimensions,
    MissingManifest,
    MultipleManifests,
    MissingField,
    InvalidField,
    MissingNodeType,
    MissingSkill,
    MissingDefinition,
    DirectReplace,
    ClearGraph,
    DeleteRecreate,
    MassDelete,
    IntentMismatch,
    Orphan,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateId => "DUPLICATE_ID",
            Self::MissingNode => "MISSING_NODE",
            Self::MissingHandle => "MISSING_HANDLE",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::DirectionMismatch => "DIRECTION_MISMATCH",
            Self::AmbiguousHandle => "AMBIGUOUS_HANDLE",
            Self::GroupTooSmall => "GROUP_TOO_SMALL",
            Self::InvalidDimensions => "INVALID_DIMENSIONS",
            Self::MissingManifest => "MISSING_MANIFEST",
            Self::MultipleManifests => "MULTIPLE_MANIFESTS",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidField => "INVALID_FIELD",
            Self::MissingNodeType => "MISSING_NODE_TYPE",
            Self::MissingSkill => "MISSING_SKILL",
            Self::MissingDefinition => "MISSING_DEFINITION",
            Self::DirectReplace => "DIRECT_REPLACE",
            Self::ClearGraph => "CLEAR_GRAPH",
            Self::DeleteRecreate => "DELETE_RECREATE",
            Self::MassDelete => "MASS_DELETE",
            Self::IntentMismatch => "INTENT_MISMATCH",
            Self::Orphan => "ORPHAN",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error or warning produced by a validation skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            entity: None,
            id: None,
        }
    }

    pub fn on(mut self, entity: EntityKind, id: impl Into<String>) -> Self {
        self.entity = Some(entity);
        self.id = Some(id.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.entity, &self.id) {
            (Some(entity), Some(id)) => write!(f, "[{}] {entity} '{id}': {}", self.code, self.message),
            _ => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Errors and warnings from one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    pub fn warn(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    pub fn extend(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|i| i.code == code)
    }

    pub fn has_warning(&self, code: IssueCode) -> bool {
        self.warnings.iter().any(|i| i.code == code)
    }
}
