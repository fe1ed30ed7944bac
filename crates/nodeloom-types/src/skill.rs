//! Skill descriptor and result types.
//!
//! A descriptor is the static metadata of a registered skill; a result is the
//! normalised outcome of one `execute_skill` call.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Skill family, used for listing and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Structural,
    Layout,
    Validation,
    Transformation,
    Automation,
    Custom,
}

impl SkillCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Layout => "layout",
            Self::Validation => "validation",
            Self::Transformation => "transformation",
            Self::Automation => "automation",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SkillCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structural" => Ok(Self::Structural),
            "layout" => Ok(Self::Layout),
            "validation" => Ok(Self::Validation),
            "transformation" | "transform" => Ok(Self::Transformation),
            "automation" => Ok(Self::Automation),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown skill category '{other}'")),
        }
    }
}

/// A kind of graph mutation gated by the manifest authority policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    pub const ALL: [MutationAction; 3] = [Self::Create, Self::Update, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared inputs, outputs, and forbidden side effects of a skill.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillContracts {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbidden: Vec<String>,
}

/// Static metadata describing a registered skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDescriptor {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: SkillCategory,
    pub supports_dry_run: bool,
    /// Maximal set of mutations the skill may perform.
    #[serde(default)]
    pub mutations: Vec<MutationAction>,
    #[serde(default)]
    pub contracts: SkillContracts,
}

impl SkillDescriptor {
    pub fn is_read_only(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Normalised outcome of one skill invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SkillResult {
    pub fn ok(data: Value, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            warnings,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }

    pub fn failure_with_data(error: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::failure(error)
        }
    }

    /// Look up a top-level field of `data`.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }
}
