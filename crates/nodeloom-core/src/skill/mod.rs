//! Built-in skill families and the `Skill` sum type the registry stores.
//!
//! Each family is an enum of skill kinds. Decoding a kind's untyped JSON
//! params yields a typed request; the request knows which mutations it needs
//! and how to run itself.

pub mod automation;
pub mod context;
pub mod error;
pub mod handler;
pub mod layout;
pub mod structural;
pub mod transform;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::BTreeSet;
use std::sync::Arc;

use nodeloom_types::skill::{MutationAction, SkillContracts, SkillDescriptor};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use self::automation::{AutomationRequest, AutomationSkill};
pub use self::context::{SkillContext, SkillOutput};
pub use self::error::SkillError;
pub use self::handler::{SkillHandler, SkillHandlerDyn};
pub use self::layout::{LayoutRequest, LayoutSkill};
pub use self::structural::{StructuralRequest, StructuralSkill};
pub use self::transform::{TransformRequest, TransformSkill};
pub use self::validation::{ValidationRequest, ValidationSkill};

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// A registrable skill.
#[derive(Clone)]
pub enum Skill {
    Structural(StructuralSkill),
    Layout(LayoutSkill),
    Validation(ValidationSkill),
    Transform(TransformSkill),
    Automation(AutomationSkill),
    Custom(Arc<dyn SkillHandlerDyn>),
}

impl std::fmt::Debug for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structural(s) => f.debug_tuple("Structural").field(s).finish(),
            Self::Layout(s) => f.debug_tuple("Layout").field(s).finish(),
            Self::Validation(s) => f.debug_tuple("Validation").field(s).finish(),
            Self::Transform(s) => f.debug_tuple("Transform").field(s).finish(),
            Self::Automation(s) => f.debug_tuple("Automation").field(s).finish(),
            Self::Custom(h) => f.debug_tuple("Custom").field(&h.descriptor().id).finish(),
        }
    }
}

impl Skill {
    pub fn custom<H: SkillHandler + 'static>(handler: H) -> Self {
        Self::Custom(Arc::new(handler))
    }

    pub fn descriptor(&self) -> SkillDescriptor {
        match self {
            Self::Structural(s) => s.descriptor(),
            Self::Layout(s) => s.descriptor(),
            Self::Validation(s) => s.descriptor(),
            Self::Transform(s) => s.descriptor(),
            Self::Automation(s) => s.descriptor(),
            Self::Custom(h) => h.descriptor(),
        }
    }

    pub fn params_schema(&self) -> Value {
        match self {
            Self::Structural(s) => s.params_schema(),
            Self::Layout(s) => s.params_schema(),
            Self::Validation(s) => s.params_schema(),
            Self::Transform(s) => s.params_schema(),
            Self::Automation(s) => s.params_schema(),
            Self::Custom(h) => h.params_schema(),
        }
    }

    /// Validate untyped params into a typed request.
    pub fn decode(&self, params: &Value) -> Result<SkillRequest, SkillError> {
        Ok(match self {
            Self::Structural(s) => SkillRequest::Structural(s.decode(params)?),
            Self::Layout(s) => SkillRequest::Layout(s.decode(params)?),
            Self::Validation(s) => SkillRequest::Validation(s.decode(params)?),
            Self::Transform(s) => SkillRequest::Transform(s.decode(params)?),
            Self::Automation(s) => SkillRequest::Automation(s.decode(params)?),
            Self::Custom(h) => SkillRequest::Custom(Arc::clone(h), params.clone()),
        })
    }
}

/// Every built-in skill, in family order.
pub fn builtin_skills() -> Vec<Skill> {
    StructuralSkill::ALL
        .into_iter()
        .map(Skill::Structural)
        .chain(LayoutSkill::ALL.into_iter().map(Skill::Layout))
        .chain(ValidationSkill::ALL.into_iter().map(Skill::Validation))
        .chain(TransformSkill::ALL.into_iter().map(Skill::Transform))
        .chain(AutomationSkill::ALL.into_iter().map(Skill::Automation))
        .collect()
}

// ---------------------------------------------------------------------------
// SkillRequest
// ---------------------------------------------------------------------------

/// A decoded invocation, ready for the policy check and run.
pub enum SkillRequest {
    Structural(StructuralRequest),
    Layout(LayoutRequest),
    Validation(ValidationRequest),
    Transform(TransformRequest),
    Automation(AutomationRequest),
    Custom(Arc<dyn SkillHandlerDyn>, Value),
}

impl SkillRequest {
    /// Mutation actions this call needs, checked against the manifest
    /// policy before the skill runs.
    pub fn required_mutations(&self) -> BTreeSet<MutationAction> {
        match self {
            Self::Structural(r) => r.required_mutations(),
            Self::Layout(r) => r.required_mutations(),
            Self::Validation(_) => BTreeSet::new(),
            Self::Transform(r) => r.required_mutations(),
            Self::Automation(r) => r.required_mutations(),
            Self::Custom(h, params) => h.required_mutations(params),
        }
    }

    pub async fn run(self, ctx: &mut SkillContext<'_>) -> Result<SkillOutput, SkillError> {
        match self {
            Self::Structural(r) => r.run(ctx),
            Self::Layout(r) => r.run(ctx),
            Self::Validation(r) => r.run(ctx),
            Self::Transform(r) => r.run(ctx),
            Self::Automation(r) => r.run(ctx).await,
            Self::Custom(h, params) => h.run_boxed(ctx, params).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Decode params into `T`. `null` params decode like an empty object.
pub(crate) fn decode<T: DeserializeOwned>(params: &Value) -> Result<T, SkillError> {
    let params = match params {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|e| SkillError::InvalidParams(e.to_string()))
}

pub(crate) fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

pub(crate) fn contracts(inputs: &[&str], outputs: &[&str], forbidden: &[&str]) -> SkillContracts {
    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }
    SkillContracts {
        inputs: owned(inputs),
        outputs: owned(outputs),
        forbidden: owned(forbidden),
    }
}

pub(crate) fn actions(items: &[MutationAction]) -> BTreeSet<MutationAction> {
    items.iter().copied().collect()
}

pub(crate) fn default_true() -> bool {
    true
}

/// Ids in `wanted` that are not in `present`, preserving order.
pub(crate) fn missing_ids<'a>(
    wanted: impl IntoIterator<Item = &'a String>,
    present: &std::collections::HashSet<&str>,
) -> Vec<String> {
    wanted
        .into_iter()
        .filter(|id| !present.contains(id.as_str()))
        .cloned()
        .collect()
}
