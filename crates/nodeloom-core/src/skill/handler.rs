//! Extension point for skills registered at runtime.
//!
//! Built-in skills are enum variants; anything else implements
//! [`SkillHandler`] and is registered as `Skill::Custom`.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use nodeloom_types::skill::{MutationAction, SkillDescriptor};
use serde_json::{Value, json};

use super::context::{SkillContext, SkillOutput};
use super::error::SkillError;

/// A user-supplied skill. Uses RPITIT for `run`.
pub trait SkillHandler: Send + Sync {
    fn descriptor(&self) -> SkillDescriptor;

    fn params_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    /// Mutations this particular call needs. Defaults to the declared maximum.
    fn required_mutations(&self, _params: &Value) -> BTreeSet<MutationAction> {
        self.descriptor().mutations.into_iter().collect()
    }

    fn run(
        &self,
        ctx: &mut SkillContext<'_>,
        params: Value,
    ) -> impl Future<Output = Result<SkillOutput, SkillError>> + Send;
}

/// Object-safe version of [`SkillHandler`] with boxed futures.
pub trait SkillHandlerDyn: Send + Sync {
    fn descriptor(&self) -> SkillDescriptor;

    fn params_schema(&self) -> Value;

    fn required_mutations(&self, params: &Value) -> BTreeSet<MutationAction>;

    fn run_boxed<'a, 'c>(
        &'a self,
        ctx: &'a mut SkillContext<'c>,
        params: Value,
    ) -> Pin<Box<dyn Future<Output = Result<SkillOutput, SkillError>> + Send + 'a>>;
}

impl<T: SkillHandler> SkillHandlerDyn for T {
    fn descriptor(&self) -> SkillDescriptor {
        SkillHandler::descriptor(self)
    }

    fn params_schema(&self) -> Value {
        SkillHandler::params_schema(self)
    }

    fn required_mutations(&self, params: &Value) -> BTreeSet<MutationAction> {
        SkillHandler::required_mutations(self, params)
    }

    fn run_boxed<'a, 'c>(
        &'a self,
        ctx: &'a mut SkillContext<'c>,
        params: Value,
    ) -> Pin<Box<dyn Future<Output = Result<SkillOutput, SkillError>> + Send + 'a>> {
        Box::pin(self.run(ctx, params))
    }
}
