//! Per-invocation context and output types shared by every skill.

use chrono::{DateTime, Utc};
use nodeloom_types::catalog::DefinitionCatalog;
use nodeloom_types::config::EngineConfig;
use nodeloom_types::validation::ValidationReport;
use serde_json::{Value, json};

use crate::event::EventBus;
use crate::graph_api::GraphApi;
use crate::script::BoxScriptRunner;

/// Everything a skill may touch during one invocation.
///
/// During a dry run `graph` is a read-only view: any mutator call fails with
/// `GraphError::ReadOnly`.
pub struct SkillContext<'a> {
    pub graph: &'a mut dyn GraphApi,
    pub now: DateTime<Utc>,
    pub dry_run: bool,
    /// Id the skill was invoked under.
    pub skill_id: &'a str,
    pub events: &'a EventBus,
    pub config: &'a EngineConfig,
    pub runner: Option<&'a BoxScriptRunner>,
    pub definitions: Option<&'a DefinitionCatalog>,
    /// Ids of every registered skill, sorted.
    pub skill_ids: &'a [String],
}

/// Successful (or validation-failed) outcome of a skill run.
///
/// `failure` is set by skills that complete normally but report a negative
/// verdict, such as a validation pass that found errors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkillOutput {
    pub data: Value,
    pub warnings: Vec<String>,
    pub failure: Option<String>,
}

impl SkillOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            failure: None,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Output of a validation skill: fails iff the report has errors.
    pub fn from_report(report: ValidationReport, mut extra: Value) -> Self {
        let error_count = report.errors.len();
        let warnings = report.warnings.iter().map(ToString::to_string).collect();
        let mut data = json!({
            "valid": report.is_valid(),
            "errors": report.errors,
            "warnings": report.warnings,
        });
        if let (Some(data), Some(extra)) = (data.as_object_mut(), extra.as_object_mut()) {
            data.append(extra);
        }
        Self {
            data,
            warnings,
            failure: (error_count > 0).then(|| format!("validation found {error_count} error(s)")),
        }
    }
}
