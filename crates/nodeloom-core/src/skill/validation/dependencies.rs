use std::collections::BTreeSet;

use nodeloom_types::graph::{EntityKind, GraphSnapshot};
use nodeloom_types::manifest::dependencies_of;
use nodeloom_types::validation::{IssueCode, ValidationIssue, ValidationReport};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::skill::{SkillContext, SkillOutput};

/// Explicit requirements. Absent lists fall back to the manifest's
/// `dependencies` section.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DependencyParams {
    #[serde(default)]
    pub required_node_types: Option<Vec<String>>,
    #[serde(default)]
    pub required_skills: Option<Vec<String>>,
    #[serde(default)]
    pub required_definitions: Option<Vec<String>>,
}

pub(super) fn run(ctx: &SkillContext<'_>, snapshot: &GraphSnapshot, params: DependencyParams) -> SkillOutput {
    let declared = snapshot.manifest().map(dependencies_of).unwrap_or_default();
    let node_types = params.required_node_types.unwrap_or(declared.node_types);
    let skills = params.required_skills.unwrap_or(declared.skills);
    let definitions = params.required_definitions.unwrap_or_default();

    let mut report = ValidationReport::default();

    let present_types: BTreeSet<&str> = snapshot.nodes.iter().map(|n| n.node_type.as_str()).collect();
    for node_type in &node_types {
        if !present_types.contains(node_type.as_str()) {
            report.error(ValidationIssue::new(
                IssueCode::MissingNodeType,
                format!("no node of required type '{node_type}'"),
            ));
        }
    }

    for skill in &skills {
        if ctx.skill_ids.binary_search(skill).is_err() {
            report.error(ValidationIssue::new(
                IssueCode::MissingSkill,
                format!("required skill '{skill}' is not registered"),
            ));
        }
    }

    // Definition ids referenced by nodes, plus the explicit list.
    let referenced: Vec<(Option<&str>, &str)> = snapshot
        .nodes
        .iter()
        .filter_map(|n| {
            n.data
                .get("definitionId")
                .and_then(Value::as_str)
                .map(|d| (Some(n.id.as_str()), d))
        })
        .chain(definitions.iter().map(|d| (None, d.as_str())))
        .collect();

    match ctx.definitions {
        None if !referenced.is_empty() => report.warn(ValidationIssue::new(
            IssueCode::MissingDefinition,
            format!(
                "no definition catalogue supplied; skipped {} definition check(s)",
                referenced.len()
            ),
        )),
        None => {}
        Some(catalog) => {
            for (node_id, definition) in &referenced {
                if catalog.contains(definition) {
                    continue;
                }
                let issue = ValidationIssue::new(
                    IssueCode::MissingDefinition,
                    format!("definition '{definition}' is not in the catalogue"),
                );
                report.error(match node_id {
                    Some(id) => issue.on(EntityKind::Node, *id),
                    None => issue,
                });
            }
        }
    }

    SkillOutput::from_report(
        report,
        json!({
            "checked": {
                "nodeTypes": node_types,
                "skills": skills,
                "definitions": referenced.len(),
            }
        }),
    )
}
