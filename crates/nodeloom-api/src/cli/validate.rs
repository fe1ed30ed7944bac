//! `nloom validate`: run the validation suite and print every finding.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::{Value, json};

use nodeloom_core::skill::ValidationSkill;
use nodeloom_infra::snapshot::restore_store;
use nodeloom_types::skill::SkillResult;
use nodeloom_types::validation::ValidationIssue;

use crate::cli::params::read_commands;
use crate::state::AppState;

/// One table row.
struct Finding {
    skill: &'static str,
    level: &'static str,
    code: String,
    target: String,
    message: String,
}

fn issues(data: Option<&Value>, key: &str) -> Vec<ValidationIssue> {
    data.and_then(|d| d.get(key))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

fn findings(skill: &'static str, result: &SkillResult) -> Vec<Finding> {
    let data = result.data.as_ref();
    let errors = issues(data, "errors");
    let warnings = issues(data, "warnings");

    let to_finding = |level: &'static str, issue: ValidationIssue| Finding {
        skill,
        level,
        code: issue.code.to_string(),
        target: match (issue.entity, issue.id) {
            (Some(entity), Some(id)) => format!("{entity} {id}"),
            (_, Some(id)) => id,
            _ => String::new(),
        },
        message: issue.message,
    };

    let mut rows: Vec<Finding> = errors.into_iter().map(|i| to_finding("error", i)).collect();
    // A skill that failed before producing a report still gets a row.
    if rows.is_empty()
        && !result.success
        && let Some(error) = &result.error
    {
        rows.push(Finding {
            skill,
            level: "error",
            code: "SKILL_FAILED".to_string(),
            target: String::new(),
            message: error.clone(),
        });
    }
    rows.extend(warnings.into_iter().map(|i| to_finding("warning", i)));
    rows
}

/// Returns whether the graph passed every check.
pub async fn validate_graph(
    state: &AppState,
    graph: &Path,
    commands: Option<&str>,
    json: bool,
    quiet: bool,
) -> Result<bool> {
    let mut store = restore_store(graph).await?;

    let mut runs: Vec<(ValidationSkill, Value)> =
        ValidationSkill::graph_checks().map(|skill| (skill, json!({}))).collect();
    if let Some(raw) = commands {
        let commands = read_commands(raw).await?;
        runs.push((ValidationSkill::UnsafeMutation, json!({ "commands": commands })));
    }

    let mut results = Vec::with_capacity(runs.len());
    for (skill, params) in runs {
        let result = state.registry.execute_skill(&mut store, skill.id(), params).await;
        results.push((skill.id(), result));
    }
    let valid = results.iter().all(|(_, r)| r.success);
    tracing::info!(path = %graph.display(), checks = results.len(), valid, "validation finished");

    if json {
        let checks: Vec<Value> = results
            .iter()
            .map(|(skill, result)| json!({ "skill": skill, "result": result }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "valid": valid, "checks": checks }))?);
        return Ok(valid);
    }

    let rows: Vec<Finding> = results
        .iter()
        .flat_map(|(skill, result)| findings(skill, result))
        .collect();

    if quiet && valid {
        return Ok(valid);
    }

    println!();
    if rows.is_empty() {
        println!(
            "  {} {} passed {} checks",
            style("✓").green(),
            style(graph.display()).cyan(),
            results.len()
        );
        println!();
        return Ok(valid);
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Check").fg(Color::Cyan),
            Cell::new("Level"),
            Cell::new("Code"),
            Cell::new("Target"),
            Cell::new("Message"),
        ]);
    for row in &rows {
        let level_color = if row.level == "error" { Color::Red } else { Color::Yellow };
        table.add_row(vec![
            Cell::new(row.skill),
            Cell::new(row.level).fg(level_color),
            Cell::new(&row.code),
            Cell::new(&row.target),
            Cell::new(&row.message),
        ]);
    }
    println!("{table}");

    let errors = rows.iter().filter(|r| r.level == "error").count();
    let warnings = rows.len() - errors;
    let mark = if valid { style("✓").green() } else { style("✗").red() };
    println!("  {mark} {errors} error(s), {warnings} warning(s) across {} checks", results.len());
    println!();
    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_skill_without_report_still_shows_up() {
        let result = SkillResult {
            success: false,
            data: None,
            error: Some("boom".to_string()),
            warnings: Vec::new(),
        };
        let rows = findings("validation.schema", &result);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, "SKILL_FAILED");
    }

    #[test]
    fn report_issues_become_rows() {
        let result = SkillResult {
            success: false,
            data: Some(json!({
                "valid": false,
                "errors": [{ "code": "MISSING_NODE", "message": "edge points nowhere", "entity": "edge", "id": "e1" }],
                "warnings": [{ "code": "ORPHAN", "message": "not connected" }],
            })),
            error: Some("validation found 1 error(s)".to_string()),
            warnings: Vec::new(),
        };
        let rows = findings("validation.ports", &result);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].level, "error");
        assert_eq!(rows[0].code, "MISSING_NODE");
        assert_eq!(rows[0].target, "edge e1");
        assert_eq!(rows[1].level, "warning");
        assert_eq!(rows[1].target, "");
    }
}
