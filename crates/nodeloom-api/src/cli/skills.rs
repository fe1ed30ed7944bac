//! `nloom skills` subcommands: list and describe.

use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use nodeloom_types::skill::SkillCategory;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum SkillsCommand {
    /// List registered skills.
    #[command(alias = "ls")]
    List {
        /// Only skills of this category (structural, layout, validation,
        /// transformation, automation, custom).
        #[arg(long, short)]
        category: Option<SkillCategory>,
    },

    /// Show a skill's descriptor and parameter schema.
    Describe {
        /// Skill id, e.g. "structural.createNodes".
        id: String,
    },
}

pub fn handle(state: &AppState, command: SkillsCommand, json: bool) -> Result<()> {
    match command {
        SkillsCommand::List { category } => list_skills(state, category, json),
        SkillsCommand::Describe { id } => describe_skill(state, &id, json),
    }
}

fn category_color(category: SkillCategory) -> Color {
    match category {
        SkillCategory::Structural => Color::Green,
        SkillCategory::Layout => Color::Blue,
        SkillCategory::Validation => Color::Yellow,
        SkillCategory::Transformation => Color::Magenta,
        SkillCategory::Automation => Color::Cyan,
        SkillCategory::Custom => Color::White,
    }
}

fn list_skills(state: &AppState, category: Option<SkillCategory>, json: bool) -> Result<()> {
    let skills = match category {
        Some(category) => state.registry.list_category(category),
        None => state.registry.list_skills(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&skills)?);
        return Ok(());
    }

    if skills.is_empty() {
        println!();
        println!("  {} No skills registered.", style("○").dim());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Id").fg(Color::Cyan),
            Cell::new("Category"),
            Cell::new("Mutates"),
            Cell::new("Dry run"),
            Cell::new("Title"),
        ]);

    for skill in &skills {
        let mutates = if skill.is_read_only() {
            "-".to_string()
        } else {
            skill
                .mutations
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        table.add_row(vec![
            Cell::new(&skill.id),
            Cell::new(skill.category.as_str()).fg(category_color(skill.category)),
            Cell::new(mutates),
            Cell::new(if skill.supports_dry_run { "yes" } else { "no" }),
            Cell::new(&skill.title),
        ]);
    }

    println!();
    println!("{table}");
    println!(
        "  {} {} skill(s), config from {}",
        style("ℹ").blue(),
        skills.len(),
        style(state.config_dir.display()).dim()
    );
    println!();
    Ok(())
}

fn describe_skill(state: &AppState, id: &str, json: bool) -> Result<()> {
    let Some(description) = state.registry.describe_skill(id) else {
        bail!("unknown skill '{id}' (see `nloom skills list`)");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&description)?);
        return Ok(());
    }

    let descriptor = &description.descriptor;
    println!();
    println!("  {} {}", style(&descriptor.title).bold(), style(&descriptor.id).cyan());
    println!("  {}", descriptor.description);
    println!();
    println!("  Category:  {}", descriptor.category);
    println!(
        "  Mutates:   {}",
        if descriptor.is_read_only() {
            "nothing".to_string()
        } else {
            descriptor
                .mutations
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        }
    );
    println!("  Dry run:   {}", if descriptor.supports_dry_run { "supported" } else { "not supported" });

    let contracts = &descriptor.contracts;
    if !contracts.inputs.is_empty() {
        println!("  Inputs:    {}", contracts.inputs.join(", "));
    }
    if !contracts.outputs.is_empty() {
        println!("  Outputs:   {}", contracts.outputs.join(", "));
    }
    if !contracts.forbidden.is_empty() {
        println!("  Forbidden: {}", style(contracts.forbidden.join(", ")).red());
    }

    println!();
    println!("  {}", style("Parameters (JSON Schema)").bold());
    for line in serde_json::to_string_pretty(&description.params_schema)?.lines() {
        println!("    {line}");
    }
    println!();
    Ok(())
}
