//! `nloom run`: execute one skill against a snapshot file.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use nodeloom_core::graph_api::GraphApi;
use nodeloom_infra::snapshot::{load_store, write_snapshot};
use nodeloom_types::event::GraphEvent;
use nodeloom_types::skill::SkillResult;

use crate::cli::params::read_params;
use crate::state::AppState;

pub struct RunArgs<'a> {
    pub skill: &'a str,
    pub graph: &'a Path,
    pub params: Option<&'a str>,
    pub dry_run: bool,
    pub write: bool,
}

/// Returns whether the skill succeeded.
pub async fn run_skill(state: &AppState, args: RunArgs<'_>, json: bool, quiet: bool) -> Result<bool> {
    let mut store = load_store(args.graph).await?;
    let mut params = read_params(args.params).await?;
    if args.dry_run {
        params.insert("dryRun".to_string(), Value::Bool(true));
    }

    let mut events = state.registry.events().subscribe();
    let result = state
        .registry
        .execute_skill(&mut store, args.skill, Value::Object(params))
        .await;
    let events = drain(&mut events);

    let written = result.success && args.write;
    if written {
        write_snapshot(args.graph, &store.snapshot())
            .await
            .with_context(|| format!("failed to write {}", args.graph.display()))?;
        tracing::info!(skill = args.skill, path = %args.graph.display(), "graph written back");
    }

    if json {
        let out = json!({
            "skill": args.skill,
            "dryRun": args.dry_run,
            "written": written,
            "result": result,
            "events": events,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !quiet || !result.success {
        print_result(args.skill, &result, &events, written, args.graph);
    }
    Ok(result.success)
}

pub(crate) fn drain(receiver: &mut broadcast::Receiver<GraphEvent>) -> Vec<GraphEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event receiver lagged");
            }
            Err(_) => break,
        }
    }
    events
}

pub(crate) fn print_result(skill: &str, result: &SkillResult, events: &[GraphEvent], written: bool, path: &Path) {
    println!();
    if result.success {
        println!("  {} {}", style("✓").green(), style(skill).cyan());
    } else {
        println!(
            "  {} {}: {}",
            style("✗").red(),
            style(skill).cyan(),
            result.error.as_deref().unwrap_or("failed")
        );
    }
    for warning in &result.warnings {
        println!("  {} {warning}", style("!").yellow());
    }
    for event in events {
        println!("  {} event {}", style("→").dim(), event.kind());
    }
    if let Some(data) = &result.data
        && let Ok(pretty) = serde_json::to_string_pretty(data)
    {
        println!();
        for line in pretty.lines() {
            println!("    {line}");
        }
    }
    if written {
        println!();
        println!("  {} wrote {}", style("✓").green(), style(path.display()).dim());
    }
    println!();
}
