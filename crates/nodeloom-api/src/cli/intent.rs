//! `nloom intent`: dispatch a named intent through every stage it maps to.
//!
//! Ctrl+C cancels the intent token; the dispatcher stops at the next stage
//! boundary and reports the stages that completed.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use serde_json::{Value, json};

use nodeloom_core::dispatch::{Intent, IntentDispatcher};
use nodeloom_core::graph_api::GraphApi;
use nodeloom_infra::snapshot::{load_store, write_snapshot};

use crate::cli::params::read_params;
use crate::cli::run::drain;

/// Returns whether every stage ran and succeeded.
pub async fn dispatch_intent(
    dispatcher: &IntentDispatcher,
    kind: &str,
    graph: &Path,
    params: Option<&str>,
    write: bool,
    json: bool,
    quiet: bool,
) -> Result<bool> {
    let mut store = load_store(graph).await?;
    let params = Value::Object(read_params(params).await?);

    let mut events = dispatcher.registry().events().subscribe();
    let token = dispatcher.begin();
    let watcher = token.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling intent");
            watcher.cancel();
        }
    });

    let outcome = dispatcher
        .dispatch_with(&mut store, Intent::from_kind(kind, params), &token)
        .await;
    interrupt.abort();
    let outcome = outcome?;
    let events = drain(&mut events);

    let written = outcome.success && write;
    if written {
        write_snapshot(graph, &store.snapshot())
            .await
            .with_context(|| format!("failed to write {}", graph.display()))?;
    }

    if json {
        let out = json!({ "outcome": outcome, "events": events, "written": written });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(outcome.success);
    }
    if quiet && outcome.success {
        return Ok(true);
    }

    println!();
    println!(
        "  {} intent {} ({} ms)",
        style("▶").bold(),
        style(&outcome.kind).cyan(),
        outcome.duration_ms
    );
    for (index, stage) in outcome.stages.iter().enumerate() {
        let mark = if stage.result.success { style("✓").green() } else { style("✗").red() };
        match &stage.result.error {
            Some(error) => println!("  {mark} {}. {}: {error}", index + 1, stage.skill_id),
            None => println!("  {mark} {}. {}", index + 1, stage.skill_id),
        }
        for warning in &stage.result.warnings {
            println!("      {} {warning}", style("!").yellow());
        }
    }
    if outcome.cancelled {
        println!("  {} cancelled after {} stage(s)", style("■").yellow(), outcome.stages.len());
    }
    if written {
        println!("  {} wrote {}", style("✓").green(), style(graph.display()).dim());
    }
    println!();
    Ok(outcome.success)
}
