//! Nodeloom CLI entry point.
//!
//! Binary name: `nloom`
//!
//! Parses CLI arguments, sets up tracing, loads the engine config, then
//! dispatches to the command handler. Exits with status 1 when a skill,
//! intent, or validation run does not succeed.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use nodeloom_core::dispatch::IntentDispatcher;
use nodeloom_observe::tracing_setup::{init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,nodeloom_core=debug,nodeloom_infra=debug",
        _ => "trace",
    };
    if let Err(e) = init_tracing(filter, cli.otel) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    let outcome = execute(cli).await;
    shutdown_tracing();

    if !outcome? {
        std::process::exit(1);
    }
    Ok(())
}

async fn execute(cli: Cli) -> anyhow::Result<bool> {
    // Shell completions don't need engine state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "nloom", &mut std::io::stdout());
        return Ok(true);
    }

    let state = AppState::init(cli.config_dir.clone()).await?;

    match cli.command {
        Commands::Skills { command } => {
            cli::skills::handle(&state, command, cli.json)?;
            Ok(true)
        }

        Commands::Run {
            skill,
            graph,
            params,
            dry_run,
            write,
        } => {
            let args = cli::run::RunArgs {
                skill: &skill,
                graph: &graph,
                params: params.as_deref(),
                dry_run,
                write,
            };
            cli::run::run_skill(&state, args, cli.json, cli.quiet).await
        }

        Commands::Validate { graph, commands } => {
            cli::validate::validate_graph(&state, &graph, commands.as_deref(), cli.json, cli.quiet).await
        }

        Commands::Intent {
            kind,
            graph,
            params,
            write,
        } => {
            let dispatcher = IntentDispatcher::new(state.registry);
            cli::intent::dispatch_intent(
                &dispatcher,
                &kind,
                &graph,
                params.as_deref(),
                write,
                cli.json,
                cli.quiet,
            )
            .await
        }

        // handled above
        Commands::Completions { .. } => Ok(true),
    }
}
