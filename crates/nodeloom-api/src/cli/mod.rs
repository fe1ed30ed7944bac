//! CLI command definitions for the `nloom` binary.
//!
//! Uses clap derive macros for argument parsing. Graph-touching commands take
//! a snapshot file with `--graph` and only write it back with `--write`.

pub mod intent;
pub mod params;
pub mod run;
pub mod skills;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use skills::SkillsCommand;

/// Run and validate graph skills against node-graph snapshot files.
#[derive(Parser)]
#[command(name = "nloom", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory holding nodeloom.toml and definitions.yaml.
    #[arg(long, global = true, env = "NODELOOM_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect registered skills.
    Skills {
        #[command(subcommand)]
        command: SkillsCommand,
    },

    /// Run one skill against a graph file.
    Run {
        /// Skill id, e.g. "layout.autoLayout".
        skill: String,

        /// Graph snapshot (JSON).
        #[arg(long, short)]
        graph: PathBuf,

        /// Skill parameters as inline JSON, or @path to a JSON file.
        #[arg(long, short)]
        params: Option<String>,

        /// Compute the outcome without mutating the graph.
        #[arg(long)]
        dry_run: bool,

        /// Write the mutated graph back to the snapshot file.
        #[arg(long, conflicts_with = "dry_run")]
        write: bool,
    },

    /// Run the validation suite against a graph file.
    Validate {
        /// Graph snapshot (JSON).
        #[arg(long, short)]
        graph: PathBuf,

        /// Also check a proposed command list (inline JSON or @path).
        #[arg(long)]
        commands: Option<String>,
    },

    /// Dispatch a named intent (layout, tidy, validate, export).
    Intent {
        /// Intent kind.
        kind: String,

        /// Graph snapshot (JSON).
        #[arg(long, short)]
        graph: PathBuf,

        /// Parameters passed to every stage (inline JSON or @path).
        #[arg(long, short)]
        params: Option<String>,

        /// Write the mutated graph back to the snapshot file.
        #[arg(long)]
        write: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn write_conflicts_with_dry_run() {
        let parsed = Cli::try_parse_from(["nloom", "run", "layout.autoLayout", "-g", "g.json", "--dry-run", "--write"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["nloom", "skills", "list", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }
}
