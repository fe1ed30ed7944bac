//! Application state wiring the engine together.
//!
//! AppState pins the core registry to the concrete infra pieces: the config
//! file, the optional definition catalogue, and the subprocess script runner.

use std::path::PathBuf;

use anyhow::Result;
use nodeloom_core::registry::SkillRegistry;
use nodeloom_core::script::BoxScriptRunner;
use nodeloom_infra::catalog::load_catalog;
use nodeloom_infra::config::{default_config_dir, load_engine_config};
use nodeloom_infra::script::SubprocessRunner;

/// Catalogue file looked up next to `nodeloom.toml`.
pub const CATALOG_FILE_NAME: &str = "definitions.yaml";

pub struct AppState {
    pub config_dir: PathBuf,
    pub registry: SkillRegistry,
}

impl AppState {
    /// Load config and catalogue from `config_dir` (or the default directory)
    /// and build a registry with every built-in skill.
    pub async fn init(config_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.unwrap_or_else(default_config_dir);
        let config = load_engine_config(&config_dir).await;

        let runner = SubprocessRunner::new(config.script.clone());
        let mut registry =
            SkillRegistry::with_builtin_skills(config).with_runner(BoxScriptRunner::new(runner));

        let catalog_path = config_dir.join(CATALOG_FILE_NAME);
        if tokio::fs::try_exists(&catalog_path).await.unwrap_or(false) {
            registry = registry.with_definitions(load_catalog(&catalog_path).await?);
        }

        tracing::debug!(config_dir = %config_dir.display(), ?registry, "engine ready");
        Ok(Self {
            config_dir,
            registry,
        })
    }
}
