//! Engine configuration loader.
//!
//! Reads `nodeloom.toml` from the config directory (`~/.config/nodeloom/` by
//! default) into [`EngineConfig`]. [`load_engine_config`] falls back to
//! defaults when the file is missing or malformed; [`read_engine_config`] is
//! the strict variant that reports why.

use std::path::{Path, PathBuf};

use nodeloom_types::config::EngineConfig;

/// File name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "nodeloom.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config file at {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// `~/.config/nodeloom`, or `./.nodeloom` when the platform has no config dir.
pub fn default_config_dir() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join("nodeloom"),
        None => PathBuf::from(".nodeloom"),
    }
}

/// Read and parse `{config_dir}/nodeloom.toml`.
pub async fn read_engine_config(config_dir: &Path) -> Result<EngineConfig, ConfigError> {
    let path = config_dir.join(CONFIG_FILE_NAME);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path));
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
}

/// Load `{config_dir}/nodeloom.toml`, never failing.
///
/// - Missing file: debug log, defaults.
/// - Unreadable or malformed file: warning, defaults.
pub async fn load_engine_config(config_dir: &Path) -> EngineConfig {
    match read_engine_config(config_dir).await {
        Ok(config) => {
            tracing::debug!(dir = %config_dir.display(), "loaded engine config");
            config
        }
        Err(ConfigError::NotFound(path)) => {
            tracing::debug!("No {} found, using defaults", path.display());
            EngineConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config, EngineConfig::default());
        assert!(matches!(
            read_engine_config(tmp.path()).await,
            Err(ConfigError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn partial_toml_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
group_padding = 12.0
mass_delete_threshold = 3

[script]
interpreter = "deno"
args = ["run", "--quiet"]
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.group_padding, 12.0);
        assert_eq!(config.mass_delete_threshold, 3);
        assert_eq!(config.collision_padding, 16.0);
        assert_eq!(config.script.interpreter, "deno");
        assert_eq!(config.script.args, vec!["run", "--quiet"]);
        assert_eq!(config.script.timeout_secs, 30);
    }

    #[tokio::test]
    async fn invalid_toml_falls_back_but_strict_read_reports_it() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not { valid toml !!!")
            .await
            .unwrap();

        assert_eq!(load_engine_config(tmp.path()).await, EngineConfig::default());
        let err = read_engine_config(tmp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("nodeloom.toml"));
    }

    #[test]
    fn default_dir_ends_with_nodeloom() {
        assert!(default_config_dir().ends_with("nodeloom") || default_config_dir().ends_with(".nodeloom"));
    }
}
