//! Subprocess-backed [`ScriptRunner`].
//!
//! Each run writes the script to a private temp directory and spawns
//! `interpreter [args..] <script-path>` with:
//!
//! - stdin: one JSON line `{"input": .., "graph": ..}`
//! - stdout: a JSON [`ScriptResponse`] (`output`, `commands`, `logs`);
//!   empty stdout means "no output, no commands"
//! - stderr: appended to the response logs, or reported on failure
//!
//! The process is killed when the configured timeout elapses.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use nodeloom_core::script::{ScriptError, ScriptRequest, ScriptResponse, ScriptRunner};
use nodeloom_types::config::ScriptConfig;
use serde_json::json;
use tokio::io::AsyncWriteExt;

const SCRIPT_FILE_NAME: &str = "script";

#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    config: ScriptConfig,
    name: String,
}

impl SubprocessRunner {
    pub fn new(config: ScriptConfig) -> Self {
        let name = format!("subprocess:{}", config.interpreter);
        Self { config, name }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }
}

/// Locate `program` the way a shell would: paths with a separator are taken
/// as-is, bare names are searched in `PATH`.
fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}

fn parse_response(stdout: &[u8], stderr: &[u8]) -> Result<ScriptResponse, ScriptError> {
    let text = String::from_utf8_lossy(stdout);
    let mut response = if text.trim().is_empty() {
        ScriptResponse::default()
    } else {
        serde_json::from_str::<ScriptResponse>(text.trim())
            .map_err(|e| ScriptError::InvalidOutput(e.to_string()))?
    };
    response.logs.extend(
        String::from_utf8_lossy(stderr)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string),
    );
    Ok(response)
}

impl ScriptRunner for SubprocessRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        resolve_program(&self.config.interpreter).is_some()
    }

    async fn run(&self, request: ScriptRequest) -> Result<ScriptResponse, ScriptError> {
        let io = |e: std::io::Error| ScriptError::Io(e.to_string());

        let workdir = tempfile::tempdir().map_err(io)?;
        let script_path = workdir.path().join(SCRIPT_FILE_NAME);
        tokio::fs::write(&script_path, request.script.as_bytes())
            .await
            .map_err(io)?;

        let mut stdin_payload = serde_json::to_vec(&json!({
            "input": request.input,
            "graph": request.graph,
        }))
        .map_err(|e| ScriptError::Io(e.to_string()))?;
        stdin_payload.push(b'\n');

        let started = Instant::now();
        let mut child = tokio::process::Command::new(&self.config.interpreter)
            .args(&self.config.args)
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(workdir.path())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ScriptError::Unavailable(format!(
                    "interpreter '{}' not found",
                    self.config.interpreter
                )),
                _ => ScriptError::Io(e.to_string()),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A script that never reads stdin closes the pipe early.
            stdin.write_all(&stdin_payload).await.ok();
        }

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                runner = %self.name,
                timeout_secs = self.config.timeout_secs,
                "script timed out"
            );
            ScriptError::Timeout(self.config.timeout_secs)
        })?
        .map_err(io)?;

        tracing::debug!(
            runner = %self.name,
            status = ?output.status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "script finished"
        );

        if !output.status.success() {
            return Err(ScriptError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_response(&output.stdout, &output.stderr)
    }
}
