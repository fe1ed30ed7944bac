//! External sandboxed script runner port.
//!
//! The engine never interprets user scripts itself. `scriptExecution` hands
//! the script, its input, and a graph snapshot to a registered runner and
//! applies the mutation commands the runner returns.
//!
//! Follows the same blanket-impl pattern as the other dyn-dispatched ports:
//! 1. `ScriptRunner` uses RPITIT for its async method
//! 2. `ScriptRunnerDyn` is the object-safe version with boxed futures
//! 3. `BoxScriptRunner` wraps `Box<dyn ScriptRunnerDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use nodeloom_types::graph::GraphSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// What the runner receives on stdin (or equivalent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRequest {
    pub script: String,
    pub input: Value,
    pub graph: GraphSnapshot,
}

/// What the runner must produce.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScriptResponse {
    #[serde(default)]
    pub output: Value,
    /// Raw mutation commands, applied in order when the caller asks for it.
    #[serde(default)]
    pub commands: Vec<Value>,
    #[serde(default)]
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("script runner unavailable: {0}")]
    Unavailable(String),

    #[error("script timed out after {0}s")]
    Timeout(u64),

    #[error("script exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("script produced invalid output: {0}")]
    InvalidOutput(String),

    #[error("script runner io error: {0}")]
    Io(String),
}

// ---------------------------------------------------------------------------
// ScriptRunner trait (RPITIT)
// ---------------------------------------------------------------------------

pub trait ScriptRunner: Send + Sync {
    /// Human-readable runner name, reported by dry runs.
    fn name(&self) -> &str;

    /// Whether the runner can currently accept scripts.
    fn is_available(&self) -> bool;

    fn run(
        &self,
        request: ScriptRequest,
    ) -> impl Future<Output = Result<ScriptResponse, ScriptError>> + Send;
}

/// Object-safe version of [`ScriptRunner`] with boxed futures.
pub trait ScriptRunnerDyn: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn run_boxed(
        &self,
        request: ScriptRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ScriptResponse, ScriptError>> + Send + '_>>;
}

impl<T: ScriptRunner> ScriptRunnerDyn for T {
    fn name(&self) -> &str {
        ScriptRunner::name(self)
    }

    fn is_available(&self) -> bool {
        ScriptRunner::is_available(self)
    }

    fn run_boxed(
        &self,
        request: ScriptRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ScriptResponse, ScriptError>> + Send + '_>> {
        Box::pin(self.run(request))
    }
}

/// Type-erased script runner, chosen at startup.
pub struct BoxScriptRunner {
    inner: Box<dyn ScriptRunnerDyn>,
}

impl BoxScriptRunner {
    pub fn new<T: ScriptRunner + 'static>(runner: T) -> Self {
        Self {
            inner: Box::new(runner),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    pub async fn run(&self, request: ScriptRequest) -> Result<ScriptResponse, ScriptError> {
        self.inner.run_boxed(request).await
    }
}

impl std::fmt::Debug for BoxScriptRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxScriptRunner")
            .field("name", &self.inner.name())
            .finish()
    }
}
