// crates/worker/src/runner.rs
//! Task execution: the shell-script entry point from the asset bundle, or a
//! configured in-process task function.

use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::WorkerConfig;

/// Script the asset bundle may ship as the task entry point.
pub const SCRIPT_NAME: &str = "task.sh";

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no task entry point: {0} absent and no task function configured")]
    MissingEntryPoint(String),

    #[error("task script failed to run: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("task script produced non-UTF-8 output")]
    BadOutput(#[from] std::string::FromUtf8Error),

    #[error("task payload is not JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("task function failed: {0}")]
    Task(#[source] anyhow::Error),
}

/// Execute one task. `payload` is the raw JSON text from the wire: the
/// script gets it verbatim as its single argument, a task function gets it
/// parsed.
pub async fn run_task(config: &WorkerConfig, payload: &str) -> Result<Value, RunnerError> {
    let script = config.task_assets_dir.join(SCRIPT_NAME);
    if tokio::fs::try_exists(&script).await.unwrap_or(false) {
        debug!(script = %script.display(), "running task script");
        let output = Command::new("sh")
            .arg(&script)
            .arg(payload)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            warn!(status = %output.status, "task script exited non-zero");
        }
        let stdout = String::from_utf8(output.stdout)?;
        return Ok(Value::String(stdout));
    }

    if let Some(task_fn) = &config.task_fn {
        debug!("running configured task function");
        let parsed: Value = serde_json::from_str(payload)?;
        return task_fn(parsed).await.map_err(RunnerError::Task);
    }

    Err(RunnerError::MissingEntryPoint(script.display().to_string()))
}
