// crates/server/src/hooks.rs
//! Ready-made embedder hooks for the common cases.

use std::future::{ready, Ready};
use std::path::PathBuf;

use anyhow::ensure;
use futures_util::future::BoxFuture;
use serde_json::Value;
use taskfleet_core::Task;
use tokio::io::AsyncWriteExt;

/// Verifier comparing the identify frame's `pwd` field against a shared
/// secret. Pass to [`crate::ServerConfig::with_verify_client`].
pub fn password_verifier(
    secret: impl Into<String>,
) -> impl Fn(Value) -> Ready<bool> + Send + Sync + 'static {
    let secret = secret.into();
    move |identify: Value| {
        ready(identify.get("pwd").and_then(Value::as_str) == Some(secret.as_str()))
    }
}

/// Completion hook appending each result to a file, one line per task:
/// the job number and/or the result JSON, tab-separated. At least one of
/// the two must be requested.
pub fn file_appender(
    path: impl Into<PathBuf>,
    write_task: bool,
    write_result: bool,
) -> anyhow::Result<
    impl Fn(Task, Value) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync + 'static,
> {
    ensure!(
        write_task || write_result,
        "file_appender must record at least one of task and result"
    );
    let path = path.into();
    Ok(move |task: Task, result: Value| {
        let path = path.clone();
        let future: BoxFuture<'static, anyhow::Result<bool>> = Box::pin(async move {
            let mut parts = Vec::new();
            if write_task {
                parts.push(task.num.to_string());
            }
            if write_result {
                parts.push(result.to_string());
            }
            let line = parts.join("\t") + "\n";
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            Ok(false)
        });
        future
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_password_verifier() {
        let verify = password_verifier("hunter2");
        assert!(verify(json!({"name": "w", "pwd": "hunter2"})).await);
        assert!(!verify(json!({"name": "w", "pwd": "wrong"})).await);
        assert!(!verify(json!({"name": "w"})).await);
    }

    #[tokio::test]
    async fn test_file_appender_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.log");
        let hook = file_appender(&path, true, true).unwrap();

        let repeat = hook(Task::new(3, json!(3)), json!({"ok": true}))
            .await
            .unwrap();
        assert!(!repeat);
        hook(Task::new(4, json!(4)), json!("done")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "3\t{\"ok\":true}\n4\t\"done\"\n");
    }

    #[tokio::test]
    async fn test_file_appender_result_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.log");
        let hook = file_appender(&path, false, true).unwrap();

        hook(Task::new(3, json!(3)), json!(7)).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "7\n");
    }

    #[test]
    fn test_file_appender_rejects_recording_nothing() {
        assert!(file_appender("results.log", false, false).is_err());
    }
}
