// crates/worker/src/config.rs
//! Worker configuration.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

/// Async in-process task handler, used when the asset bundle ships no
/// `task.sh`. Receives the parsed task payload.
pub type TaskFn = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Worker configuration. `host` is a bare `host[:port]`; `use_http` picks
/// plain http/ws over TLS.
pub struct WorkerConfig {
    pub host: String,
    /// Name reported in the identify frame.
    pub name: String,
    pub use_http: bool,
    /// File recording the installed asset version tag.
    pub version_file: PathBuf,
    /// Directory the asset bundle is extracted into.
    pub task_assets_dir: PathBuf,
    /// Extra fields merged into the identify frame (the name wins on
    /// collision).
    pub identify_payload: Map<String, Value>,
    /// Re-download assets on every cycle, even when the tag matches.
    pub always_update: bool,
    pub(crate) task_fn: Option<TaskFn>,
}

impl WorkerConfig {
    pub fn new(host: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            use_http: false,
            version_file: PathBuf::from("version.txt"),
            task_assets_dir: PathBuf::from("task_assets"),
            identify_payload: Map::new(),
            always_update: true,
            task_fn: None,
        }
    }

    pub fn with_use_http(mut self, use_http: bool) -> Self {
        self.use_http = use_http;
        self
    }

    pub fn with_version_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.version_file = path.into();
        self
    }

    pub fn with_task_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.task_assets_dir = dir.into();
        self
    }

    pub fn with_identify_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.identify_payload.insert(key.into(), value);
        self
    }

    pub fn with_always_update(mut self, always_update: bool) -> Self {
        self.always_update = always_update;
        self
    }

    pub fn with_task_fn<F, Fut>(mut self, task_fn: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.task_fn = Some(Arc::new(move |payload| Box::pin(task_fn(payload))));
        self
    }

    /// Base URL for version checks and bundle downloads.
    pub fn http_base(&self) -> String {
        let scheme = if self.use_http { "http" } else { "https" };
        format!("{scheme}://{}", self.host)
    }

    /// Control stream endpoint.
    pub fn ws_url(&self) -> String {
        let scheme = if self.use_http { "ws" } else { "wss" };
        format!("{scheme}://{}/ws", self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tls_urls_by_default() {
        let config = WorkerConfig::new("dispatch.example.com", "w1");
        assert_eq!(config.http_base(), "https://dispatch.example.com");
        assert_eq!(config.ws_url(), "wss://dispatch.example.com/ws");
    }

    #[test]
    fn test_plain_http_urls() {
        let config = WorkerConfig::new("localhost:8080", "w1").with_use_http(true);
        assert_eq!(config.http_base(), "http://localhost:8080");
        assert_eq!(config.ws_url(), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_identify_fields_accumulate() {
        let config = WorkerConfig::new("h", "w")
            .with_identify_field("pwd", json!("s3cret"))
            .with_identify_field("gpu", json!(true));
        assert_eq!(config.identify_payload.len(), 2);
        assert_eq!(config.identify_payload["pwd"], json!("s3cret"));
    }

    #[tokio::test]
    async fn test_task_fn_is_stored() {
        let config =
            WorkerConfig::new("h", "w").with_task_fn(|payload| async move { Ok(json!([payload])) });
        let task_fn = config.task_fn.unwrap();
        assert_eq!(task_fn(json!(3)).await.unwrap(), json!([3]));
    }
}
