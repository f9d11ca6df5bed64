// crates/server/src/config.rs
//! Embedder-facing server configuration.
//!
//! The three behavior hooks are plain function-valued fields, set at
//! construction: a pure job source, an async client verifier, and an async
//! completion hook. Synchronous embedders pass closures returning
//! [`std::future::ready`] values.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use taskfleet_core::{JobNumber, JobPayload, Task};

/// Produces the payload for a job number. Must be pure: the same number
/// always maps to the same job.
pub type JobSource = Arc<dyn Fn(JobNumber) -> JobPayload + Send + Sync>;

/// Async predicate over the identify frame. Returning false rejects the
/// connection before any task is assigned.
pub type ClientVerifier = Arc<dyn Fn(Value) -> BoxFuture<'static, bool> + Send + Sync>;

/// Async completion hook. `Ok(true)` sends the task back to the repeat
/// queue instead of recording it; an error tears the session down with
/// nothing recorded.
pub type CompletionHook =
    Arc<dyn Fn(Task, Value) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

/// Server configuration. Build with [`ServerConfig::new`], then chain the
/// `with_` setters for anything that deviates from the defaults.
pub struct ServerConfig {
    /// Zip bundle served to workers at `/assets.zip`.
    pub asset_zip_path: PathBuf,
    /// Tag served at `/version`; workers compare it against their installed
    /// tag to decide whether to re-download assets.
    pub version: String,
    /// Progress file. `None` disables persistence.
    pub save_path: Option<PathBuf>,
    /// First job number of the sequence.
    pub start_at: JobNumber,
    /// Whether `/api/status` answers queries.
    pub api_enabled: bool,
    pub(crate) get_job: JobSource,
    pub(crate) verify_client: ClientVerifier,
    pub(crate) on_complete: CompletionHook,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("asset_zip_path", &self.asset_zip_path)
            .field("version", &self.version)
            .field("save_path", &self.save_path)
            .field("start_at", &self.start_at)
            .field("api_enabled", &self.api_enabled)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn new<F>(asset_zip_path: impl Into<PathBuf>, get_job: F) -> Self
    where
        F: Fn(JobNumber) -> JobPayload + Send + Sync + 'static,
    {
        Self {
            asset_zip_path: asset_zip_path.into(),
            version: "0.0.1".to_string(),
            save_path: None,
            start_at: 0,
            api_enabled: true,
            get_job: Arc::new(get_job),
            verify_client: Arc::new(|_| Box::pin(std::future::ready(true))),
            on_complete: Arc::new(|_, _| Box::pin(std::future::ready(Ok(false)))),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    pub fn with_start_at(mut self, start_at: JobNumber) -> Self {
        self.start_at = start_at;
        self
    }

    pub fn with_api_enabled(mut self, enabled: bool) -> Self {
        self.api_enabled = enabled;
        self
    }

    pub fn with_verify_client<F, Fut>(mut self, verify: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.verify_client = Arc::new(move |identify| Box::pin(verify(identify)));
        self
    }

    pub fn with_on_complete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Task, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.on_complete = Arc::new(move |task, result| Box::pin(hook(task, result)));
        self
    }
}
