// crates/server/src/state.rs
//! Shared application state: the dispatcher consistency region and the live
//! client registry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use taskfleet_core::{JobNumber, JobPayload, ProgressStore, Task};
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::SetupError;
use crate::persist;

/// One connected worker, as observed by the status endpoint.
///
/// Counters are atomics so the owning session can update them while
/// `/api/status` reads without contention; the current-task snapshot sits
/// behind a `std::sync::Mutex` because it is never held across an await.
#[derive(Debug)]
pub struct ClientInfo {
    pub name: String,
    pub connected: AtomicBool,
    pub completed: AtomicU64,
    current: std::sync::Mutex<Option<(JobNumber, JobPayload)>>,
}

impl ClientInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: AtomicBool::new(true),
            completed: AtomicU64::new(0),
            current: std::sync::Mutex::new(None),
        }
    }

    pub fn set_current(&self, task: &Task) {
        *self.current.lock().expect("client state lock") = Some((task.num, task.data.clone()));
    }

    pub fn clear_current(&self) {
        *self.current.lock().expect("client state lock") = None;
    }

    pub fn current(&self) -> Option<(JobNumber, JobPayload)> {
        self.current.lock().expect("client state lock").clone()
    }
}

/// Shared server state accessible from all route handlers and sessions.
#[derive(Debug)]
pub struct ServerState {
    pub config: ServerConfig,
    /// Progress, cursor, and repeat queue: one consistency region, one lock.
    pub dispatcher: Mutex<Dispatcher>,
    /// Live sessions, keyed by a per-connection id.
    pub clients: DashMap<u64, Arc<ClientInfo>>,
    next_client_id: AtomicU64,
}

pub type SharedState = Arc<ServerState>;

impl ServerState {
    /// Load persisted progress (strictly) and build the shared state.
    ///
    /// A save file whose floor sits below `start_at - 1` would let the
    /// cursor dispatch numbers the embedder no longer wants; that is a
    /// setup error, not something to paper over.
    pub fn new(config: ServerConfig) -> Result<SharedState, SetupError> {
        let progress = match &config.save_path {
            Some(path) if path.exists() => {
                let store = persist::load(path)?;
                if store.floor() < config.start_at as i64 - 1 {
                    return Err(SetupError::StaleProgress {
                        path: path.clone(),
                        floor: store.floor(),
                        start_at: config.start_at,
                    });
                }
                store
            }
            _ => ProgressStore::new(config.start_at as i64 - 1),
        };
        Ok(Arc::new(Self {
            dispatcher: Mutex::new(Dispatcher::new(progress)),
            clients: DashMap::new(),
            next_client_id: AtomicU64::new(0),
            config,
        }))
    }

    pub fn register_client(&self, client: Arc<ClientInfo>) -> u64 {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        self.clients.insert(id, client);
        id
    }

    pub fn unregister_client(&self, id: u64) {
        self.clients.remove(&id);
    }
}
