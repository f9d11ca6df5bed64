// crates/server/src/routes/status.rs
//! Read-only view of dispatch progress and the connected fleet.

use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use taskfleet_core::{JobNumber, JobPayload};

use crate::state::SharedState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct StatusResponse {
    /// The completed prefix: everything at or below this number is done.
    pub progress: i64,
    pub clients: Vec<ClientStatus>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ClientStatus {
    pub name: String,
    pub connected: bool,
    pub completed: u64,
    pub current: Option<CurrentTask>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct CurrentTask {
    pub num: JobNumber,
    pub data: JobPayload,
}

/// GET /api/status - dispatch floor plus a snapshot of every live session.
pub async fn status(State(state): State<SharedState>) -> Response {
    if !state.config.api_enabled {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "API disabled"})),
        )
            .into_response();
    }

    let progress = state.dispatcher.lock().await.progress().floor();
    let clients = state
        .clients
        .iter()
        .map(|entry| {
            let info = entry.value();
            ClientStatus {
                name: info.name.clone(),
                connected: info.connected.load(Ordering::Relaxed),
                completed: info.completed.load(Ordering::Relaxed),
                current: info
                    .current()
                    .map(|(num, data)| CurrentTask { num, data }),
            }
        })
        .collect();

    Json(StatusResponse { progress, clients }).into_response()
}
