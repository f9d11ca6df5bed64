// crates/server/src/session.rs
//! Per-worker websocket session.
//!
//! Each connection runs the same machine: greet with `ready`, read the
//! identify frame, verify, then loop assign / send / await result / record.
//! A worker that vanishes mid-task has its task pushed back onto the repeat
//! queue on the way out, which is what makes execution at-least-once without
//! per-task timeouts.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use taskfleet_core::Task;
use tokio::time::{interval, timeout, Instant};
use tracing::{debug, error, warn};

use crate::persist;
use crate::state::{ClientInfo, SharedState};

/// Ping cadence on the control stream. A session that has heard nothing for
/// two intervals is considered dead.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long a fresh connection gets to send its identify frame.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum SessionError {
    #[error("worker disconnected")]
    Disconnected,

    #[error("no traffic for two heartbeat intervals")]
    HeartbeatMissed,

    #[error("malformed frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    Socket(#[from] axum::Error),

    #[error("completion hook failed: {0}")]
    Completion(#[source] anyhow::Error),

    #[error("could not persist progress: {0}")]
    Persist(#[source] std::io::Error),
}

/// `GET /ws` - upgrade into a worker session.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    debug!("new worker connection");
    let (mut sink, mut stream) = socket.split();

    if sink.send(Message::Text("ready".into())).await.is_err() {
        return;
    }

    let Some(identify) = read_identify(&mut stream).await else {
        return;
    };
    let Some(name) = identify.get("name").and_then(Value::as_str).map(str::to_owned) else {
        debug!("identify frame carried no name, closing");
        return;
    };

    if !(state.config.verify_client)(identify).await {
        warn!(worker = %name, "client verification failed");
        return;
    }

    let client = Arc::new(ClientInfo::new(&name));
    let id = state.register_client(client.clone());

    let result = drive(&mut sink, &mut stream, &state, &client).await;

    client.connected.store(false, Ordering::Relaxed);
    state.unregister_client(id);

    // Frame-shape mismatches and plain disconnects are the normal way a
    // session ends; only hook and persistence failures are noteworthy.
    match result {
        Err(err @ (SessionError::Completion(_) | SessionError::Persist(_))) => {
            error!(worker = %name, error = %err, "worker session failed");
        }
        Err(SessionError::HeartbeatMissed) => {
            warn!(worker = %name, "worker missed heartbeats, dropping");
        }
        Err(err) => debug!(worker = %name, error = %err, "worker session ended"),
        Ok(()) => debug!(worker = %name, "worker session closed"),
    }
}

async fn read_identify(stream: &mut SplitStream<WebSocket>) -> Option<Value> {
    let frame = match timeout(IDENTIFY_TIMEOUT, stream.next()).await {
        Ok(frame) => frame,
        Err(_) => {
            debug!("worker never identified, closing");
            return None;
        }
    };
    match frame {
        Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(error = %err, "malformed identify frame");
                None
            }
        },
        _ => {
            debug!("connection closed before identify");
            None
        }
    }
}

/// The assign/await loop. Runs until the stream dies or a hook fails.
async fn drive(
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
    state: &SharedState,
    client: &ClientInfo,
) -> Result<(), SessionError> {
    loop {
        let mut task = {
            let mut dispatcher = state.dispatcher.lock().await;
            dispatcher.next_task(&state.config.get_job)
        };

        // If the send fails the task is dropped here unrecorded; the
        // reconciler re-queues the gap on its next sweep.
        let payload = serde_json::to_string(&task.data)?;
        sink.send(Message::Text(payload.into())).await?;
        task.runs += 1;
        client.set_current(&task);
        debug!(num = task.num, runs = task.runs, worker = %client.name, "assigned task");

        let result = match await_result(sink, stream).await {
            Ok(result) => result,
            Err(err) => {
                // The worker had the task in hand; bring it back through
                // the front door.
                state.dispatcher.lock().await.push_repeat(task);
                return Err(err);
            }
        };

        client.clear_current();
        client.completed.fetch_add(1, Ordering::Relaxed);
        handle_completion(state, task, result).await?;
    }
}

/// Wait for the worker's result while keeping the heartbeat going.
async fn await_result(
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
) -> Result<Value, SessionError> {
    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // the first tick fires immediately
    let mut last_seen = Instant::now();
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Close(_))) | None => return Err(SessionError::Disconnected),
                // Pongs (and any other stray frame) count as liveness.
                Some(Ok(_)) => last_seen = Instant::now(),
                Some(Err(err)) => return Err(SessionError::Socket(err)),
            },
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > HEARTBEAT_INTERVAL * 2 {
                    return Err(SessionError::HeartbeatMissed);
                }
                sink.send(Message::Ping(Vec::new().into())).await?;
            }
        }
    }
}

/// Run the completion hook, then record or repeat.
///
/// The hook goes first: a truthy return or an error must leave the number
/// unrecorded, so a defective run is retried (by the repeat queue or the
/// reconciler respectively).
async fn handle_completion(
    state: &SharedState,
    task: Task,
    result: Value,
) -> Result<(), SessionError> {
    let num = task.num;
    let repeat = (state.config.on_complete)(task.clone(), result)
        .await
        .map_err(SessionError::Completion)?;
    if repeat {
        debug!(num, "completion hook requested a repeat");
        state.dispatcher.lock().await.push_repeat(task);
        return Ok(());
    }

    let mut dispatcher = state.dispatcher.lock().await;
    dispatcher.record(num);
    if let Some(path) = &state.config.save_path {
        // Lock held across the write: snapshots must reach the file in the
        // order they were taken.
        persist::save(path, dispatcher.progress())
            .await
            .map_err(SessionError::Persist)?;
    }
    Ok(())
}
