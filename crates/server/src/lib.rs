// crates/server/src/lib.rs
//! Task dispatch server: hand numbered jobs to remote workers over a
//! websocket control stream, track which are complete, and repair gaps.
//!
//! Embedders build a [`ServerConfig`] with a job source and optional hooks,
//! then call [`run`], or [`app`] to mount the router themselves:
//!
//! ```no_run
//! use serde_json::json;
//! use taskfleet_server::ServerConfig;
//!
//! # async fn start() -> anyhow::Result<()> {
//! let config = ServerConfig::new("assets.zip", |num| json!({ "input": num }))
//!     .with_version("1.0.0")
//!     .with_save_path("progress.txt");
//! taskfleet_server::run(config, "0.0.0.0:8080".parse()?).await
//! # }
//! ```

pub mod bundle;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod persist;
pub mod reconciler;
pub mod routes;
pub mod session;
pub mod state;

use std::net::SocketAddr;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::ServerConfig;
pub use error::SetupError;
pub use state::{ServerState, SharedState};

/// Build the router. Pure: call it as often as needed on the same state.
///
/// The background reconciler is not started here; [`run`] does that.
/// Embedders mounting the router themselves also call
/// [`reconciler::spawn`] once.
pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/", get(routes::assets::index))
        .route("/version", get(routes::assets::version))
        .route_service("/assets.zip", ServeFile::new(&state.config.asset_zip_path))
        .route("/api/status", get(routes::status::status))
        .route("/ws", get(session::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Validate the configuration, start the reconciler, bind, and serve until
/// the process exits.
pub async fn run(config: ServerConfig, addr: SocketAddr) -> anyhow::Result<()> {
    let state = ServerState::new(config)?;
    reconciler::spawn(state.clone());
    let app = app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("taskfleet server listening on {addr}");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
