// crates/server/src/routes/assets.rs
//! Landing page and version delivery. The bundle itself is served straight
//! off disk by `tower-http` (see the router in `lib.rs`).

use axum::extract::State;
use axum::response::Html;

use crate::state::SharedState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET / - the fleet dashboard, compiled into the binary.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /version - current asset bundle tag, plain text.
pub async fn version(State(state): State<SharedState>) -> String {
    state.config.version.clone()
}
