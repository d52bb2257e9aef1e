//! WebSocket signaling relay for `peermesh-session` clients.
//!
//! Every socket gets a fresh peer id, then the relay forwards
//! [`SignalMessage`](peermesh_core::SignalMessage) envelopes by their `to` field.

mod hub;
mod ws_handler;

pub use hub::*;
pub use ws_handler::*;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

pub fn router(hub: RelayHub) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(hub)
}
