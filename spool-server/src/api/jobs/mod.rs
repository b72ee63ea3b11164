//! Print Jobs API 模块
//!
//! Mounted at `/jobs` and again under `/api/jobs`. `POST /jobs` answers with
//! the bare receipt, `POST /api/jobs` wraps it in the `ApiResponse` envelope.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .nest(
            "/jobs",
            routes().route("/", get(handler::list).post(handler::submit)),
        )
        .nest(
            "/api/jobs",
            routes().route("/", get(handler::list).post(handler::enqueue)),
        )
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/failed", get(handler::failed))
        .route("/stats", get(handler::stats))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/reprint", post(handler::reprint))
        .route("/{id}/cancel", post(handler::cancel))
}
