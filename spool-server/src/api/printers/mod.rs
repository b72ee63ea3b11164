//! Printers API 模块
//!
//! Mounted at `/printers` and again under `/api/printers`.

mod handler;

use axum::{
    Router,
    routing::{get, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/printers", routes())
        .nest("/api/printers", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{printer_id}", put(handler::upsert))
        .route("/{printer_id}/active", put(handler::set_active))
        .route("/{printer_id}/jobs", get(handler::jobs))
}
