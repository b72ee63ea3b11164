use axum::extract::State;
use serde::Serialize;
use shared::error::ApiResponse;
use shared::models::JobStats;

use crate::core::ServerState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded" when the store cannot be read
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub printers: usize,
    pub jobs: Option<JobStats>,
    pub error: Option<String>,
}

/// GET /health - 存活检查和任务统计
///
/// 存储异常时仍返回 200，`status` 为 "degraded"。
pub async fn health(State(state): State<ServerState>) -> ApiResponse<HealthResponse> {
    let (status, jobs, error) = match state.store.stats().await {
        Ok(stats) => ("ok", Some(stats), None),
        Err(e) => {
            tracing::error!(error = %e, "Health check could not read job stats");
            ("degraded", None, Some(e.to_string()))
        }
    };

    ApiResponse::success(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        store: state.config.store_backend.as_str(),
        printers: state.registry.list().len(),
        jobs,
        error,
    })
}
