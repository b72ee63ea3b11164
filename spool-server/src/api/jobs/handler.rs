//! Print Jobs API Handlers
//!
//! - Submit a job (idempotent on `idempotencyKey`)
//! - Inspect a job and its log
//! - Reprint / cancel
//! - Failure and statistics queries

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use shared::error::{ApiResponse, AppError, AppResult};
use shared::models::{JobLogEntry, JobStats, PrintJob};

use crate::api::ListQuery;
use crate::audit_log;
use crate::core::ServerState;
use crate::jobs::{EnqueueReceipt, EnqueueRequest, TransitionOutcome};

/// A job with its log, oldest entry first
#[derive(Debug, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: PrintJob,
    pub logs: Vec<JobLogEntry>,
}

/// POST /jobs - 提交打印任务
///
/// 新建返回 201，重复提交同一 idempotencyKey 返回 200 和原任务。
/// Body is the bare `{jobId, status, created}`.
pub async fn submit(
    State(state): State<ServerState>,
    Json(request): Json<EnqueueRequest>,
) -> AppResult<(StatusCode, Json<EnqueueReceipt>)> {
    let receipt = state.enqueue.enqueue(request).await?;
    Ok((created_status(&receipt), Json(receipt)))
}

/// POST /api/jobs - 同 POST /jobs，结果包在 ApiResponse 中
pub async fn enqueue(
    State(state): State<ServerState>,
    Json(request): Json<EnqueueRequest>,
) -> AppResult<(StatusCode, ApiResponse<EnqueueReceipt>)> {
    let receipt = state.enqueue.enqueue(request).await?;
    Ok((created_status(&receipt), ApiResponse::success(receipt)))
}

fn created_status(receipt: &EnqueueReceipt) -> StatusCode {
    if receipt.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// GET /jobs - 任务列表
///
/// Query params: printer_id, status, offset, limit (newest first)
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<PrintJob>>> {
    let query = query.into_job_query()?;
    let jobs = state.store.list(&query).await?;
    Ok(ApiResponse::success(jobs))
}

/// GET /jobs/{id} - 任务详情和日志
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<JobDetail>> {
    let job = state
        .store
        .get(&id)
        .await?
        .ok_or_else(|| AppError::job_not_found(&id))?;
    let logs = state.store.logs(&id).await?;
    Ok(ApiResponse::success(JobDetail { job, logs }))
}

/// POST /jobs/{id}/reprint - 重新打印
///
/// 以原任务的字节创建新任务，原任务状态不变。
pub async fn reprint(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, ApiResponse<PrintJob>)> {
    let copy = state.enqueue.reprint(&id).await?;
    Ok((StatusCode::CREATED, ApiResponse::success(copy)))
}

/// POST /jobs/{id}/cancel - 取消任务
///
/// QUEUED and DELIVERED jobs can be cancelled; anything else comes back
/// with `applied: false` and the job unchanged.
pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<TransitionOutcome>> {
    let outcome = state.store.cancel(&id, state.now_millis()).await?;
    if outcome.applied {
        let resource = format!("job:{}", id);
        audit_log!("operator", "cancel", resource.as_str());
    }
    Ok(ApiResponse::success(outcome))
}

/// GET /jobs/failed - 重试耗尽的失败任务
pub async fn failed(State(state): State<ServerState>) -> AppResult<ApiResponse<Vec<PrintJob>>> {
    let jobs = state.store.terminal_failures().await?;
    Ok(ApiResponse::success(jobs))
}

/// GET /jobs/stats - 各状态任务数量
pub async fn stats(State(state): State<ServerState>) -> AppResult<ApiResponse<JobStats>> {
    let stats = state.store.stats().await?;
    Ok(ApiResponse::success(stats))
}
