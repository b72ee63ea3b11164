//! CloudPRNT Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use shared::error::AppResult;
use shared::models::PollResponse;

use super::JOB_TOKEN_HEADER;
use crate::core::ServerState;

/// POST /printers/{printer_id}/job - 状态上报
///
/// 先记录上一个任务的结果，再查看队列。格式错误的请求体返回 "无任务"。
pub async fn status_report(
    State(state): State<ServerState>,
    Path(printer_id): Path<String>,
    body: Bytes,
) -> AppResult<Json<PollResponse>> {
    let response = state.dispatcher.status_report(&printer_id, &body).await?;
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
pub struct FetchQuery {
    /// Media type the printer asks for
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

/// GET /printers/{printer_id}/job?type= - 领取任务
///
/// 有任务时返回 200 和原始字节，否则 204。
pub async fn fetch(
    State(state): State<ServerState>,
    Path(printer_id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> AppResult<Response> {
    let job = state
        .dispatcher
        .fetch(&printer_id, query.media_type.as_deref())
        .await?;

    let Some(job) = job else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let mut response = (StatusCode::OK, job.payload).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(job.content_type.as_mime()),
    );
    match HeaderValue::from_str(&job.id) {
        Ok(token) => {
            headers.insert(JOB_TOKEN_HEADER, token);
        }
        Err(e) => tracing::error!(job_id = %job.id, error = %e, "Job id is not a valid header value"),
    }
    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultQuery {
    pub code: Option<String>,
    pub token: Option<String>,
}

/// DELETE /printers/{printer_id}/job?code=&token= - 打印结果
///
/// 以 2 开头的状态码表示打印成功，其它记为失败。始终返回 200。
pub async fn report_result(
    State(state): State<ServerState>,
    Path(printer_id): Path<String>,
    Query(query): Query<ResultQuery>,
) -> AppResult<StatusCode> {
    let (Some(code), Some(token)) = (query.code.as_deref(), query.token.as_deref()) else {
        tracing::warn!(printer_id = %printer_id, "Print result without code or token");
        return Ok(StatusCode::OK);
    };

    state
        .dispatcher
        .report_result(&printer_id, code.trim(), token.trim())
        .await?;
    Ok(StatusCode::OK)
}
