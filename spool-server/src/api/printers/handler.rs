//! Printers API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::{ApiResponse, AppError, AppResult};
use shared::models::{ContentType, PrintJob, PrinterEndpoint, PrinterView};

use crate::api::ListQuery;
use crate::audit_log;
use crate::core::ServerState;

/// GET /printers - 打印机列表 (含在线状态)
pub async fn list(State(state): State<ServerState>) -> AppResult<ApiResponse<Vec<PrinterView>>> {
    let views = state
        .presence
        .views(state.registry.as_ref(), state.now_millis());
    Ok(ApiResponse::success(views))
}

/// Body of a printer upsert; omitted fields keep their current value
#[derive(Debug, Default, Deserialize)]
pub struct UpsertPrinterRequest {
    pub display_name: Option<String>,
    pub poll_interval_hint_secs: Option<u64>,
    pub active: Option<bool>,
    pub media_types: Option<Vec<ContentType>>,
}

/// PUT /printers/{printer_id} - 新增或更新打印机
///
/// The change is written back to `printers.json` and survives a restart.
pub async fn upsert(
    State(state): State<ServerState>,
    Path(printer_id): Path<String>,
    Json(request): Json<UpsertPrinterRequest>,
) -> AppResult<ApiResponse<PrinterEndpoint>> {
    let printer_id = printer_id.trim().to_string();
    if printer_id.is_empty() {
        return Err(AppError::validation("printer id must not be empty").with_detail("field", "id"));
    }

    let mut endpoint = state
        .registry
        .get(&printer_id)
        .unwrap_or_else(|| PrinterEndpoint::new(printer_id.as_str(), printer_id.as_str()));
    if let Some(name) = request.display_name.filter(|n| !n.trim().is_empty()) {
        endpoint.display_name = name;
    }
    if let Some(secs) = request.poll_interval_hint_secs {
        if secs == 0 {
            return Err(AppError::validation("poll interval must be at least 1 second")
                .with_detail("field", "poll_interval_hint_secs"));
        }
        endpoint.poll_interval_hint_secs = secs;
    }
    if let Some(active) = request.active {
        endpoint.active = active;
    }
    if let Some(media_types) = request.media_types {
        endpoint.media_types = media_types;
    }

    state.registry.upsert(endpoint.clone());
    state.registry.save()?;
    let resource = format!("printer:{}", endpoint.id);
    audit_log!("operator", "upsert_printer", resource.as_str());
    Ok(ApiResponse::success(endpoint))
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

/// PUT /printers/{printer_id}/active - 启用/停用打印机
///
/// 停用的打印机轮询时始终得到 "无任务"，已排队的任务保留。
/// Persisted to `printers.json` like an upsert.
pub async fn set_active(
    State(state): State<ServerState>,
    Path(printer_id): Path<String>,
    Json(request): Json<ActiveRequest>,
) -> AppResult<ApiResponse<PrinterEndpoint>> {
    if !state.registry.set_active(&printer_id, request.active) {
        return Err(AppError::printer_not_found(printer_id));
    }
    state.registry.save()?;

    let resource = format!("printer:{}", printer_id);
    let action = if request.active {
        "activate_printer"
    } else {
        "deactivate_printer"
    };
    audit_log!("operator", action, resource.as_str());

    let endpoint = state
        .registry
        .get(&printer_id)
        .ok_or_else(|| AppError::printer_not_found(&printer_id))?;
    Ok(ApiResponse::success(endpoint))
}

/// GET /printers/{printer_id}/jobs - 某台打印机的任务
///
/// Query params: status, offset, limit
pub async fn jobs(
    State(state): State<ServerState>,
    Path(printer_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<PrintJob>>> {
    if state.registry.get(&printer_id).is_none() {
        return Err(AppError::printer_not_found(printer_id));
    }

    let query = ListQuery {
        printer_id: Some(printer_id),
        ..query
    }
    .into_job_query()?;
    let jobs = state.store.list(&query).await?;
    Ok(ApiResponse::success(jobs))
}
