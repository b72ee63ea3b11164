//! Receipt preview handler

use axum::{Json, extract::State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};

use crate::core::ServerState;
use crate::printing::{Receipt, ReceiptEncoder};

/// Rendered receipt, never enqueued
#[derive(Debug, Serialize)]
pub struct ReceiptPreview {
    pub width: usize,
    pub byte_count: usize,
    pub payload_base64: String,
}

/// POST /api/receipts/preview - 渲染小票但不入队
pub async fn preview(
    State(state): State<ServerState>,
    Json(receipt): Json<Receipt>,
) -> AppResult<ApiResponse<ReceiptPreview>> {
    let options = receipt.options.or_width(state.config.paper_width);
    ReceiptEncoder::validate(&options)
        .map_err(|e| AppError::with_message(ErrorCode::ReceiptOptionsInvalid, e.to_string()))?;

    let width = options.paper_width();
    let bytes = ReceiptEncoder::new(options).encode(&receipt.items);
    Ok(ApiResponse::success(ReceiptPreview {
        width,
        byte_count: bytes.len(),
        payload_base64: BASE64.encode(&bytes),
    }))
}
