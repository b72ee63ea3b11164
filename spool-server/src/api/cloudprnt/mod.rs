//! CloudPRNT 打印机轮询接口
//!
//! 打印机按固定间隔访问同一个 URL：
//!
//! | 方法 | 作用 |
//! |------|------|
//! | POST | 状态上报，返回是否有任务 (只查看，不领取) |
//! | GET | 领取并下载任务内容 |
//! | DELETE | 上报打印结果 |
//!
//! 这些接口使用打印机原始协议格式，不使用 `ApiResponse` 包装。

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

/// Header carrying the job id on a content fetch
pub const JOB_TOKEN_HEADER: &str = "x-star-job-token";

pub fn router() -> Router<ServerState> {
    Router::new().route(
        "/printers/{printer_id}/job",
        post(handler::status_report)
            .get(handler::fetch)
            .delete(handler::report_result),
    )
}
