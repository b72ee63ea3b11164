//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`jobs`] - 打印任务管理接口
//! - [`printers`] - 打印机列表与配置接口
//! - [`receipts`] - 小票预览接口
//! - [`cloudprnt`] - 打印机轮询接口 (CloudPRNT 协议)

pub mod cloudprnt;
pub mod health;
pub mod jobs;
pub mod printers;
pub mod receipts;

use serde::Deserialize;
use shared::error::{AppError, AppResult};
use shared::models::JobStatus;

use crate::jobs::{JobQuery, store::DEFAULT_PAGE_LIMIT};

/// Largest page a listing returns
pub const MAX_PAGE_LIMIT: usize = 200;

/// Query params shared by the job listings
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub printer_id: Option<String>,
    /// QUEUED / DELIVERED / PRINTED / FAILED / CANCELLED (case-insensitive)
    pub status: Option<String>,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn into_job_query(self) -> AppResult<JobQuery> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s.parse::<JobStatus>().map_err(|e| {
                AppError::validation(e.to_string()).with_detail("field", "status")
            })?),
        };

        Ok(JobQuery {
            printer_id: self.printer_id,
            status,
            offset: self.offset,
            limit: self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT),
        })
    }
}
