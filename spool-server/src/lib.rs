//! Spool Server - CloudPRNT 打印队列服务
//!
//! # 架构概述
//!
//! - **任务队列** (`jobs`): 幂等入队、按打印机领取、超时重试
//! - **小票编码** (`printing`): 订单明细 → ESC/POS 字节
//! - **HTTP API** (`api`): 管理接口和 CloudPRNT 轮询接口
//!
//! # 模块结构
//!
//! ```text
//! spool-server/src/
//! ├── core/          # 配置、状态、错误、后台任务
//! ├── common/        # 日志
//! ├── jobs/          # 任务存储、状态机、调度
//! ├── printing/      # 小票渲染
//! └── api/           # HTTP 路由和处理器
//! ```

pub mod api;
pub mod common;
pub mod core;
pub mod jobs;
pub mod printing;

use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use jobs::{JobStore, MemoryJobStore, RedbJobStore};

// Re-export logger functions
pub use common::{cleanup_old_logs, init_logger, init_logger_with_file};

/// 设置运行环境：加载 .env、创建工作目录、初始化日志
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    std::fs::create_dir_all(config.work_path())?;

    let log_dir = config.log_dir();
    init_logger_with_file(
        &config.log_level,
        config.log_json,
        Some(log_dir.to_string_lossy().as_ref()),
    )?;
    Ok(())
}

async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(target: "http_access", "{} {} {}", method, uri, response.status());
    response
}

/// Build the full application router
pub fn build_router(state: ServerState) -> Router {
    Router::<ServerState>::new()
        // Operator APIs
        .merge(api::health::router())
        .merge(api::jobs::router())
        .merge(api::printers::router())
        .merge(api::receipts::router())
        // Printer-facing protocol
        .merge(api::cloudprnt::router())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_request))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub fn print_banner() {
    println!(
        r#"
   _____                   __
  / ___/____  ____  ____  / /
  \__ \/ __ \/ __ \/ __ \/ /
 ___/ / /_/ / /_/ / /_/ / /
/____/ .___/\____/\____/_/
    /_/
    "#
    );
}
