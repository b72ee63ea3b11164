use thiserror::Error;

use crate::jobs::{JobStoreError, RegistryError};

/// 启动和运行期间的服务器错误
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("存储错误: {0}")]
    Store(#[from] JobStoreError),

    #[error("打印机配置错误: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误: {0}")]
    Internal(#[from] anyhow::Error),
}

/// 服务器 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
