use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use spool_printer::EscPosBuilder;

use crate::core::ServerError;
use crate::jobs::{RetryBackoff, RetryPolicy};
use crate::printing::DEFAULT_PAPER_WIDTH;

/// 任务存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// 内存存储，重启后丢失
    Memory,
    /// redb 文件存储 (`{WORK_DIR}/spool.redb`)
    #[default]
    Redb,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Redb => "redb",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "redb" => Ok(StoreBackend::Redb),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// 服务器配置 - 打印队列的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./work_dir | 工作目录（数据库、日志、printers.json） |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | STORE_BACKEND | redb | 存储后端: memory / redb |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | DELIVERY_TIMEOUT_SECS | 45 | 投递后未确认的超时时间 |
/// | RETRY_BACKOFF_SECS | 10 | 重试退避（基准）时间 |
/// | RETRY_BACKOFF_MULTIPLIER | 1 | 退避倍数，大于 1 时为指数退避 |
/// | RETRY_BACKOFF_MAX_SECS | 300 | 指数退避上限 |
/// | RETRY_SWEEP_INTERVAL_SECS | 5 | 重试扫描间隔 |
/// | DEFAULT_MAX_RETRIES | 3 | 默认最大重试次数 |
/// | PRINTERS_FILE | {WORK_DIR}/printers.json | 打印机配置文件 |
/// | DEFAULT_PRINTERS | (空) | 逗号分隔的打印机 ID，文件缺失时使用 |
/// | PAPER_WIDTH | 48 | 默认小票宽度（字符列数） |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/spool HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    pub store_backend: StoreBackend,
    pub log_level: String,
    pub log_json: bool,
    pub delivery_timeout_secs: u64,
    pub retry_backoff_secs: u64,
    /// 1.0 = 固定退避
    pub retry_backoff_multiplier: f64,
    pub retry_backoff_max_secs: u64,
    pub retry_sweep_interval_secs: u64,
    pub default_max_retries: u32,
    /// 打印机配置文件路径 (None = `{work_dir}/printers.json`)
    pub printers_file: Option<String>,
    /// 未找到配置文件时注册的打印机 ID
    pub default_printers: Vec<String>,
    pub paper_width: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./work_dir".into()),
            http_port: env_or("HTTP_PORT", 3000),
            store_backend: env_or("STORE_BACKEND", StoreBackend::default()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            delivery_timeout_secs: env_or("DELIVERY_TIMEOUT_SECS", 45),
            retry_backoff_secs: env_or("RETRY_BACKOFF_SECS", 10),
            retry_backoff_multiplier: env_or("RETRY_BACKOFF_MULTIPLIER", 1.0),
            retry_backoff_max_secs: env_or("RETRY_BACKOFF_MAX_SECS", 300),
            retry_sweep_interval_secs: env_or("RETRY_SWEEP_INTERVAL_SECS", 5),
            default_max_retries: env_or("DEFAULT_MAX_RETRIES", 3),
            printers_file: std::env::var("PRINTERS_FILE").ok(),
            default_printers: std::env::var("DEFAULT_PRINTERS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            paper_width: env_or("PAPER_WIDTH", DEFAULT_PAPER_WIDTH),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 启动前检查无法自动修正的配置项
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.delivery_timeout_secs == 0 {
            return Err(ServerError::Config(
                "DELIVERY_TIMEOUT_SECS must be greater than 0".into(),
            ));
        }
        EscPosBuilder::check_width(self.paper_width)
            .map_err(|e| ServerError::Config(format!("PAPER_WIDTH: {}", e)))?;
        Ok(())
    }

    pub fn work_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.work_path().join("spool.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.work_path().join("logs")
    }

    pub fn printers_path(&self) -> PathBuf {
        match &self.printers_file {
            Some(path) => PathBuf::from(path),
            None => self.work_path().join("printers.json"),
        }
    }

    /// 退避策略：倍数大于 1 时使用指数退避
    pub fn retry_backoff(&self) -> RetryBackoff {
        let base = Duration::from_secs(self.retry_backoff_secs);
        if self.retry_backoff_multiplier > 1.0 {
            RetryBackoff::Exponential {
                base,
                multiplier: self.retry_backoff_multiplier,
                max: Duration::from_secs(self.retry_backoff_max_secs.max(self.retry_backoff_secs)),
            }
        } else {
            RetryBackoff::Fixed(base)
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
            backoff: self.retry_backoff(),
            sweep_interval: Duration::from_secs(self.retry_sweep_interval_secs.max(1)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!(" REDB ".parse::<StoreBackend>(), Ok(StoreBackend::Redb));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_paths_under_work_dir() {
        let mut config = Config::with_overrides("/tmp/spool", 0);
        config.printers_file = None;
        assert_eq!(config.database_path(), PathBuf::from("/tmp/spool/spool.redb"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/spool/logs"));
        assert_eq!(config.printers_path(), PathBuf::from("/tmp/spool/printers.json"));

        config.printers_file = Some("/etc/spool/printers.json".into());
        assert_eq!(config.printers_path(), PathBuf::from("/etc/spool/printers.json"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::with_overrides("/tmp/spool", 0);
        config.delivery_timeout_secs = 45;
        config.paper_width = 48;
        assert!(config.validate().is_ok());

        config.paper_width = 4;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        config.paper_width = 32;
        config.delivery_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_backoff_selection() {
        let mut config = Config::with_overrides("/tmp/spool", 0);
        config.retry_backoff_secs = 10;
        config.retry_backoff_multiplier = 1.0;
        assert_eq!(
            config.retry_backoff(),
            RetryBackoff::Fixed(Duration::from_secs(10))
        );

        config.retry_backoff_multiplier = 2.0;
        config.retry_backoff_max_secs = 60;
        assert_eq!(
            config.retry_backoff(),
            RetryBackoff::Exponential {
                base: Duration::from_secs(10),
                multiplier: 2.0,
                max: Duration::from_secs(60),
            }
        );
    }
}
