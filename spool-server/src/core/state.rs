use std::sync::Arc;

use shared::models::PrinterEndpoint;

use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result, StoreBackend};
use crate::jobs::{
    Clock, EnqueueService, InMemoryPrinterRegistry, JobStore, MemoryJobStore, PollDispatcher,
    PresenceBoard, PrinterRegistry, RedbJobStore, RetryScheduler, StatusReporter, SystemClock,
};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，每个请求克隆一次。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | store | Arc<dyn JobStore> | 任务存储 (memory / redb) |
/// | registry | Arc<dyn PrinterRegistry> | 打印机配置 |
/// | presence | Arc<PresenceBoard> | 打印机在线状态 |
/// | clock | Arc<dyn Clock> | 时间源 |
/// | enqueue | EnqueueService | 入队服务 |
/// | reporter | StatusReporter | 状态上报 |
/// | dispatcher | PollDispatcher | CloudPRNT 轮询处理 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub store: Arc<dyn JobStore>,
    pub registry: Arc<dyn PrinterRegistry>,
    pub presence: Arc<PresenceBoard>,
    pub clock: Arc<dyn Clock>,
    pub enqueue: EnqueueService,
    pub reporter: StatusReporter,
    pub dispatcher: PollDispatcher,
}

impl ServerState {
    /// 由已构造的组件组装服务器状态
    ///
    /// 测试中可直接传入内存存储和手动时钟
    pub fn new(
        config: Config,
        store: Arc<dyn JobStore>,
        registry: Arc<dyn PrinterRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let presence = Arc::new(PresenceBoard::new());
        let enqueue = EnqueueService::new(
            store.clone(),
            registry.clone(),
            clock.clone(),
            config.default_max_retries,
        )
        .with_paper_width(config.paper_width);
        let reporter = StatusReporter::new(store.clone(), presence.clone(), clock.clone());
        let dispatcher =
            PollDispatcher::new(store.clone(), registry.clone(), reporter.clone(), clock.clone());

        Self {
            config,
            store,
            registry,
            presence,
            clock,
            enqueue,
            reporter,
            dispatcher,
        }
    }

    /// 初始化服务器状态
    ///
    /// 1. 创建工作目录
    /// 2. 打开任务存储 (`STORE_BACKEND`)
    /// 3. 加载打印机配置 (`printers.json`，缺失时使用 `DEFAULT_PRINTERS`)
    pub fn initialize(config: &Config) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(config.work_path())?;

        let store: Arc<dyn JobStore> = match config.store_backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory job store, jobs are lost on restart");
                Arc::new(MemoryJobStore::new())
            }
            StoreBackend::Redb => {
                let path = config.database_path();
                tracing::info!(path = %path.display(), "Opening job database");
                Arc::new(RedbJobStore::open(&path)?)
            }
        };

        let registry = InMemoryPrinterRegistry::load(config.printers_path())?;
        if registry.is_empty() {
            for id in &config.default_printers {
                registry.upsert(PrinterEndpoint::new(id.as_str(), id.as_str()));
            }
        }
        if registry.is_empty() {
            tracing::warn!("No printers configured, every enqueue will be rejected");
        } else {
            tracing::info!(count = registry.len(), "Printer registry ready");
        }

        Ok(Self::new(
            config.clone(),
            store,
            Arc::new(registry),
            Arc::new(SystemClock),
        ))
    }

    /// 启动后台任务
    ///
    /// 返回的任务管理器由调用方在关闭时 `shutdown()`
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let scheduler = RetryScheduler::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.retry_policy(),
            tasks.shutdown_token(),
        );
        tasks.spawn("retry_scheduler", TaskKind::Periodic, scheduler.run());

        tasks.log_summary();
        tasks
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }
}
