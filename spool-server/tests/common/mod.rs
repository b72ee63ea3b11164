#![allow(dead_code)]

use std::sync::Arc;

use shared::models::PrinterEndpoint;
use spool_server::core::StoreBackend;
use spool_server::jobs::{
    EnqueueRequest, InMemoryPrinterRegistry, JobStore, ManualClock, RetryScheduler,
};
use spool_server::{Config, MemoryJobStore, RedbJobStore, ServerState};
use tokio_util::sync::CancellationToken;

/// 2026-01-01T00:00:00Z
pub const T0: i64 = 1_767_225_600_000;

pub const KITCHEN: &str = "kitchen";
pub const BAR: &str = "bar";

pub fn test_config() -> Config {
    let mut config = Config::with_overrides("/tmp/spool-tests", 0);
    config.store_backend = StoreBackend::Memory;
    config.delivery_timeout_secs = 45;
    config.retry_backoff_secs = 10;
    config.retry_backoff_multiplier = 1.0;
    config.default_max_retries = 3;
    config.paper_width = 48;
    config.default_printers = Vec::new();
    config
}

fn registry() -> InMemoryPrinterRegistry {
    InMemoryPrinterRegistry::with_printers([
        PrinterEndpoint::new(KITCHEN, "Kitchen"),
        PrinterEndpoint::new(BAR, "Bar"),
    ])
}

pub fn state_with_store(store: Arc<dyn JobStore>) -> (ServerState, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let state = ServerState::new(test_config(), store, Arc::new(registry()), clock.clone());
    (state, clock)
}

/// Memory store with a registry backed by `printers.json` at `path`
pub fn file_registry_state(path: &std::path::Path) -> (ServerState, Arc<ManualClock>) {
    let registry = InMemoryPrinterRegistry::load(path).expect("printers file");
    let clock = Arc::new(ManualClock::new(T0));
    let state = ServerState::new(
        test_config(),
        Arc::new(MemoryJobStore::new()),
        Arc::new(registry),
        clock.clone(),
    );
    (state, clock)
}

pub fn memory_state() -> (ServerState, Arc<ManualClock>) {
    state_with_store(Arc::new(MemoryJobStore::new()))
}

pub fn redb_state() -> (ServerState, Arc<ManualClock>) {
    let store = RedbJobStore::open_in_memory().expect("in-memory redb");
    state_with_store(Arc::new(store))
}

pub fn scheduler(state: &ServerState) -> RetryScheduler {
    RetryScheduler::new(
        state.store.clone(),
        state.clock.clone(),
        state.config.retry_policy(),
        CancellationToken::new(),
    )
}

pub fn text_job(key: &str, printer_id: &str, text: &str) -> EnqueueRequest {
    EnqueueRequest {
        idempotency_key: key.to_string(),
        printer_id: printer_id.to_string(),
        payload: Some(text.to_string()),
        ..EnqueueRequest::default()
    }
}
