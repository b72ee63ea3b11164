//! Print job queue
//!
//! - [`store`] - `JobStore` trait and query types
//! - [`memory`] / [`storage`] - in-memory and redb implementations
//! - [`state`] - job-level state machine shared by both stores
//! - [`enqueue`] - validated job creation and reprint
//! - [`dispatcher`] - CloudPRNT poll handling
//! - [`status`] - presence and job outcome recording
//! - [`retry`] - delivery timeout and retry sweeps
//! - [`registry`] - printer configuration and presence

pub mod clock;
pub mod dispatcher;
pub mod enqueue;
pub mod memory;
pub mod registry;
pub mod retry;
pub mod state;
pub mod status;
pub mod storage;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::PollDispatcher;
pub use enqueue::{EnqueueError, EnqueueReceipt, EnqueueRequest, EnqueueService};
pub use memory::MemoryJobStore;
pub use registry::{InMemoryPrinterRegistry, PresenceBoard, PrinterRegistry, RegistryError};
pub use retry::{RetryBackoff, RetryPolicy, RetryScheduler, SweepReport};
pub use status::{JobOutcome, ReportError, StatusReporter};
pub use storage::RedbJobStore;
pub use store::{
    CreateOutcome, JobQuery, JobStore, JobStoreError, JobStoreResult, NewJob, TransitionOutcome,
};
