//! Data models
//!
//! Shared between the server and its API clients.
//! Timestamps are unix millis (`i64`), ids are UUID strings.

pub mod cloudprnt;
pub mod job;
pub mod printer;

// Re-exports
pub use cloudprnt::{PollRequest, PollResponse};
pub use job::*;
pub use printer::*;
