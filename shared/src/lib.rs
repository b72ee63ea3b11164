//! Shared types for the Spool print server
//!
//! Wire and domain models used by the server and its clients, plus the
//! unified error system rendered at the HTTP edge.

pub mod error;
pub mod models;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
