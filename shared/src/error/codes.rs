//! Unified error codes for the Spool print server
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Job errors
//! - 2xxx: Printer errors
//! - 3xxx: Receipt errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so they serialize the same
/// way for every client of the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Job ====================
    /// Print job not found
    JobNotFound = 1001,
    /// Job status does not allow the requested transition
    InvalidTransition = 1002,
    /// Idempotency key is blank or too long
    IdempotencyKeyInvalid = 1003,
    /// Job payload is missing, ambiguous or empty
    PayloadInvalid = 1004,
    /// Requested retry budget is above the allowed maximum
    RetryLimitExceeded = 1005,

    // ==================== 2xxx: Printer ====================
    /// Printer is not registered
    PrinterNotFound = 2001,
    /// Printer is registered but inactive
    PrinterNotAvailable = 2002,
    /// Job belongs to a different printer
    PrinterMismatch = 2003,

    // ==================== 3xxx: Receipt ====================
    /// Receipt has no items
    ReceiptEmpty = 3001,
    /// Receipt options are invalid (paper width, encoding)
    ReceiptOptionsInvalid = 3002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
    /// Operation timed out
    TimeoutError = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Job
            ErrorCode::JobNotFound => "Print job not found",
            ErrorCode::InvalidTransition => "Job status does not allow this operation",
            ErrorCode::IdempotencyKeyInvalid => "Idempotency key is invalid",
            ErrorCode::PayloadInvalid => "Job payload is invalid",
            ErrorCode::RetryLimitExceeded => "Retry limit is too high",

            // Printer
            ErrorCode::PrinterNotFound => "Printer not found",
            ErrorCode::PrinterNotAvailable => "Printer is not available",
            ErrorCode::PrinterMismatch => "Job belongs to a different printer",

            // Receipt
            ErrorCode::ReceiptEmpty => "Receipt has no items",
            ErrorCode::ReceiptOptionsInvalid => "Receipt options are invalid",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::TimeoutError => "Operation timed out",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Job
            1001 => Ok(ErrorCode::JobNotFound),
            1002 => Ok(ErrorCode::InvalidTransition),
            1003 => Ok(ErrorCode::IdempotencyKeyInvalid),
            1004 => Ok(ErrorCode::PayloadInvalid),
            1005 => Ok(ErrorCode::RetryLimitExceeded),

            // Printer
            2001 => Ok(ErrorCode::PrinterNotFound),
            2002 => Ok(ErrorCode::PrinterNotAvailable),
            2003 => Ok(ErrorCode::PrinterMismatch),

            // Receipt
            3001 => Ok(ErrorCode::ReceiptEmpty),
            3002 => Ok(ErrorCode::ReceiptOptionsInvalid),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ConfigError),
            9004 => Ok(ErrorCode::TimeoutError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::JobNotFound.code(), 1001);
        assert_eq!(ErrorCode::PrinterNotAvailable.code(), 2002);
        assert_eq!(ErrorCode::ReceiptEmpty.code(), 3001);
        assert_eq!(ErrorCode::DatabaseError.code(), 9002);
    }

    #[test]
    fn test_try_from_round_trip() {
        for code in [
            ErrorCode::Success,
            ErrorCode::InvalidTransition,
            ErrorCode::PrinterMismatch,
            ErrorCode::ReceiptOptionsInvalid,
            ErrorCode::TimeoutError,
        ] {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
        assert_eq!(ErrorCode::try_from(4242), Err(InvalidErrorCode(4242)));
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::PrinterNotFound).unwrap();
        assert_eq!(json, "2001");

        let code: ErrorCode = serde_json::from_str("1002").unwrap();
        assert_eq!(code, ErrorCode::InvalidTransition);

        assert!(serde_json::from_str::<ErrorCode>("7777").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorCode::JobNotFound.to_string(), "1001");
    }
}
