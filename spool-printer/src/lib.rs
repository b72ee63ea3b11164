//! # spool-printer
//!
//! ESC/POS thermal printer library - low-level byte building only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - Code page conversion (Windows-1252, GBK) with column-aware padding
//! - Guaranteed INIT prefix and cut suffix on every ticket
//!
//! Business logic (WHAT to print) stays in application code:
//! - Receipt and kitchen ticket rendering → spool-server
//!
//! ## Example
//!
//! ```
//! use spool_printer::{CutMode, EscPosBuilder};
//!
//! let mut builder = EscPosBuilder::new(48);
//! builder.center();
//! builder.double_size();
//! builder.line("KITCHEN");
//! builder.reset_size();
//! builder.sep_double();
//! builder.left();
//! builder.line("Table 12");
//!
//! let bytes = builder.finish(CutMode::Full, 3);
//! assert!(bytes.ends_with(&CutMode::Full.sequence(3)));
//! ```

mod encoding;
mod error;
mod escpos;

// Re-exports
pub use encoding::TextEncoding;
pub use error::{PrintError, PrintResult};
pub use escpos::{CutMode, EscPosBuilder, INIT};
