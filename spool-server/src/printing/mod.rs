//! Receipt Printing Module
//!
//! Turns orders into printer-ready ESC/POS bytes:
//! - Kitchen copies: preparation details, prices only on request
//! - Customer copies: right-aligned prices and a total

pub mod encoder;
pub mod types;

pub use encoder::{OTHER_ITEMS, ReceiptEncoder, encode_receipt};
pub use types::*;
