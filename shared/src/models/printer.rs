//! Printer Model

use serde::{Deserialize, Serialize};

use super::job::ContentType;

/// A CloudPRNT printer known to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterEndpoint {
    pub id: String,
    pub display_name: String,
    /// Poll interval the printer is configured with, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_hint_secs: u64,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Content types the printer accepts (empty = anything)
    #[serde(default)]
    pub media_types: Vec<ContentType>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl PrinterEndpoint {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            poll_interval_hint_secs: default_poll_interval(),
            active: true,
            media_types: Vec::new(),
        }
    }

    pub fn accepts(&self, content_type: ContentType) -> bool {
        self.media_types.is_empty() || self.media_types.contains(&content_type)
    }
}

/// Last known state of a polling printer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterPresence {
    pub last_seen_at: i64,
    /// Raw ASB status string from the last poll
    pub last_status: Option<String>,
    pub printing_in_progress: bool,
    pub printer_mac: Option<String>,
}

/// Registry entry with its presence, as listed by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterView {
    #[serde(flatten)]
    pub endpoint: PrinterEndpoint,
    pub presence: Option<PrinterPresence>,
    /// Seen within three poll intervals
    pub online: bool,
}
