//! CloudPRNT wire shapes
//!
//! Printers speak camelCase JSON; these types are only used on the
//! `/printers/{id}/job` endpoints.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of a CloudPRNT status report (`POST`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    /// Raw ASB status string
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "printerMAC")]
    pub printer_mac: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub status_code: Option<String>,
    #[serde(default)]
    pub printing_in_progress: bool,
    /// Job the outcome below refers to
    #[serde(default)]
    pub job_token: Option<String>,
    /// Outcome of the job named by `job_token` (2xx = printed)
    #[serde(default, deserialize_with = "string_or_number")]
    pub job_status_code: Option<String>,
}

impl PollRequest {
    /// `(job_token, job_status_code)` when the poll reports a job outcome
    pub fn job_result(&self) -> Option<(&str, &str)> {
        match (&self.job_token, &self.job_status_code) {
            (Some(token), Some(code)) if !token.is_empty() => Some((token.as_str(), code.as_str())),
            _ => None,
        }
    }
}

/// Answer to a status report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub job_ready: bool,
    #[serde(default)]
    pub media_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_token: Option<String>,
}

impl PollResponse {
    pub fn no_work() -> Self {
        Self::default()
    }
}

/// Printers send status codes either as `200` or `"200 OK"`
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
