//! Printer registry and presence tracking

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::RwLock;
use shared::error::AppError;
use shared::models::{PrinterEndpoint, PrinterPresence, PrinterView};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read printers file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid printers file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Source of printer configuration
pub trait PrinterRegistry: Send + Sync {
    fn get(&self, id: &str) -> Option<PrinterEndpoint>;

    /// All printers, sorted by id
    fn list(&self) -> Vec<PrinterEndpoint>;

    fn upsert(&self, printer: PrinterEndpoint);

    /// Returns false if the printer is unknown
    fn set_active(&self, id: &str, active: bool) -> bool;

    /// Write the current printers to durable storage, if there is any
    fn save(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// Registry held in memory, seeded from a JSON file
///
/// A registry created by [`load`](Self::load) writes back to the same file
/// on [`save`](PrinterRegistry::save).
#[derive(Default)]
pub struct InMemoryPrinterRegistry {
    printers: RwLock<HashMap<String, PrinterEndpoint>>,
    path: Option<PathBuf>,
}

impl InMemoryPrinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_printers(printers: impl IntoIterator<Item = PrinterEndpoint>) -> Self {
        let registry = Self::new();
        for printer in printers {
            registry.upsert(printer);
        }
        registry
    }

    /// Load a JSON array of printers; a missing file yields an empty registry
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let mut registry = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let printers: Vec<PrinterEndpoint> = serde_json::from_str(&content)?;
            tracing::info!(path = %path.display(), count = printers.len(), "Loaded printers");
            Self::with_printers(printers)
        } else {
            tracing::warn!(path = %path.display(), "Printers file not found, starting with empty registry");
            Self::new()
        };
        registry.path = Some(path.to_path_buf());
        Ok(registry)
    }

    /// Write all printers as a JSON array, sorted by id
    ///
    /// Written to a temp file first, then renamed into place.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.list())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), count = self.len(), "Saved printers");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.printers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.printers.read().is_empty()
    }
}

impl PrinterRegistry for InMemoryPrinterRegistry {
    fn get(&self, id: &str) -> Option<PrinterEndpoint> {
        self.printers.read().get(id).cloned()
    }

    fn list(&self) -> Vec<PrinterEndpoint> {
        let mut printers: Vec<PrinterEndpoint> = self.printers.read().values().cloned().collect();
        printers.sort_by(|a, b| a.id.cmp(&b.id));
        printers
    }

    fn upsert(&self, printer: PrinterEndpoint) {
        self.printers.write().insert(printer.id.clone(), printer);
    }

    fn set_active(&self, id: &str, active: bool) -> bool {
        match self.printers.write().get_mut(id) {
            Some(printer) => {
                printer.active = active;
                true
            }
            None => false,
        }
    }

    fn save(&self) -> Result<(), RegistryError> {
        match self.path {
            Some(ref path) => self.save_to(path),
            None => Ok(()),
        }
    }
}

/// Last poll seen from each printer
#[derive(Default)]
pub struct PresenceBoard {
    entries: DashMap<String, PrinterPresence>,
}

impl PresenceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, printer_id: &str, presence: PrinterPresence) {
        self.entries.insert(printer_id.to_string(), presence);
    }

    pub fn get(&self, printer_id: &str) -> Option<PrinterPresence> {
        self.entries.get(printer_id).map(|p| p.clone())
    }

    /// Registry entries joined with presence as of `now` (millis)
    pub fn views(&self, registry: &dyn PrinterRegistry, now: i64) -> Vec<PrinterView> {
        registry
            .list()
            .into_iter()
            .map(|endpoint| {
                let presence = self.get(&endpoint.id);
                let window = (endpoint.poll_interval_hint_secs as i64) * 3 * 1000;
                let online = presence
                    .as_ref()
                    .is_some_and(|p| now - p.last_seen_at <= window);
                PrinterView {
                    endpoint,
                    presence,
                    online,
                }
            })
            .collect()
    }
}
