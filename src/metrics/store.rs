//! Persistence for usage statistics

use super::UsageStats;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write usage stats: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize usage stats: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Load/save interface for the usage stats record.
///
/// The record is read and rewritten wholesale on every update, so two
/// writers racing on the same store can lose an update.
pub trait UsageStore: Send + Sync {
    /// Load the stored stats; missing or unreadable data yields an empty baseline
    fn load(&self) -> UsageStats;

    fn save(&self, stats: &UsageStats) -> Result<(), StoreError>;
}

/// Usage stats kept in a JSON file on disk
pub struct FileUsageStore {
    path: PathBuf,
}

impl FileUsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the user's data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mrp-ai-optimizer")
            .join("usage_stats.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileUsageStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl UsageStore for FileUsageStore {
    fn load(&self) -> UsageStats {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No usage stats yet");
                return UsageStats::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read usage stats: {}", e);
                return UsageStats::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "Corrupt usage stats, starting fresh: {}", e);
            UsageStats::default()
        })
    }

    fn save(&self, stats: &UsageStats) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(stats)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-process store used by tests and the synthetic benchmark
#[derive(Default)]
pub struct MemoryUsageStore {
    stats: Mutex<UsageStats>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for MemoryUsageStore {
    fn load(&self) -> UsageStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, stats: &UsageStats) -> Result<(), StoreError> {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = stats.clone();
        Ok(())
    }
}
