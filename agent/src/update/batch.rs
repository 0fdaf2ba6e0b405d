//! Update batch bookkeeping
//!
//! Records are kept in the order their packages appear in the payload.
//! That order is the processing order of every phase, and the recorded
//! progress is the only input to rollback.

use std::path::PathBuf;

use serde::Serialize;

/// One application being updated in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRecord {
    /// Application (and container) name
    pub name: String,

    /// Bundle installed before the batch, absent on first install
    pub current_bundle: Option<PathBuf>,

    /// Bundle the batch installs
    pub new_bundle: PathBuf,

    /// Package the new bundle comes from
    pub package: PathBuf,
}

/// Steps completed for one record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub install_attempted: bool,
    pub installed: bool,
    pub stopped: bool,
    /// The container was running before the stop
    pub was_running: bool,
    pub start_attempted: bool,
    pub started: bool,
}

#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub record: AppRecord,
    pub progress: Progress,
}

/// Ordered records of one update payload plus their progress
#[derive(Debug, Clone, Default)]
pub struct UpdateBatch {
    entries: Vec<BatchEntry>,
}

impl UpdateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning its index
    pub fn push(&mut self, record: AppRecord) -> usize {
        self.entries.push(BatchEntry {
            record,
            progress: Progress::default(),
        });
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.record.name == name)
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn record(&self, index: usize) -> &AppRecord {
        &self.entries[index].record
    }

    pub fn progress(&self, index: usize) -> Progress {
        self.entries[index].progress
    }

    pub fn mark_install_attempted(&mut self, index: usize) {
        self.entries[index].progress.install_attempted = true;
    }

    pub fn mark_installed(&mut self, index: usize) {
        self.entries[index].progress.installed = true;
    }

    pub fn mark_stopped(&mut self, index: usize, was_running: bool) {
        let progress = &mut self.entries[index].progress;
        progress.stopped = true;
        progress.was_running = was_running;
    }

    pub fn mark_start_attempted(&mut self, index: usize) {
        self.entries[index].progress.start_attempted = true;
    }

    pub fn mark_started(&mut self, index: usize) {
        self.entries[index].progress.started = true;
    }
}

/// An old bundle that could not be removed after a successful update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupWarning {
    pub app: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a successful batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Applications now running their new version, in batch order
    pub updated: Vec<String>,

    pub cleanup_warnings: Vec<CleanupWarning>,
}
