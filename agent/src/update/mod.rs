//! Atomic multi-application updates

pub mod batch;
pub mod errors;
pub mod manager;
pub mod orchestrator;
pub mod payload;

pub use batch::{AppRecord, BatchReport, CleanupWarning, UpdateBatch};
pub use errors::UpdateError;
pub use manager::{ApplyOptions, RebootPolicy, UpdateManager};
pub use orchestrator::{UpdateOptions, UpdateOrchestrator};
