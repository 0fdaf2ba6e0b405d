//! Update manager
//!
//! Wraps the orchestrator with payload verification against a firmware
//! header, payload cleanup and the post-update reboot.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, info_span, warn, Instrument, Span};

use crate::header::codec::{decode, hash_stream, FirmwareHeader};
use crate::update::batch::BatchReport;
use crate::update::errors::UpdateError;
use crate::update::orchestrator::UpdateOrchestrator;

/// What to do about rebooting after a successful update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootPolicy {
    /// Never reboot
    Skip,

    /// Ask on the terminal
    Prompt,

    /// Reboot without asking
    AssumeYes,

    /// Answer "no" without asking
    AssumeNo,
}

/// Options for applying one payload
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Header describing the payload; when given the payload is verified
    /// against it before anything is installed
    pub header: Option<PathBuf>,

    /// Leave the payload file in place afterwards
    pub keep_payload: bool,

    pub reboot: RebootPolicy,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            header: None,
            keep_payload: false,
            reboot: RebootPolicy::Prompt,
        }
    }
}

pub struct UpdateManager {
    orchestrator: UpdateOrchestrator,
    reboot_command: Vec<String>,
    span: Span,
}

impl UpdateManager {
    pub fn new(orchestrator: UpdateOrchestrator, reboot_command: Vec<String>, span: Span) -> Self {
        Self {
            orchestrator,
            reboot_command,
            span,
        }
    }

    /// Apply the update payload at `payload`.
    ///
    /// The payload file is removed afterwards, whatever the outcome,
    /// unless `keep_payload` is set.
    pub async fn apply(&self, payload: &Path, options: &ApplyOptions) -> Result<BatchReport, UpdateError> {
        let span = info_span!(parent: &self.span, "apply", payload = %payload.display());
        let result = self.apply_verified(payload, options).instrument(span).await;

        if !options.keep_payload {
            match tokio::fs::remove_file(payload).await {
                Ok(()) => info!("Removed update payload {:?}", payload),
                Err(e) => warn!("Unable to remove update payload {:?}: {}", payload, e),
            }
        }
        result
    }

    async fn apply_verified(&self, payload: &Path, options: &ApplyOptions) -> Result<BatchReport, UpdateError> {
        if let Some(header_path) = &options.header {
            let header = verify_payload(header_path, payload).await?;
            info!(
                "Payload verified against header (version {}, {} bytes)",
                header.firmware_version, header.firmware_size
            );
        }

        let report = self.orchestrator.apply_payload(payload).await?;

        if !report.updated.is_empty() && self.confirm_reboot(options.reboot).await? {
            self.reboot().await?;
        }
        Ok(report)
    }

    async fn confirm_reboot(&self, policy: RebootPolicy) -> Result<bool, UpdateError> {
        match policy {
            RebootPolicy::Skip | RebootPolicy::AssumeNo => {
                info!("Not rebooting after update");
                Ok(false)
            }
            RebootPolicy::AssumeYes => Ok(true),
            RebootPolicy::Prompt => {
                print!("Update applied. Reboot now? [y/N] ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
                Ok(parse_confirmation(&line))
            }
        }
    }

    async fn reboot(&self) -> Result<(), UpdateError> {
        let (program, args) = self
            .reboot_command
            .split_first()
            .ok_or_else(|| UpdateError::RebootFailed("no reboot command configured".to_string()))?;

        info!("Rebooting: {:?}", self.reboot_command);
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| UpdateError::RebootFailed(format!("failed to run {}: {}", program, e)))?;
        if !status.success() {
            return Err(UpdateError::RebootFailed(format!("{} exited with {}", program, status)));
        }
        Ok(())
    }
}

/// Decode the header at `header_path` and check the payload's size and
/// hash against it
pub async fn verify_payload(header_path: &Path, payload: &Path) -> Result<FirmwareHeader, UpdateError> {
    let blob = tokio::fs::read(header_path).await?;
    let header = decode(&blob)?;

    let mut file = tokio::fs::File::open(payload).await?;
    let size = file.metadata().await?.len();
    if size != header.firmware_size {
        return Err(UpdateError::PayloadMismatch(format!(
            "payload is {} bytes, header declares {}",
            size, header.firmware_size
        )));
    }

    let digest = hash_stream(&mut file).await?;
    if digest != header.firmware_hash {
        return Err(UpdateError::PayloadMismatch("payload hash differs from header".to_string()));
    }
    Ok(header)
}

fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
