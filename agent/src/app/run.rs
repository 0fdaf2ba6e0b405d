//! Command execution

use std::sync::Arc;

use colored::Colorize;
use tracing::{info, Span};

use crate::app::cli::{Command, HeaderCommand};
use crate::app::options::AppOptions;
use crate::container::controller::{ContainerController, StopOutcome};
use crate::container::runc::RuncRuntime;
use crate::errors::AppvisorError;
use crate::filesys::file::File;
use crate::header::codec::{decode, encode, FirmwareHeader, CAMPAIGN_ID_SIZE};
use crate::package::errors::PackageError;
use crate::package::installer::{validate_app_name, PackageInstaller};
use crate::package::manager::AppManager;
use crate::package::opkg::OpkgInstaller;
use crate::storage::layout::AppsLayout;
use crate::update::manager::{ApplyOptions, RebootPolicy, UpdateManager};
use crate::update::orchestrator::UpdateOrchestrator;
use crate::utils::{hex, version_info};

/// Components shared by the commands
struct Components {
    controller: Arc<ContainerController>,
    installer: Arc<dyn PackageInstaller>,
    layout: AppsLayout,
}

impl Components {
    fn new(options: &AppOptions, span: &Span) -> Self {
        let runtime = RuncRuntime::new(options.runtime.binary.clone(), options.runtime.root.clone());
        let controller = ContainerController::new(
            Arc::new(runtime),
            options.controller.clone(),
            span.clone(),
        );
        Self {
            controller: Arc::new(controller),
            installer: Arc::new(OpkgInstaller::new(options.package_binary.clone())),
            layout: AppsLayout::new(options.apps_root.clone()),
        }
    }

    fn app_manager(&self, span: &Span) -> AppManager {
        AppManager::new(self.installer.clone(), self.layout.clone(), span.clone())
    }

    fn update_manager(&self, options: &AppOptions, span: &Span) -> UpdateManager {
        let orchestrator = UpdateOrchestrator::new(
            self.controller.clone(),
            self.installer.clone(),
            self.layout.clone(),
            options.update.clone(),
            span.clone(),
        );
        UpdateManager::new(orchestrator, options.reboot_command.clone(), span.clone())
    }
}

/// Execute one command
pub async fn execute(command: Command, options: &AppOptions, span: Span) -> Result<(), AppvisorError> {
    let components = Components::new(options, &span);
    let span = &span;
    let controller = &components.controller;
    if let Some(app) = command.app() {
        validate_app_name(app)?;
    }
    match command {
        Command::Run { app } => {
            let (_, bundle) = components
                .layout
                .current_bundle(&app)
                .await?
                .ok_or_else(|| PackageError::NotInstalled(app.clone()))?;
            controller.run(&app, &bundle).await?;
            success(&format!("{} is running", app));
        }
        Command::Terminate {
            app,
            sigterm_timeout,
            sigkill_timeout,
        } => {
            let outcome = controller
                .stop(
                    &app,
                    options.sigterm_timeout(sigterm_timeout),
                    options.sigkill_timeout(sigkill_timeout),
                )
                .await?;
            report_stop(&app, outcome);
        }
        Command::Kill { app, sigkill_timeout } => {
            let outcome = controller
                .kill(&app, options.sigkill_timeout(sigkill_timeout))
                .await?;
            report_stop(&app, outcome);
        }
        Command::State { app } => {
            println!("{}", controller.get_state(&app).await);
        }
        Command::Install { package } => {
            let (app, bundle) = components.app_manager(span).install(&package).await?;
            success(&format!("Installed {} into {:?}", app, bundle));
        }
        Command::ForceInstall { package } => {
            let name = components.app_manager(span).app_name(&package).await?;
            controller
                .stop(&name, options.sigterm_timeout(None), options.sigkill_timeout(None))
                .await?;
            let (app, bundle) = components.app_manager(span).force_install(&package).await?;
            success(&format!("Installed {} into {:?}", app, bundle));
        }
        Command::Remove { app } => {
            controller
                .stop(&app, options.sigterm_timeout(None), options.sigkill_timeout(None))
                .await?;
            components.app_manager(span).remove(&app).await?;
            success(&format!("Removed {}", app));
        }
        Command::List => {
            for installed in components.app_manager(span).list().await? {
                let state = controller.get_state(&installed.name).await;
                println!("{:<24} {:<14} {:?}", installed.name, state.to_string(), installed.versions);
            }
        }
        Command::Update {
            payload,
            header,
            keep,
            no_reboot,
            assume_yes,
            assume_no,
        } => {
            let reboot = if no_reboot {
                RebootPolicy::Skip
            } else if assume_yes {
                RebootPolicy::AssumeYes
            } else if assume_no {
                RebootPolicy::AssumeNo
            } else {
                RebootPolicy::Prompt
            };
            let apply_options = ApplyOptions {
                header,
                keep_payload: keep,
                reboot,
            };
            let report = components
                .update_manager(options, span)
                .apply(&payload, &apply_options)
                .await?;

            for warning in &report.cleanup_warnings {
                eprintln!(
                    "{} could not remove old bundle {:?} of {}: {}",
                    "[WARNING]".yellow(),
                    warning.path,
                    warning.app,
                    warning.reason
                );
            }
            if !report.cleanup_warnings.is_empty() {
                return Err(AppvisorError::CleanupWarning(report.cleanup_warnings.len()));
            }
            success(&format!("Updated {} application(s)", report.updated.len()));
        }
        Command::Header { command } => execute_header(command).await?,
        Command::Version => {
            println!("{}", serde_json::to_string_pretty(&version_info())?);
        }
    }
    Ok(())
}

async fn execute_header(command: HeaderCommand) -> Result<(), AppvisorError> {
    match command {
        HeaderCommand::Inspect { file } => {
            let data = File::new(file).read_bytes().await?;
            let header = decode(&data)?;
            println!("{}", header);
        }
        HeaderCommand::Create {
            payload,
            firmware_version,
            campaign_id,
            signature,
            output,
        } => {
            let campaign_id = parse_campaign_id(&campaign_id)?;
            let signature = match signature {
                Some(path) => File::new(path).read_bytes().await?,
                None => Vec::new(),
            };
            let firmware_version = firmware_version.unwrap_or_else(now_timestamp);

            let header = FirmwareHeader::for_payload(&payload, firmware_version, campaign_id, signature).await?;
            let encoded = encode(&header)?;
            File::new(&output).write_atomic(&encoded).await?;
            info!("Wrote {} byte header to {:?}", encoded.len(), output);
            println!("{}", header);
        }
    }
    Ok(())
}

fn parse_campaign_id(text: &str) -> Result<Vec<u8>, AppvisorError> {
    let bytes = hex::decode(text).map_err(|e| AppvisorError::InvalidArgument(format!("campaign id: {}", e)))?;
    if bytes.len() != CAMPAIGN_ID_SIZE {
        return Err(AppvisorError::InvalidArgument(format!(
            "campaign id must be {} bytes, got {}",
            CAMPAIGN_ID_SIZE,
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn now_timestamp() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

fn report_stop(app: &str, outcome: StopOutcome) {
    match outcome {
        StopOutcome::Stopped => success(&format!("{} stopped", app)),
        StopOutcome::DoesNotExist => println!("{} is not running", app),
    }
}

fn success(message: &str) {
    println!("{} {}", "[SUCCESS]".green(), message);
}
