//! Appvisor - Entry Point
//!
//! Runs containerized applications through an OCI runtime and applies
//! update payloads to them.

use clap::Parser;
use tracing::{error, info_span};

use appvisor::app::cli::Cli;
use appvisor::app::options::AppOptions;
use appvisor::app::run::execute;
use appvisor::filesys::file::File;
use appvisor::logs::{init_logging, LogOptions};
use appvisor::storage::layout::StorageLayout;
use appvisor::storage::settings::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Retrieve the settings file
    let settings_file = match &cli.settings {
        Some(path) => File::new(path),
        None => StorageLayout::default().settings_file(),
    };
    let settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            std::process::exit(e.exit_code());
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: cli.log_level.clone().unwrap_or_else(|| settings.log_level.clone()),
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let command_name = format!("{:?}", cli.command);
    let span = info_span!("appvisor", pid = std::process::id());
    let options = AppOptions::from_settings(&settings);

    if let Err(e) = execute(cli.command, &options, span.clone()).await {
        span.in_scope(|| error!(command = %command_name, kind = e.kind(), "{}", e));
        // process::exit skips destructors; flush the file writer first
        drop(guard);
        std::process::exit(e.exit_code());
    }
}
