//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logs::LogLevel;

#[derive(Parser, Debug)]
#[command(name = "appvisor", version, about = "Manage and update containerized applications")]
pub struct Cli {
    /// Settings file [default: /etc/appvisor/settings.json]
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start an application from its current bundle
    Run { app: String },

    /// Stop an application with SIGTERM, escalating to SIGKILL
    Terminate {
        app: String,

        /// Seconds to wait after SIGTERM
        #[arg(long)]
        sigterm_timeout: Option<u64>,

        /// Seconds to wait after SIGKILL
        #[arg(long)]
        sigkill_timeout: Option<u64>,
    },

    /// Stop an application with SIGKILL
    Kill {
        app: String,

        /// Seconds to wait after SIGKILL
        #[arg(long)]
        sigkill_timeout: Option<u64>,
    },

    /// Print the container state of an application
    State { app: String },

    /// Install a package as a new application
    Install { package: PathBuf },

    /// Install a package, replacing any installed version
    ForceInstall { package: PathBuf },

    /// Stop and remove an application
    Remove { app: String },

    /// List installed applications
    List,

    /// Apply an update payload
    Update {
        payload: PathBuf,

        /// Firmware header to verify the payload against
        #[arg(long)]
        header: Option<PathBuf>,

        /// Keep the payload file afterwards
        #[arg(long)]
        keep: bool,

        /// Do not reboot after the update
        #[arg(long)]
        no_reboot: bool,

        /// Reboot without asking
        #[arg(long, conflicts_with = "assume_no")]
        assume_yes: bool,

        /// Answer "no" to the reboot prompt
        #[arg(long)]
        assume_no: bool,
    },

    /// Firmware header tools
    Header {
        #[command(subcommand)]
        command: HeaderCommand,
    },

    /// Print build information
    Version,
}

impl Command {
    /// Application named on the command line, if any
    pub fn app(&self) -> Option<&str> {
        match self {
            Command::Run { app }
            | Command::Terminate { app, .. }
            | Command::Kill { app, .. }
            | Command::State { app }
            | Command::Remove { app } => Some(app),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum HeaderCommand {
    /// Decode and print a header file
    Inspect { file: PathBuf },

    /// Write a header describing a payload
    Create {
        /// Payload to describe
        #[arg(long)]
        payload: PathBuf,

        /// Version timestamp in seconds (defaults to now)
        #[arg(long)]
        firmware_version: Option<u64>,

        /// 16-byte campaign id as 32 hex digits
        #[arg(long)]
        campaign_id: String,

        /// File holding the signature blob
        #[arg(long)]
        signature: Option<PathBuf>,

        /// Where to write the header
        #[arg(long)]
        output: PathBuf,
    },
}
