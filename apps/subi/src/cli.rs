//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use subi_types::ColorChoice;

/// subi - server installer progress front end
#[derive(Parser)]
#[command(name = "subi")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Server installer progress front end")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Enable debug logging to the installer log directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Replace every external effect with scaled sleeps and canned events
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Divide every dry-run sleep by this factor
    #[arg(long, global = true, value_name = "FACTOR")]
    pub scale_factor: Option<f64>,

    /// Switch on a debug flag (repeatable), e.g. install-fail
    #[arg(long = "debug-flag", global = true, value_name = "FLAG")]
    pub debug_flags: Vec<String>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the install and show its progress
    Install {
        /// Do not ask for confirmation; failures end the run with an error
        #[arg(long)]
        non_interactive: bool,

        /// Reboot without waiting once the install is done
        #[arg(long)]
        reboot: bool,

        /// The system has no network connection (skips security updates)
        #[arg(long)]
        no_network: bool,

        /// Install openssh-server into the target
        #[arg(long)]
        ssh_server: bool,

        /// Extra package to install after the base system (repeatable)
        #[arg(long = "package", value_name = "NAME")]
        packages: Vec<String>,
    },

    /// Show the network overview for a network description
    Network {
        /// YAML network description
        file: PathBuf,

        /// Print the actions that accepting this configuration produces
        #[arg(long)]
        done: bool,
    },
}
