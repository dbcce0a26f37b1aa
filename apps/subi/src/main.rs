//! subi - server installer progress front end
//!
//! Runs the install pipeline and renders its progress events, or shows the
//! network overview for a network description.

mod cli;
mod display;
mod error;
mod events;
mod logging;
mod network;

use crate::cli::{Cli, Commands};
use crate::display::{InstallSummary, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use crate::network::{NetworkModel, NetworkView};
use clap::Parser;
use console::Term;
use std::path::Path;
use std::process;
use subi_config::Config;
use subi_events::{AppEvent, EventEmitter, EventReceiver, EventSender, GeneralEvent, InstallEvent};
use subi_install::{ControllerOptions, InstallModel, InstallOutcome, InstallProgressController};
use subi_types::{ColorChoice, InstallState};
use tokio::select;
use tracing::{error, info, warn};

const CONFIRM_PROMPT: &str = "Continue with install? [y/N]";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    // Load configuration with proper precedence:
    // 1. Start with file config (or defaults)
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;

    // 2. Merge environment variables
    config.merge_env()?;

    // 3. Apply CLI flags (highest precedence)
    apply_cli_config(&mut config, &cli.global, &cli.command);
    config.validate()?;

    init_tracing(&config.log_dir(), cli.global.debug);
    info!("Starting subi v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Install { .. } => run_install(&config, cli.global.debug).await,
        Commands::Network { file, done } => run_network(&file, done, config.general.color).await,
    }
}

/// Run the install and render its progress until it ends
async fn run_install(config: &Config, debug: bool) -> Result<(), CliError> {
    let (event_sender, event_receiver) = subi_events::channel();

    let mut model = InstallModel::new(config.target());
    model.has_network = config.network.has_network;
    model.install_ssh_server = config.install.install_ssh_server;
    model.packages.clone_from(&config.install.packages);

    let controller =
        InstallProgressController::builder(ControllerOptions::from_config(config), model)
            .event_sender(event_sender.clone())
            .build();
    controller.start();

    let mut event_handler = EventHandler::new(colors_enabled(config.general.color), debug);
    let outcome = drive_install(
        &controller,
        &event_sender,
        event_receiver,
        &mut event_handler,
        config.general.interactive,
    )
    .await?;

    let summary = InstallSummary {
        state: controller.install_state(),
        crash_report: event_handler.crash_report().map(std::path::PathBuf::as_path),
        reboot_requested: controller.reboot_clicked().is_set() || controller.reboot_on_exit(),
        dry_run: config.general.dry_run,
    };
    OutputRenderer::new(config.general.color).render_install_summary(&summary)?;

    match outcome {
        InstallOutcome::Completed => {
            info!("Install completed");
            Ok(())
        }
        InstallOutcome::Failed { report } => Err(CliError::InstallFailed {
            report: report.map(|r| r.path),
        }),
    }
}

/// Drain events while the install runs, answering the confirmation request
/// and turning Ctrl-C into a reboot click
async fn drive_install(
    controller: &InstallProgressController,
    event_sender: &EventSender,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
    interactive: bool,
) -> Result<InstallOutcome, CliError> {
    let mut install = Box::pin(async {
        if interactive {
            controller.wait_for_install().await
        } else {
            controller
                .apply_autoinstall_config()
                .await
                .map(|()| InstallOutcome::Completed)
        }
    });

    loop {
        select! {
            result = &mut install => {
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result.map_err(CliError::from);
            }

            event = event_receiver.recv() => {
                let Some(event) = event else { continue };
                let wants_confirmation = matches!(
                    event.event,
                    AppEvent::Install(InstallEvent::StateChanged {
                        to: InstallState::NeedsConfirmation,
                        ..
                    })
                );
                event_handler.handle_event(event);
                if wants_confirmation {
                    confirm(controller, event_sender, interactive).await?;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                let state = controller.install_state();
                if matches!(state, InstallState::UuRunning | InstallState::Done) {
                    info!(state = %state, "reboot requested from the terminal");
                    controller.click_reboot().await?;
                } else {
                    warn!(state = %state, "interrupted");
                    return Err(CliError::Interrupted);
                }
            }
        }
    }
}

/// Answer the confirmation request; unattended runs confirm on their own
async fn confirm(
    controller: &InstallProgressController,
    event_sender: &EventSender,
    interactive: bool,
) -> Result<(), CliError> {
    event_sender.emit(AppEvent::General(GeneralEvent::UserConfirmationRequired {
        prompt: CONFIRM_PROMPT.to_string(),
    }));

    let response = if interactive {
        ask(CONFIRM_PROMPT).await?
    } else {
        true
    };

    event_sender.emit(AppEvent::General(GeneralEvent::UserConfirmationReceived {
        response,
    }));

    if response {
        controller.model().confirmation.set();
        Ok(())
    } else {
        Err(CliError::Declined)
    }
}

async fn ask(prompt: &str) -> Result<bool, CliError> {
    let term = Term::stderr();
    term.write_str(&format!("{prompt} "))?;
    let answer = tokio::task::spawn_blocking(move || term.read_line())
        .await
        .map_err(|e| CliError::Io(std::io::Error::other(e)))??;
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Show the network overview, and the resulting actions with `done`
async fn run_network(file: &Path, done: bool, color: ColorChoice) -> Result<(), CliError> {
    let model = NetworkModel::load(file).await?;
    let view = NetworkView::new(&model);
    let renderer = OutputRenderer::new(color);
    renderer.render_network(&view)?;

    if done {
        let actions = network::done(&model)?;
        renderer.render_actions(&actions)?;
    }
    Ok(())
}

fn colors_enabled(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => Term::stderr().features().colors_supported(),
    }
}

/// Initialize tracing/logging
fn init_tracing(log_dir: &Path, debug_enabled_flag: bool) {
    // Check if debug logging is enabled
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;

    if debug_enabled {
        // Debug mode: structured JSON logs to file
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!("Warning: Failed to create log directory: {e}");
        }

        let log_file = log_dir.join(format!(
            "subi-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));

        match std::fs::File::create(&log_file) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
                            |_| {
                                tracing_subscriber::EnvFilter::new(
                                    "info,subi=debug,subi_install=debug",
                                )
                            },
                        ),
                    )
                    .init();

                eprintln!("Debug logging enabled: {}", log_file.display());
            }
            Err(e) => {
                eprintln!("Warning: Failed to create log file: {e}");
                // Fallback to stderr
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
                            |_| tracing_subscriber::EnvFilter::new("info,subi=info"),
                        ),
                    )
                    .init();
            }
        }
    } else {
        // Normal mode: minimal logging to stderr
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs, command: &Commands) {
    // Global CLI flags override everything
    if let Some(color) = global.color {
        config.general.color = color;
    }
    if global.dry_run {
        config.general.dry_run = true;
    }
    if let Some(scale) = global.scale_factor {
        config.general.scale_factor = scale;
    }
    for flag in &global.debug_flags {
        if !config.has_debug_flag(flag) {
            config.general.debug_flags.push(flag.clone());
        }
    }

    // Command-specific CLI flags
    if let Commands::Install {
        non_interactive,
        reboot,
        no_network,
        ssh_server,
        packages,
    } = command
    {
        if *non_interactive {
            config.general.interactive = false;
        }
        if *reboot {
            config.general.reboot = true;
        }
        if *no_network {
            config.network.has_network = false;
        }
        if *ssh_server {
            config.install.install_ssh_server = true;
        }
        config.install.packages.extend(packages.iter().cloned());
    }
}
