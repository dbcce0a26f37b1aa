//! Event handling and progress display

use std::collections::HashMap;
use std::path::PathBuf;

use console::{style, Term};
use subi_events::{AppEvent, EventMessage, GeneralEvent, InstallEvent, ProgressEvent};
use subi_types::{ContextId, InstallState, Status, StatusKind};

struct ShownContext {
    depth: usize,
    description: String,
}

/// Renders progress events as the install progress screen
pub struct EventHandler {
    term: Term,
    colors_enabled: bool,
    debug_enabled: bool,
    contexts: HashMap<ContextId, ShownContext>,
    state: InstallState,
    crash_report: Option<PathBuf>,
}

impl EventHandler {
    pub fn new(colors_enabled: bool, debug_enabled: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors_enabled,
            debug_enabled,
            contexts: HashMap::new(),
            state: InstallState::NotStarted,
            crash_report: None,
        }
    }

    /// Last state the pipeline reported
    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Path of the crash report, once one was written
    pub fn crash_report(&self) -> Option<&PathBuf> {
        self.crash_report.as_ref()
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        crate::logging::log_event_with_tracing(&message);

        match message.event {
            AppEvent::Progress(event) => self.handle_progress(event),
            AppEvent::Install(event) => self.handle_install(event),
            AppEvent::General(event) => self.handle_general(event),
            AppEvent::Platform(_) => {}
        }
    }

    fn handle_progress(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::ContextStarted {
                id,
                parent_id,
                description,
            } => {
                let depth = parent_id
                    .and_then(|parent| self.contexts.get(&parent))
                    .map_or(0, |parent| parent.depth + 1);
                self.line(&format!("{}{description}...", "  ".repeat(depth)));
                self.contexts.insert(id, ShownContext { depth, description });
            }
            ProgressEvent::ContextFinished { id, status } => {
                if let Some(context) = self.contexts.get(&id) {
                    let line = format!(
                        "{}{}: {}",
                        "  ".repeat(context.depth),
                        context.description,
                        self.format_status(status)
                    );
                    self.line(&line);
                }
            }
            ProgressEvent::AllFinished { closed } => {
                if self.debug_enabled && closed > 0 {
                    self.line(&format!("closed {closed} unfinished steps"));
                }
            }
        }
    }

    fn handle_install(&mut self, event: InstallEvent) {
        match event {
            InstallEvent::StateChanged { to, .. } => {
                self.state = to;
                if self.debug_enabled {
                    self.line(&self.dim(&format!("state: {to}")));
                }
            }
            InstallEvent::PackageInstalling { package } => {
                if self.debug_enabled {
                    self.line(&self.dim(&format!("installing package {package}")));
                }
            }
            InstallEvent::CrashReportCreated { report } => {
                self.crash_report = Some(report.path);
            }
            InstallEvent::ErrorReportShown { report } => {
                let text = format!("Crash report: {}", report.path.display());
                self.line(&self.error(&text));
            }
            InstallEvent::RebootRequested { cancelled_updates } => {
                if cancelled_updates {
                    self.line("Cancelling security updates before rebooting");
                } else {
                    self.line("Reboot requested");
                }
            }
            InstallEvent::LockAcquired { holder, .. } => {
                if self.debug_enabled {
                    self.line(&self.dim(&format!("install lock held by {holder}")));
                }
            }
            InstallEvent::ConfigWritten { .. } | InstallEvent::ProgressScreenRequested => {}
        }
    }

    fn handle_general(&mut self, event: GeneralEvent) {
        match event {
            GeneralEvent::LogLine { text } => self.line(&self.dim(&format!("| {text}"))),
            GeneralEvent::StatusChanged { kind, text } => {
                let banner = match kind {
                    StatusKind::Error => self.error(&text),
                    StatusKind::Info => self.bold(&text),
                };
                self.line(&banner);
            }
            GeneralEvent::Warning { message, context } => {
                let text = match context {
                    Some(context) => format!("Warning: {message} ({context})"),
                    None => format!("Warning: {message}"),
                };
                self.line(&self.warning(&text));
            }
            GeneralEvent::Error { message, details } => {
                self.line(&self.error(&format!("Error: {message}")));
                if let Some(details) = details {
                    self.line(&details);
                }
            }
            GeneralEvent::UserConfirmationRequired { .. }
            | GeneralEvent::UserConfirmationReceived { .. } => {}
        }
    }

    fn format_status(&self, status: Option<Status>) -> String {
        match status {
            None | Some(Status::Ok) => {
                if self.colors_enabled {
                    style("done").green().to_string()
                } else {
                    "done".to_string()
                }
            }
            Some(Status::Warn) => self.warning("warning"),
            Some(Status::Error) => self.error("failed"),
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.colors_enabled {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.colors_enabled {
            style(text).bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn warning(&self, text: &str) -> String {
        if self.colors_enabled {
            style(text).yellow().to_string()
        } else {
            text.to_string()
        }
    }

    fn error(&self, text: &str) -> String {
        if self.colors_enabled {
            style(text).red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn line(&self, text: &str) {
        if self.term.write_line(text).is_err() {
            eprintln!("{text}");
        }
    }
}
