//! Structured logging integration for events
//!
//! Every event that reaches the CLI is also written to the tracing
//! subscriber with structured fields, so a debug log file holds the full
//! install history even when the screen only showed part of it.

use subi_events::{
    AppEvent, EventMessage, GeneralEvent, InstallEvent, PlatformEvent, ProgressEvent,
};
use tracing::{debug, error, info, trace, warn};

/// Log an `AppEvent` using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    match &message.event {
        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    context = ?context,
                    "{message}"
                );
            }
            GeneralEvent::Error { message, details } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    details = ?details,
                    "{message}"
                );
            }
            GeneralEvent::LogLine { text } => {
                trace!(source = meta.source.as_str(), line = %text, "install log");
            }
            GeneralEvent::StatusChanged { kind, text } => {
                info!(source = meta.source.as_str(), kind = ?kind, "status: {text}");
            }
            GeneralEvent::UserConfirmationRequired { prompt } => {
                info!(source = meta.source.as_str(), prompt = %prompt, "Confirmation requested");
            }
            GeneralEvent::UserConfirmationReceived { response } => {
                info!(source = meta.source.as_str(), response, "Confirmation received");
            }
        },

        AppEvent::Install(event) => match event {
            InstallEvent::StateChanged { from, to } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    from = %from,
                    to = %to,
                    "Install state changed"
                );
            }
            InstallEvent::ConfigWritten { path } => {
                debug!(path = %path.display(), "Install tool configuration written");
            }
            InstallEvent::LockAcquired { path, holder } => {
                info!(path = %path.display(), holder = %holder, "Install lock acquired");
            }
            InstallEvent::PackageInstalling { package } => {
                info!(package = %package, "Installing package into target");
            }
            InstallEvent::CrashReportCreated { report } => {
                error!(
                    report_id = %report.id,
                    path = %report.path.display(),
                    kind = ?report.kind,
                    "Crash report created"
                );
            }
            InstallEvent::ErrorReportShown { report } => {
                info!(report_id = %report.id, "Crash report shown");
            }
            InstallEvent::ProgressScreenRequested => {
                debug!("Progress screen requested");
            }
            InstallEvent::RebootRequested { cancelled_updates } => {
                info!(cancelled_updates, "Reboot requested");
            }
        },

        AppEvent::Progress(event) => match event {
            ProgressEvent::ContextStarted {
                id,
                parent_id,
                description,
            } => {
                debug!(
                    context = %id,
                    parent = ?parent_id,
                    description = %description,
                    "Context started"
                );
            }
            ProgressEvent::ContextFinished { id, status } => {
                debug!(context = %id, status = ?status, "Context finished");
            }
            ProgressEvent::AllFinished { closed } => {
                debug!(closed, "All contexts finished");
            }
        },

        AppEvent::Platform(event) => match event {
            PlatformEvent::ProcessStarted { command, detached } => {
                debug!(
                    source = meta.source.as_str(),
                    program = %command.program,
                    command = %command.command_line(),
                    detached,
                    "Process started"
                );
            }
            PlatformEvent::ProcessCompleted {
                command,
                exit_code,
                duration_ms,
            } => {
                debug!(
                    program = %command.program,
                    exit_code = ?exit_code,
                    duration_ms,
                    "Process completed"
                );
            }
            PlatformEvent::ProcessFailed {
                command,
                failure,
                duration_ms,
            } => {
                warn!(
                    program = %command.program,
                    command = %command.command_line(),
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    duration_ms,
                    "Process failed"
                );
            }
            PlatformEvent::ProcessTerminated { pid } => {
                info!(pid, "Process terminated");
            }
        },
    }
}
