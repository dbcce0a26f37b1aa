#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in subi
//!
//! The install pipeline never prints. Everything it wants the user to see
//! (state transitions, progress contexts, log lines, status banners, crash
//! reports) travels as an [`AppEvent`] over an unbounded channel to whoever
//! renders the progress screen.
//!
//! ## Architecture
//!
//! - **Domain-driven events**: events grouped by functional domain
//! - **Unified `EventEmitter` trait**: one API for all event emissions
//! - **Metadata**: every emission is wrapped in an [`EventMessage`] carrying
//!   an id, timestamp, level and source for structured logging

pub mod meta;
pub use meta::{EventLevel, EventMessage, EventMeta, EventSource};

pub mod events;
pub use events::{
    AppEvent, FailureContext, GeneralEvent, InstallEvent, PlatformEvent,
    ProcessCommandDescriptor, ProgressEvent,
};

use std::fmt::Display;
use subi_types::{ContextId, InstallState, Status, StatusKind};
use tokio::sync::mpsc::UnboundedSender;

/// Type alias for the event sender
pub type EventSender = UnboundedSender<EventMessage>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout subi
///
/// This trait provides a single, consistent API for emitting events regardless of
/// whether you have a raw `EventSender` or a struct that contains one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(EventMessage::new(event));
        }
    }

    /// Emit a warning event carrying the error that caused it
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Display) {
        self.emit(AppEvent::General(GeneralEvent::warning(
            message,
            Some(context.to_string()),
        )));
    }

    /// Emit an error event with details
    fn emit_error_with_details(&self, message: impl Into<String>, details: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error_with_details(
            message, details,
        )));
    }

    /// Emit a line for the visible install log
    fn emit_log_line(&self, text: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::log_line(text)));
    }

    /// Emit a status banner change
    fn emit_status(&self, kind: StatusKind, text: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::StatusChanged {
            kind,
            text: text.into(),
        }));
    }

    /// Emit an install state transition
    fn emit_state_changed(&self, from: InstallState, to: InstallState) {
        self.emit(AppEvent::Install(InstallEvent::StateChanged { from, to }));
    }

    /// Emit a progress context started event
    fn emit_context_started(
        &self,
        id: ContextId,
        parent_id: Option<ContextId>,
        description: impl Into<String>,
    ) {
        self.emit(AppEvent::Progress(ProgressEvent::started(
            id,
            parent_id,
            description,
        )));
    }

    /// Emit a progress context finished event
    fn emit_context_finished(&self, id: ContextId, status: Option<Status>) {
        self.emit(AppEvent::Progress(ProgressEvent::finished(id, status)));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
/// This allows `EventSender` to be used directly where `EventEmitter` is expected
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_events_carry_metadata() {
        let (tx, mut rx) = channel();
        tx.emit_state_changed(InstallState::NotStarted, InstallState::NeedsConfirmation);
        tx.emit_log_line("curtin: partitioning");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.meta.source, EventSource::INSTALL);
        assert_eq!(first.meta.level, EventLevel::Info);
        assert!(matches!(
            first.event,
            AppEvent::Install(InstallEvent::StateChanged {
                to: InstallState::NeedsConfirmation,
                ..
            })
        ));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.meta.level, EventLevel::Debug);
        assert_ne!(first.meta.event_id, second.meta.event_id);
    }

    #[test]
    fn emitting_without_receiver_is_silent() {
        let (tx, rx) = channel();
        drop(rx);
        tx.emit_warning_with_context("nobody is listening", "receiver dropped");
    }

    #[tokio::test]
    async fn diagnostics_carry_their_cause() {
        let (tx, mut rx) = channel();
        tx.emit_warning_with_context("cannot remove the update apt config", "permission denied");
        tx.emit_error_with_details("install failed", "command `curtin` failed");

        let warning = rx.recv().await.unwrap();
        assert_eq!(warning.meta.level, EventLevel::Warn);
        assert!(matches!(
            warning.event,
            AppEvent::General(GeneralEvent::Warning { context: Some(ref c), .. }) if c == "permission denied"
        ));

        let error = rx.recv().await.unwrap();
        assert_eq!(error.meta.level, EventLevel::Error);
        assert!(matches!(
            error.event,
            AppEvent::General(GeneralEvent::Error { details: Some(_), .. })
        ));
    }

    #[test]
    fn error_state_logs_at_error_level() {
        let event = AppEvent::Install(InstallEvent::StateChanged {
            from: InstallState::Running,
            to: InstallState::Error,
        });
        assert_eq!(event.log_level(), tracing::Level::ERROR);
        assert_eq!(event.log_target(), "subi::events::install");
    }
}
