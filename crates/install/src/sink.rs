//! The surface the pipeline reports progress to

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;
use subi_events::{AppEvent, EventEmitter, EventSender, InstallEvent, ProgressEvent};
use subi_types::{ContextId, InstallState, Status, StatusKind};

/// Receiver of everything the install pipeline wants to show
pub trait ProgressSink: Send + Sync {
    /// A context was entered
    fn event_start(&self, id: ContextId, parent: Option<ContextId>, description: &str);

    /// A context was exited, or is to be shown as such
    fn event_finish(&self, id: ContextId, status: Option<Status>);

    fn add_log_line(&self, line: &str);

    fn update_for_state(&self, state: InstallState);

    /// Show every open context as finished
    fn finish_all(&self);

    fn set_status(&self, kind: StatusKind, text: &str);

    /// Whether any context is still shown as running
    fn ongoing(&self) -> bool;

    fn is_showing(&self) -> bool;

    /// Bring the progress screen to the front
    fn show(&self);
}

/// Progress sink that tracks open contexts and forwards everything as events
pub struct ProgressView {
    open: DashMap<ContextId, String>,
    state: Mutex<InstallState>,
    showing: AtomicBool,
    event_sender: Option<EventSender>,
}

impl EventEmitter for ProgressView {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl ProgressView {
    #[must_use]
    pub fn new(event_sender: Option<EventSender>) -> Self {
        Self {
            open: DashMap::new(),
            state: Mutex::new(InstallState::NotStarted),
            showing: AtomicBool::new(false),
            event_sender,
        }
    }

    #[must_use]
    pub fn state(&self) -> InstallState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Descriptions of the contexts still shown as running
    #[must_use]
    pub fn open_contexts(&self) -> Vec<(ContextId, String)> {
        let mut open: Vec<_> = self
            .open
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        open.sort_by_key(|(id, _)| *id);
        open
    }
}

impl ProgressSink for ProgressView {
    fn event_start(&self, id: ContextId, parent: Option<ContextId>, description: &str) {
        self.open.insert(id, description.to_string());
        self.emit_context_started(id, parent, description);
    }

    fn event_finish(&self, id: ContextId, status: Option<Status>) {
        if self.open.remove(&id).is_some() {
            self.emit_context_finished(id, status);
        }
    }

    fn add_log_line(&self, line: &str) {
        self.emit_log_line(line);
    }

    fn update_for_state(&self, state: InstallState) {
        let from = {
            let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, state)
        };
        self.emit_state_changed(from, state);
    }

    fn finish_all(&self) {
        let ids: Vec<ContextId> = self.open.iter().map(|entry| *entry.key()).collect();
        for id in &ids {
            self.event_finish(*id, None);
        }
        self.emit(AppEvent::Progress(ProgressEvent::AllFinished { closed: ids.len() }));
    }

    fn set_status(&self, kind: StatusKind, text: &str) {
        self.emit_status(kind, text);
    }

    fn ongoing(&self) -> bool {
        !self.open.is_empty()
    }

    fn is_showing(&self) -> bool {
        self.showing.load(Ordering::SeqCst)
    }

    fn show(&self) {
        if !self.showing.swap(true, Ordering::SeqCst) {
            self.emit(AppEvent::Install(InstallEvent::ProgressScreenRequested));
        }
    }
}
