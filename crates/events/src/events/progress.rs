use serde::{Deserialize, Serialize};

use subi_types::{ContextId, Status};

/// Progress context events consumed by the progress screen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// A context was entered
    ContextStarted {
        id: ContextId,
        parent_id: Option<ContextId>,
        description: String,
    },

    /// A context was exited
    ContextFinished { id: ContextId, status: Option<Status> },

    /// Every open context should be shown as finished
    AllFinished { closed: usize },
}

impl ProgressEvent {
    /// Create a context started event
    pub fn started(
        id: ContextId,
        parent_id: Option<ContextId>,
        description: impl Into<String>,
    ) -> Self {
        Self::ContextStarted {
            id,
            parent_id,
            description: description.into(),
        }
    }

    /// Create a context finished event
    #[must_use]
    pub fn finished(id: ContextId, status: Option<Status>) -> Self {
        Self::ContextFinished { id, status }
    }
}
