//! Install tool event records and the map from event names to contexts
//!
//! The install tool reports nested steps as `start`/`finish` pairs named by
//! slash-delimited paths such as `cmd-install/stage-partitioning`. Each start
//! becomes a child of the context registered under the longest known prefix
//! of its name.

use std::collections::HashMap;

use serde::Deserialize;
use subi_types::{ContextId, Status};

use crate::context::ContextTree;

fn unknown() -> String {
    "???".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurtinEventType {
    Start,
    Finish,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A structured event from the install tool
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CurtinEvent {
    #[serde(rename = "CURTIN_EVENT_TYPE", default)]
    pub event_type: CurtinEventType,
    #[serde(rename = "CURTIN_NAME", default = "unknown")]
    pub name: String,
    #[serde(rename = "CURTIN_MESSAGE", default = "unknown")]
    pub message: String,
    #[serde(rename = "CURTIN_RESULT", default = "unknown")]
    pub result: String,
}

impl CurtinEvent {
    #[must_use]
    pub fn start(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type: CurtinEventType::Start,
            name: name.into(),
            message: message.into(),
            result: unknown(),
        }
    }

    #[must_use]
    pub fn finish(name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            event_type: CurtinEventType::Finish,
            name: name.into(),
            message: unknown(),
            result: result.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status::from_result_code(&self.result)
    }
}

/// A free-form line from the install tool's log stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogLine {
    #[serde(rename = "MESSAGE", default)]
    pub message: String,
}

/// Find the context a new event named `name` belongs under.
///
/// Tries the full name, then ever shorter prefixes down to the empty string.
/// Returns the matching context and the remainder of the name.
#[must_use]
pub fn find_parent(name: &str, open: &HashMap<String, ContextId>) -> Option<(ContextId, String)> {
    let parts: Vec<&str> = name.split('/').collect();
    (0..=parts.len()).rev().find_map(|i| {
        let prefix = parts[..i].join("/");
        open.get(&prefix)
            .map(|&parent| (parent, parts[i..].join("/")))
    })
}

/// What applying an event did to the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeUpdate {
    Started {
        id: ContextId,
        parent: ContextId,
        description: String,
    },
    Finished {
        id: ContextId,
        status: Status,
    },
}

/// Open install tool steps, by event name
#[derive(Debug, Default)]
pub struct CurtinEventTracker {
    open: HashMap<String, ContextId>,
}

impl CurtinEventTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the context that top-level events attach to
    pub fn register_root(&mut self, id: ContextId) {
        self.open.insert(String::new(), id);
    }

    /// Forget the root registration
    pub fn discard_root(&mut self) -> Option<ContextId> {
        self.open.remove("")
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ContextId> {
        self.open.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Apply one event to `tree`.
    ///
    /// Starts with no registered prefix and finishes for unknown names are
    /// dropped and return `None`.
    pub fn apply(&mut self, event: &CurtinEvent, tree: &mut ContextTree) -> Option<TreeUpdate> {
        match event.event_type {
            CurtinEventType::Start => self.start(event, tree),
            CurtinEventType::Finish => self.finish(event, tree),
            CurtinEventType::Unknown => {
                tracing::debug!(name = %event.name, "ignoring event of unknown type");
                None
            }
        }
    }

    fn start(&mut self, event: &CurtinEvent, tree: &mut ContextTree) -> Option<TreeUpdate> {
        let Some((parent, suffix)) = find_parent(&event.name, &self.open) else {
            tracing::warn!(name = %event.name, "dropping start event with no known parent");
            return None;
        };
        let id = match tree.child(parent, &suffix, &event.message) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(name = %event.name, error = %e, "cannot open context");
                return None;
            }
        };
        self.open.insert(event.name.clone(), id);
        if let Err(e) = tree.enter(id) {
            tracing::warn!(name = %event.name, error = %e, "cannot enter context");
        }
        Some(TreeUpdate::Started {
            id,
            parent,
            description: event.message.clone(),
        })
    }

    fn finish(&mut self, event: &CurtinEvent, tree: &mut ContextTree) -> Option<TreeUpdate> {
        let id = self.open.remove(&event.name)?;
        match tree.exit(id, event.status()) {
            Ok(status) => Some(TreeUpdate::Finished { id, status }),
            Err(e) => {
                tracing::warn!(name = %event.name, error = %e, "cannot close context");
                None
            }
        }
    }
}
