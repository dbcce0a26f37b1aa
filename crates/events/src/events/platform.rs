//! Platform-specific operation events

use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Description of an executed command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessCommandDescriptor {
    /// Program being executed
    pub program: String,
    /// Command arguments
    pub args: Vec<String>,
}

impl ProcessCommandDescriptor {
    /// Render the command line for logs
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Platform operation events for tracking subprocess execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// Process execution started
    ProcessStarted {
        command: ProcessCommandDescriptor,
        /// Whether the caller awaits completion or keeps a handle
        detached: bool,
    },

    /// Process execution completed
    ProcessCompleted {
        command: ProcessCommandDescriptor,
        exit_code: Option<i32>,
        duration_ms: u64,
    },

    /// Process execution failed
    ProcessFailed {
        command: ProcessCommandDescriptor,
        failure: FailureContext,
        duration_ms: u64,
    },

    /// A running process was asked to terminate
    ProcessTerminated { pid: u32 },
}
