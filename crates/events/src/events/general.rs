use serde::{Deserialize, Serialize};

use subi_types::StatusKind;

/// General utility events for warnings, errors, log lines and status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    /// Something went wrong but the install carries on
    Warning {
        message: String,
        context: Option<String>,
    },

    /// The install failed; `details` holds the error chain
    Error {
        message: String,
        details: Option<String>,
    },

    /// A line for the visible install log
    LogLine { text: String },

    /// Status banner above the progress log changed
    StatusChanged { kind: StatusKind, text: String },

    /// User confirmation request for interactive operations
    UserConfirmationRequired { prompt: String },

    /// User confirmation response received
    UserConfirmationReceived { response: bool },
}

impl GeneralEvent {
    /// Create a warning event with context
    pub fn warning(message: impl Into<String>, context: Option<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context,
        }
    }

    /// Create an error event with details
    pub fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Create a visible log line event
    pub fn log_line(text: impl Into<String>) -> Self {
        Self::LogLine { text: text.into() }
    }
}
