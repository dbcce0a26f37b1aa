//! Platform-specific operation errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Errors that can occur while talking to the host system
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlatformError {
    #[error("process execution failed: {command} - {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("command `{command}` returned non-zero exit status {}", describe_exit(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("failed to signal process {pid}: {message}")]
    SignalFailed { pid: u32, message: String },

    #[error("lock operation failed on {path}: {message}")]
    LockFailed { path: String, message: String },

    #[error("journal subscription failed: {message}")]
    JournalUnavailable { message: String },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("permission denied: {operation} - {message}")]
    PermissionDenied { operation: String, message: String },
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "(killed by signal)".to_string(), |c| c.to_string())
}

impl UserFacingError for PlatformError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::CommandFailed { .. } => Some("See the installer log for the command output."),
            Self::LockFailed { .. } => {
                Some("Another install may be running on this machine; wait for it to finish.")
            }
            Self::JournalUnavailable { .. } => {
                Some("journalctl must be available to follow install progress.")
            }
            Self::PermissionDenied { .. } => Some("Run the installer as root."),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::ProcessExecutionFailed { .. } => "platform.process_failed",
            Self::CommandFailed { .. } => "platform.command_failed",
            Self::SignalFailed { .. } => "platform.signal_failed",
            Self::LockFailed { .. } => "platform.lock_failed",
            Self::JournalUnavailable { .. } => "platform.journal_unavailable",
            Self::CommandNotFound { .. } => "platform.command_not_found",
            Self::PermissionDenied { .. } => "platform.permission_denied",
        })
    }
}
