//! Installation pipeline error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstallError {
    #[error("installation failed: {message}")]
    Failed { message: String },

    #[error("failed to install package {package}: {message}")]
    PackageFailed { package: String, message: String },

    #[error("failed to unmount {target}: {message}")]
    UnmountFailed { target: String, message: String },

    #[error("cloud-init configuration failed: {message}")]
    CloudInitFailed { message: String },

    #[error("failed to write {path}: {message}")]
    WriteFailed { path: String, message: String },

    #[error("event replay failed: {message}")]
    ReplayFailed { message: String },

    #[error("install tool reported failure for {name}")]
    ToolReportedFailure { name: String },

    #[error("dry-run replay requires the in-memory journal")]
    ReplayUnavailable,

    #[error("no unattended upgrade run is active")]
    NoActiveUpgrade,

    #[error("background task failed: {message}")]
    TaskError { message: String },

    #[error("installation cancelled by user")]
    Cancelled,
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PackageFailed { .. } => {
                Some("Check the package name and the network connection of the target system.")
            }
            Self::UnmountFailed { .. } => {
                Some("A previous attempt left the target mounted; unmount it manually and restart.")
            }
            Self::ReplayFailed { .. } | Self::ReplayUnavailable => {
                Some("Check the canned event file used for dry-run replay.")
            }
            Self::ToolReportedFailure { .. } | Self::Failed { .. } => {
                Some("Review the crash report and the install log, then restart the install.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::PackageFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::Failed { .. } => "install.failed",
            Self::PackageFailed { .. } => "install.package_failed",
            Self::UnmountFailed { .. } => "install.unmount_failed",
            Self::CloudInitFailed { .. } => "install.cloud_init_failed",
            Self::WriteFailed { .. } => "install.write_failed",
            Self::ReplayFailed { .. } => "install.replay_failed",
            Self::ToolReportedFailure { .. } => "install.tool_failure",
            Self::ReplayUnavailable => "install.replay_unavailable",
            Self::NoActiveUpgrade => "install.no_active_upgrade",
            Self::TaskError { .. } => "install.task",
            Self::Cancelled => "install.cancelled",
        })
    }
}
