use serde::{Deserialize, Serialize};

use crate::EventSource;
use subi_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Optional stable error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod general;
pub mod install;
pub mod platform;
pub mod progress;

pub use general::*;
pub use install::*;
pub use platform::*;
pub use progress::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (log lines, status, warnings, errors)
    General(GeneralEvent),

    /// Install pipeline lifecycle events
    Install(InstallEvent),

    /// Progress context tree events
    Progress(ProgressEvent),

    /// Subprocess execution events
    Platform(PlatformEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Install(_) => EventSource::INSTALL,
            Self::Progress(_) => EventSource::PROGRESS,
            Self::Platform(_) => EventSource::PLATFORM,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Platform(PlatformEvent::ProcessFailed { .. })
            | Self::Install(InstallEvent::CrashReportCreated { .. })
            | Self::General(GeneralEvent::StatusChanged {
                kind: subi_types::StatusKind::Error,
                ..
            }) => Level::ERROR,

            Self::Install(InstallEvent::StateChanged {
                to: subi_types::InstallState::Error,
                ..
            }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Platform(PlatformEvent::ProcessTerminated { .. }) => Level::WARN,

            Self::General(GeneralEvent::LogLine { .. })
            | Self::Progress(_)
            | Self::Platform(_) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "subi::events::general",
            Self::Install(_) => "subi::events::install",
            Self::Progress(_) => "subi::events::progress",
            Self::Platform(_) => "subi::events::platform",
        }
    }
}
