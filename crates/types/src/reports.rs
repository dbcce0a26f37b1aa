//! Crash report type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of problem a crash report describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReportKind {
    /// The install pipeline failed
    InstallFail,
    /// The UI itself crashed
    UiCrash,
    /// Anything else
    Unknown,
}

impl ErrorReportKind {
    /// Short human-readable label used in report titles
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::InstallFail => "Install failed",
            Self::UiCrash => "Installer crashed",
            Self::Unknown => "Unknown error",
        }
    }
}

/// Handle to a persisted crash report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRef {
    /// Report identifier
    pub id: Uuid,
    /// Where the report was written
    pub path: PathBuf,
    /// What the report is about
    pub kind: ErrorReportKind,
}
