use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use subi_types::{InstallState, ReportRef};

/// Install pipeline lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    /// The install moved to a new lifecycle state
    StateChanged {
        from: InstallState,
        to: InstallState,
    },

    /// The install tool configuration was written
    ConfigWritten { path: PathBuf },

    /// The install lock was taken for the given terminal
    LockAcquired { path: PathBuf, holder: String },

    /// A package is being installed into the target
    PackageInstalling { package: String },

    /// A crash report was written for a failure
    CrashReportCreated { report: ReportRef },

    /// The crash report viewer should be shown
    ErrorReportShown { report: ReportRef },

    /// The progress screen must be brought to the front
    ProgressScreenRequested,

    /// The user asked to reboot; any security update run is being stopped
    RebootRequested { cancelled_updates: bool },
}
