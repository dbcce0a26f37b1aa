#![warn(clippy::pedantic)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

//! Install progress orchestration for subi
//!
//! This crate drives an install from the user's confirmation to a finished
//! (or failed) system: it runs the install tool under the install lock,
//! turns its journal events into a tree of progress contexts, performs the
//! final configuration and the security update run, and produces a crash
//! report when anything fails.

pub mod context;
mod controller;
pub mod curtin;
pub mod model;
pub mod options;
pub mod report;
pub mod signal;
pub mod sink;
pub mod traceback;

pub use context::{ContextNode, ContextTree};
pub use controller::{
    ControllerBuilder, InstallOutcome, InstallProgressController, ERROR_STATUS_TEXT,
};
pub use curtin::{find_parent, CurtinEvent, CurtinEventTracker, CurtinEventType};
pub use model::{CloudInitFile, InstallModel};
pub use options::ControllerOptions;
pub use report::{ErrorReport, ErrorReporter, FileErrorReporter};
pub use signal::{wait_all, Signal};
pub use sink::{ProgressSink, ProgressView};
pub use traceback::TracebackExtractor;

// Re-export EventSender for callers wiring up a progress view
pub use subi_events::EventSender;
