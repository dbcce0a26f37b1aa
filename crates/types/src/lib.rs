#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the subi installer
//!
//! This crate provides the value types shared by the pipeline, the
//! presentation layer and the CLI: install lifecycle states, progress
//! context identifiers and exit statuses, and crash report metadata.

pub mod reports;
pub mod state;

// Re-export commonly used types
pub use reports::{ErrorReportKind, ReportRef};
pub use state::InstallState;
pub use uuid::Uuid;

use serde::{Deserialize, Serialize};

/// Identifier of a progress context inside a context tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub usize);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Exit status of a progress context
///
/// Ordered from best to worst so that `max` yields the worst status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Warn,
    Error,
}

impl Status {
    /// Map an install tool result code to a status.
    ///
    /// The tool reports `SUCCESS`, `WARN` or `FAIL`. Anything else,
    /// including our own status names, maps to [`Status::Warn`].
    #[must_use]
    pub fn from_result_code(code: &str) -> Self {
        match code {
            "SUCCESS" => Self::Ok,
            "FAIL" => Self::Error,
            _ => Self::Warn,
        }
    }

    /// The worse of two statuses
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Style of the status banner shown above the progress log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Info,
    Error,
}

/// Color output control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when outputting to a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}
