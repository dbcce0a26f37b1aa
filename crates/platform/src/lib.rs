#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Platform abstraction layer for the installer.
//!
//! This crate provides a unified interface for host interactions including:
//! - Process execution with event emission and a cancellable handle
//! - Journal subscriptions by syslog identifier, backed by `journalctl` or
//!   an in-memory bus for dry runs
//! - The system-wide install lock
//!
//! The platform abstraction integrates with the event system and error
//! handling patterns in the rest of the workspace.

pub mod core;
pub mod implementations;
pub mod journal;
pub mod lock;
pub mod process;
pub mod tty;

pub use core::{Platform, PlatformContext};
pub use implementations::linux::LinuxPlatform;
pub use journal::{EventReplay, Journal, JournalRecord, JournalSubscription, MemoryJournal};
pub use lock::{InstallLock, InstallLockGuard};

/// Re-export commonly used types
pub use process::{CommandOutput, PlatformCommand, ProcessHandle, ProcessOperations};
