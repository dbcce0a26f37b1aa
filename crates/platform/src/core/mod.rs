//! Core platform abstractions and context management

use std::sync::Arc;

use subi_errors::{Error, PlatformError};
use subi_events::{EventEmitter, EventSender};

use crate::process::{CommandOutput, PlatformCommand, ProcessHandle, ProcessOperations};

/// Context for platform operations, carrying where their events go
#[derive(Debug, Clone, Default)]
pub struct PlatformContext {
    event_sender: Option<EventSender>,
}

impl PlatformContext {
    /// Create a new platform context with event emission capabilities
    #[must_use]
    pub fn new(event_sender: Option<EventSender>) -> Self {
        Self { event_sender }
    }
}

impl EventEmitter for PlatformContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

/// Main platform abstraction providing access to all platform operations
pub struct Platform {
    process_ops: Box<dyn ProcessOperations>,
}

impl Platform {
    /// Create a new platform instance with the specified implementations
    #[must_use]
    pub fn new(process_ops: Box<dyn ProcessOperations>) -> Self {
        Self { process_ops }
    }

    /// Get the current platform
    #[must_use]
    pub fn current() -> Self {
        crate::implementations::linux::LinuxPlatform::new()
    }

    /// Access process operations
    #[must_use]
    pub fn process(&self) -> &dyn ProcessOperations {
        &*self.process_ops
    }

    /// Create a platform context with event emission
    #[must_use]
    pub fn create_context(&self, event_sender: Option<EventSender>) -> PlatformContext {
        PlatformContext::new(event_sender)
    }

    /// Run a command to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started, or if `check` is set
    /// and the command exits unsuccessfully.
    pub async fn run(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
        check: bool,
    ) -> Result<CommandOutput, Error> {
        let command = cmd.command_line();
        let output = self.process().execute_command(ctx, cmd).await?;
        if check {
            ensure_success(command, &output)?;
        }
        Ok(output)
    }

    /// Start a command without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started.
    pub async fn start(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<Arc<dyn ProcessHandle>, Error> {
        self.process().spawn_command(ctx, cmd).await
    }
}

/// Turn an unsuccessful exit into a `CommandFailed` error
///
/// # Errors
///
/// Returns `PlatformError::CommandFailed` when `output` is not a success.
pub fn ensure_success(command: String, output: &CommandOutput) -> Result<(), Error> {
    if output.success() {
        Ok(())
    } else {
        Err(PlatformError::CommandFailed {
            command,
            exit_code: output.code(),
        }
        .into())
    }
}
