//! Linux process operations implementation
//!
//! Wraps tokio's process support with the platform abstraction layer, adding
//! event emission and a handle that can be waited on and terminated from
//! different tasks.

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use subi_errors::{Error, PlatformError};
use subi_events::{
    AppEvent, EventEmitter, EventSender, FailureContext, PlatformEvent, ProcessCommandDescriptor,
};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::core::PlatformContext;
use crate::process::{CommandOutput, PlatformCommand, ProcessHandle, ProcessOperations};

/// Linux implementation of process operations
pub struct LinuxProcessOperations;

impl LinuxProcessOperations {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinuxProcessOperations {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn emit_process_started<E: EventEmitter>(
    emitter: &E,
    descriptor: &ProcessCommandDescriptor,
    detached: bool,
) {
    emitter.emit(AppEvent::Platform(PlatformEvent::ProcessStarted {
        command: descriptor.clone(),
        detached,
    }));
}

fn emit_process_completed<E: EventEmitter>(
    emitter: &E,
    descriptor: &ProcessCommandDescriptor,
    output: &CommandOutput,
    duration: Duration,
) {
    emitter.emit(AppEvent::Platform(PlatformEvent::ProcessCompleted {
        command: descriptor.clone(),
        exit_code: output.code(),
        duration_ms: duration_to_millis(duration),
    }));
}

fn emit_process_failed<E: EventEmitter>(
    emitter: &E,
    descriptor: &ProcessCommandDescriptor,
    error: &PlatformError,
    duration: Duration,
) {
    emitter.emit(AppEvent::Platform(PlatformEvent::ProcessFailed {
        command: descriptor.clone(),
        failure: FailureContext::from_error(error),
        duration_ms: duration_to_millis(duration),
    }));
}

fn build_command(cmd: &PlatformCommand) -> Command {
    let mut command = Command::new(cmd.program());
    command.args(cmd.get_args());

    if let Some(dir) = cmd.get_current_dir() {
        command.current_dir(dir);
    }

    for (key, value) in cmd.get_env_vars() {
        command.env(key, value);
    }

    command.stdin(Stdio::null());
    command
}

fn execution_failed(cmd: &PlatformCommand, err: &std::io::Error) -> PlatformError {
    if err.kind() == std::io::ErrorKind::NotFound {
        PlatformError::CommandNotFound {
            command: cmd.program().to_string(),
        }
    } else {
        PlatformError::ProcessExecutionFailed {
            command: cmd.program().to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl ProcessOperations for LinuxProcessOperations {
    async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error> {
        let start = Instant::now();
        let descriptor = cmd.descriptor();
        tracing::debug!(command = %descriptor.command_line(), "running command");

        emit_process_started(ctx, &descriptor, false);

        let result: Result<CommandOutput, PlatformError> = async {
            let output = build_command(&cmd)
                .output()
                .await
                .map_err(|e| execution_failed(&cmd, &e))?;

            Ok(CommandOutput {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
        .await;

        let duration = start.elapsed();

        match &result {
            Ok(output) => emit_process_completed(ctx, &descriptor, output, duration),
            Err(e) => emit_process_failed(ctx, &descriptor, e, duration),
        }

        result.map_err(Error::from)
    }

    async fn spawn_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<Arc<dyn ProcessHandle>, Error> {
        let descriptor = cmd.descriptor();
        tracing::debug!(command = %descriptor.command_line(), "starting command");

        let child = build_command(&cmd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let err = execution_failed(&cmd, &e);
                emit_process_failed(ctx, &descriptor, &err, Duration::ZERO);
                err
            })?;

        emit_process_started(ctx, &descriptor, true);

        Ok(Arc::new(LinuxProcessHandle {
            pid: child.id(),
            exited: AtomicBool::new(false),
            child: Mutex::new(Some(child)),
            descriptor,
            started: Instant::now(),
            events: ctx.event_sender().cloned(),
        }))
    }
}

/// Handle to a child started by [`LinuxProcessOperations::spawn_command`]
///
/// Once the child has been reaped its pid may belong to another process,
/// so the handle stops reporting or signalling it.
pub struct LinuxProcessHandle {
    pid: Option<u32>,
    exited: AtomicBool,
    child: Mutex<Option<Child>>,
    descriptor: ProcessCommandDescriptor,
    started: Instant,
    events: Option<EventSender>,
}

impl EventEmitter for LinuxProcessHandle {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

#[async_trait]
impl ProcessHandle for LinuxProcessHandle {
    fn pid(&self) -> Option<u32> {
        if self.exited.load(Ordering::SeqCst) {
            None
        } else {
            self.pid
        }
    }

    async fn communicate(&self) -> Result<CommandOutput, Error> {
        let child = self.child.lock().await.take().ok_or_else(|| {
            Error::internal(format!(
                "output of `{}` was already collected",
                self.descriptor.command_line()
            ))
        })?;

        let result = child.wait_with_output().await;
        self.exited.store(true, Ordering::SeqCst);

        match result {
            Ok(output) => {
                let output = CommandOutput {
                    status: output.status,
                    stdout: output.stdout,
                    stderr: output.stderr,
                };
                emit_process_completed(self, &self.descriptor, &output, self.started.elapsed());
                Ok(output)
            }
            Err(e) => {
                let err = PlatformError::ProcessExecutionFailed {
                    command: self.descriptor.program.clone(),
                    message: e.to_string(),
                };
                emit_process_failed(self, &self.descriptor, &err, self.started.elapsed());
                Err(err.into())
            }
        }
    }

    fn terminate(&self) -> Result<(), Error> {
        let Some(pid) = self.pid() else {
            tracing::debug!(
                command = %self.descriptor.command_line(),
                "not signalling a process that already exited"
            );
            return Ok(());
        };
        let raw = i32::try_from(pid).map_err(|e| PlatformError::SignalFailed {
            pid,
            message: e.to_string(),
        })?;

        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            // already gone
            Ok(()) | Err(nix::errno::Errno::ESRCH) => {
                self.emit(AppEvent::Platform(PlatformEvent::ProcessTerminated { pid }));
                Ok(())
            }
            Err(errno) => Err(PlatformError::SignalFailed {
                pid,
                message: errno.to_string(),
            }
            .into()),
        }
    }
}
