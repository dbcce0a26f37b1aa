//! Process execution operations

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use subi_errors::Error;
use subi_events::ProcessCommandDescriptor;

use crate::core::PlatformContext;

/// Platform-specific command builder and execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl PlatformCommand {
    /// Create a new platform command
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    /// A `sleep` standing in for real work in dry-run mode
    #[must_use]
    pub fn sleep(seconds: f64) -> Self {
        let mut cmd = Self::new("sleep");
        cmd.arg(seconds.to_string());
        cmd
    }

    /// Wrap `inner` so its output lands in the journal under `identifier`
    #[must_use]
    pub fn logged(identifier: &str, inner: &PlatformCommand) -> Self {
        let mut cmd = Self::new("systemd-cat");
        cmd.arg("--level-prefix=false")
            .arg(format!("--identifier={identifier}"))
            .arg(&inner.program)
            .args(&inner.args);
        cmd.env = inner.env.clone();
        cmd.current_dir.clone_from(&inner.current_dir);
        cmd
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Set an environment variable for the child
    pub fn env<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) -> &mut Self {
        self.env
            .push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: Into<PathBuf>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Get the program name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the arguments
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the extra environment variables
    #[must_use]
    pub fn get_env_vars(&self) -> &[(String, String)] {
        &self.env
    }

    /// Get the current directory
    #[must_use]
    pub fn get_current_dir(&self) -> Option<&PathBuf> {
        self.current_dir.as_ref()
    }

    /// Describe the command for events and logs
    #[must_use]
    pub fn descriptor(&self) -> ProcessCommandDescriptor {
        ProcessCommandDescriptor {
            program: self.program.clone(),
            args: self.args.clone(),
        }
    }

    /// The full command line, space separated
    #[must_use]
    pub fn command_line(&self) -> String {
        self.descriptor().command_line()
    }
}

/// Output from command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Exit code, `None` when the child died from a signal
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A child process started without waiting for it
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// OS process id, if the child is still known to the OS
    fn pid(&self) -> Option<u32>;

    /// Wait for the child to exit and collect its output.
    ///
    /// Only the first call observes the output; later calls fail.
    async fn communicate(&self) -> Result<CommandOutput, Error>;

    /// Ask the child to stop with SIGTERM; a no-op once it was reaped
    fn terminate(&self) -> Result<(), Error>;
}

/// Trait for process execution operations
#[async_trait]
pub trait ProcessOperations: Send + Sync {
    /// Execute a command and return the output
    async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error>;

    /// Start a command and hand back a handle to it
    async fn spawn_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<Arc<dyn ProcessHandle>, Error>;
}
