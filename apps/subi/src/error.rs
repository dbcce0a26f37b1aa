//! CLI error handling

use std::fmt;

use subi_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(subi_errors::ConfigError),
    /// Install or platform error
    Install(subi_errors::Error),
    /// The install failed and the error was shown
    InstallFailed { report: Option<std::path::PathBuf> },
    /// Network description could not be read
    Network(String),
    /// The user declined to start the install
    Declined,
    /// Interrupted before the install finished
    Interrupted,
    /// Invalid command arguments
    InvalidArguments(String),
    /// I/O error
    Io(std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::InvalidArguments(_) => 2,
            CliError::Interrupted => 130,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::Install(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::InstallFailed { report } => {
                write!(f, "The install failed")?;
                if let Some(path) = report {
                    write!(f, "\n  Crash report: {}", path.display())?;
                }
                Ok(())
            }
            CliError::Network(msg) => write!(f, "Network description error: {msg}"),
            CliError::Declined => write!(f, "Install cancelled; nothing was changed"),
            CliError::Interrupted => write!(f, "Interrupted before the install finished"),
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Install(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<subi_errors::ConfigError> for CliError {
    fn from(e: subi_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<subi_errors::Error> for CliError {
    fn from(e: subi_errors::Error) -> Self {
        match e {
            subi_errors::Error::Config(e) => CliError::Config(e),
            e => CliError::Install(e),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
