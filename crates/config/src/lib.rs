#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for subi
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/subi/config.toml)
//! - Environment variables
//! - CLI flags

pub mod constants;
pub use constants as fixed_paths;

use serde::{Deserialize, Serialize};
use subi_errors::{ConfigError, Error};
use subi_types::ColorChoice;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub install: InstallConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Replace every external effect with scaled sleeps and canned data
    #[serde(default)]
    pub dry_run: bool,
    /// Divides every dry-run sleep
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    /// Whether a user is at the screen; autoinstall runs are not interactive
    #[serde(default = "default_interactive")]
    pub interactive: bool,
    /// Debug switches such as `install-fail`
    #[serde(default)]
    pub debug_flags: Vec<String>,
    /// Reboot without waiting for the user once the install finishes
    #[serde(default)]
    pub reboot: bool,
    #[serde(default)]
    pub color: ColorChoice,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub target: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub dry_run_dir: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
    pub crash_dir: Option<PathBuf>,
    pub replay_dir: Option<PathBuf>,
}

/// Install tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Interpreter used to run the install tool module
    #[serde(default = "default_python")]
    pub python: String,
    /// Syslog identifier that subprocess output is logged under
    pub log_syslog_identifier: Option<String>,
    /// Install `openssh-server` into the target
    #[serde(default)]
    pub install_ssh_server: bool,
    /// Extra packages installed after the base system
    #[serde(default)]
    pub packages: Vec<String>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_has_network")]
    pub has_network: bool,
}

// Default implementations

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            scale_factor: default_scale_factor(),
            interactive: default_interactive(),
            debug_flags: Vec::new(),
            reboot: false,
            color: ColorChoice::Auto,
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            log_syslog_identifier: None,
            install_ssh_server: false,
            packages: Vec::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            has_network: default_has_network(),
        }
    }
}

// Default value functions for serde
fn default_scale_factor() -> f64 {
    1.0
}

fn default_interactive() -> bool {
    true
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_has_network() -> bool {
    true
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("subi").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        tracing::debug!(path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // SUBI_DRY_RUN
        if let Ok(dry_run) = std::env::var("SUBI_DRY_RUN") {
            self.general.dry_run = parse_bool("SUBI_DRY_RUN", dry_run)?;
        }

        // SUBI_INTERACTIVE
        if let Ok(interactive) = std::env::var("SUBI_INTERACTIVE") {
            self.general.interactive = parse_bool("SUBI_INTERACTIVE", interactive)?;
        }

        // SUBI_SCALE_FACTOR
        if let Ok(scale) = std::env::var("SUBI_SCALE_FACTOR") {
            self.general.scale_factor = scale.parse().map_err(|_| ConfigError::InvalidValue {
                field: "SUBI_SCALE_FACTOR".to_string(),
                value: scale,
            })?;
        }

        // SUBI_DEBUG_FLAGS
        if let Ok(flags) = std::env::var("SUBI_DEBUG_FLAGS") {
            self.general.debug_flags = flags
                .split(',')
                .map(str::trim)
                .filter(|flag| !flag.is_empty())
                .map(str::to_string)
                .collect();
        }

        // SUBI_COLOR
        if let Ok(color) = std::env::var("SUBI_COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "SUBI_COLOR".to_string(),
                        value: color,
                    }
                    .into())
                }
            };
        }

        Ok(())
    }

    /// Check values that serde cannot constrain
    ///
    /// # Errors
    ///
    /// Returns an error if the scale factor is not a positive number.
    pub fn validate(&self) -> Result<(), Error> {
        let scale = self.general.scale_factor;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "general.scale_factor".to_string(),
                value: scale.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Whether a debug flag was switched on
    #[must_use]
    pub fn has_debug_flag(&self, flag: &str) -> bool {
        self.general.debug_flags.iter().any(|f| f == flag)
    }

    /// Directory for dry-run artifacts
    #[must_use]
    pub fn dry_run_dir(&self) -> PathBuf {
        self.paths
            .dry_run_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(fixed_paths::DRY_RUN_DIR))
    }

    /// Root of the running system; the dry-run directory in dry-run mode
    #[must_use]
    pub fn root(&self) -> PathBuf {
        match &self.paths.root {
            Some(root) => root.clone(),
            None if self.general.dry_run => self.dry_run_dir(),
            None => PathBuf::from("/"),
        }
    }

    /// Mount point of the system being installed
    #[must_use]
    pub fn target(&self) -> PathBuf {
        match &self.paths.target {
            Some(target) => target.clone(),
            None if self.general.dry_run => self.dry_run_dir().join("target"),
            None => PathBuf::from(fixed_paths::TARGET_DIR),
        }
    }

    /// Directory the install tool configuration is written to
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        match &self.paths.log_dir {
            Some(dir) => dir.clone(),
            None if self.general.dry_run => self.dry_run_dir(),
            None => PathBuf::from(fixed_paths::INSTALLER_LOG_DIR),
        }
    }

    /// System-wide install lock file
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        match &self.paths.lock_file {
            Some(path) => path.clone(),
            None if self.general.dry_run => self.dry_run_dir().join("run").join("installing"),
            None => PathBuf::from(fixed_paths::INSTALL_LOCK),
        }
    }

    /// Where crash reports are written
    #[must_use]
    pub fn crash_dir(&self) -> PathBuf {
        match &self.paths.crash_dir {
            Some(dir) => dir.clone(),
            None if self.general.dry_run => self.dry_run_dir().join("crash"),
            None => PathBuf::from(fixed_paths::CRASH_DIR),
        }
    }

    /// Directory holding canned install tool event streams
    #[must_use]
    pub fn replay_dir(&self) -> PathBuf {
        self.paths
            .replay_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(fixed_paths::REPLAY_DIR))
    }

    /// Syslog identifier for logged subprocess output
    #[must_use]
    pub fn log_syslog_identifier(&self) -> String {
        self.install
            .log_syslog_identifier
            .clone()
            .unwrap_or_else(|| format!("subiquity_log.{}", std::process::id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_relocates_paths() {
        let mut config = Config::default();
        config.general.dry_run = true;
        config.paths.dry_run_dir = Some(PathBuf::from("/tmp/dry"));

        assert_eq!(config.root(), PathBuf::from("/tmp/dry"));
        assert_eq!(config.target(), PathBuf::from("/tmp/dry/target"));
        assert_eq!(config.lock_file(), PathBuf::from("/tmp/dry/run/installing"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/dry"));
    }

    #[test]
    fn real_run_uses_fixed_paths() {
        let config = Config::default();
        assert_eq!(config.root(), PathBuf::from("/"));
        assert_eq!(config.target(), PathBuf::from("/target"));
        assert_eq!(config.log_dir(), PathBuf::from("/var/log/installer"));
        assert_eq!(config.lock_file(), PathBuf::from(fixed_paths::INSTALL_LOCK));
    }

    #[test]
    fn scale_factor_must_be_positive() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.general.scale_factor = 0.0;
        assert!(config.validate().is_err());
        config.general.scale_factor = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn syslog_identifier_defaults_to_pid() {
        let config = Config::default();
        assert_eq!(
            config.log_syslog_identifier(),
            format!("subiquity_log.{}", std::process::id())
        );
    }
}
