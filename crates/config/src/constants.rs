//! Fixed filesystem locations used by the installer
//!
//! These match what the install tool and the live session expect and are not
//! exposed through TOML configuration.

pub const TARGET_DIR: &str = "/target";
pub const INSTALLER_LOG_DIR: &str = "/var/log/installer";
pub const CRASH_DIR: &str = "/var/crash";
pub const INSTALL_LOCK: &str = "/run/subiquity/installing";

/// Log written by the install tool itself
pub const CURTIN_INSTALL_LOG: &str = "/var/log/curtin/install.log";
/// Tarball of logs the install tool leaves behind on failure
pub const CURTIN_ERROR_TARFILE: &str = "/var/log/curtin/curtin-error-logs.tar";

pub const CURTIN_CONFIG_FILE_NAME: &str = "subiquity-curtin-install.conf";
pub const AUTOINSTALL_USER_DATA: &str = "var/log/installer/autoinstall-user-data";

/// Working directory for dry-run artifacts, relative to the current directory
pub const DRY_RUN_DIR: &str = ".subiquity";
/// Directory holding canned install tool event streams for dry-run replay
pub const REPLAY_DIR: &str = "demos";

pub const UNATTENDED_UPGRADE_SHUTDOWN: &str =
    "/usr/share/unattended-upgrades/unattended-upgrade-shutdown";
