//! Controller settings and the commands each phase runs

use std::path::PathBuf;

use subi_config::{fixed_paths, Config};
use subi_platform::PlatformCommand;

/// Debug flag that replays a failing install in dry-run mode
pub const INSTALL_FAIL_FLAG: &str = "install-fail";

/// Text of the apt configuration used for the security update run
pub const UU_APT_CONF: &str = "\
# Config for the unattended-upgrades run to avoid failing on battery power or
# a metered connection.
Unattended-Upgrade::OnlyOnACPower \"false\";
Unattended-Upgrade::Skip-Updates-On-Metered-Connections \"true\";
";

/// Settings the install controller runs with
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub dry_run: bool,
    pub scale_factor: f64,
    pub interactive: bool,
    pub debug_flags: Vec<String>,
    /// Reboot without waiting once the install is done
    pub reboot: bool,
    pub python: String,
    pub root: PathBuf,
    pub log_dir: PathBuf,
    pub lock_file: PathBuf,
    pub crash_dir: PathBuf,
    pub replay_dir: PathBuf,
    /// Identifier subprocess output is logged under
    pub log_syslog_identifier: String,
    /// Identifier the install tool reports structured events under
    pub event_syslog_identifier: String,
}

impl ControllerOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            dry_run: config.general.dry_run,
            scale_factor: config.general.scale_factor,
            interactive: config.general.interactive,
            debug_flags: config.general.debug_flags.clone(),
            reboot: config.general.reboot,
            python: config.install.python.clone(),
            root: config.root(),
            log_dir: config.log_dir(),
            lock_file: config.lock_file(),
            crash_dir: config.crash_dir(),
            replay_dir: config.replay_dir(),
            log_syslog_identifier: config.log_syslog_identifier(),
            event_syslog_identifier: format!("curtin_event.{}", std::process::id()),
        }
    }

    #[must_use]
    pub fn has_debug_flag(&self, flag: &str) -> bool {
        self.debug_flags.iter().any(|f| f == flag)
    }

    /// Where the install tool configuration is written
    #[must_use]
    pub fn curtin_config_path(&self) -> PathBuf {
        self.log_dir.join(fixed_paths::CURTIN_CONFIG_FILE_NAME)
    }

    /// Where the install tool writes its own log
    #[must_use]
    pub fn curtin_log_path(&self) -> PathBuf {
        if self.dry_run {
            self.log_dir.join("install.log")
        } else {
            PathBuf::from(fixed_paths::CURTIN_INSTALL_LOG)
        }
    }

    /// Canned event stream replayed in dry-run mode
    #[must_use]
    pub fn replay_source(&self) -> PathBuf {
        let name = if self.has_debug_flag(INSTALL_FAIL_FLAG) {
            "curtin-events-fail.json"
        } else {
            "curtin-events.json"
        };
        self.replay_dir.join(name)
    }

    /// The autoinstall capture file
    #[must_use]
    pub fn autoinstall_path(&self) -> PathBuf {
        self.root.join(fixed_paths::AUTOINSTALL_USER_DATA)
    }

    fn scaled_sleep(&self, seconds: f64) -> PlatformCommand {
        let scale = if self.scale_factor.is_finite() && self.scale_factor > 0.0 {
            self.scale_factor
        } else {
            1.0
        };
        PlatformCommand::sleep(seconds / scale)
    }

    fn curtin(&self) -> PlatformCommand {
        let mut cmd = PlatformCommand::new(&self.python);
        cmd.args(["-m", "curtin"]);
        cmd
    }

    fn logged(&self, cmd: &PlatformCommand) -> PlatformCommand {
        PlatformCommand::logged(&self.log_syslog_identifier, cmd)
    }

    /// Unmount a target left behind by an earlier attempt
    #[must_use]
    pub fn unmount_command(&self, target: &std::path::Path) -> PlatformCommand {
        if self.dry_run {
            return self.scaled_sleep(0.2);
        }
        let mut cmd = self.curtin();
        cmd.args(["unmount", "-t"]).arg(target.display().to_string());
        cmd
    }

    /// The install tool run; in dry-run mode a stand-in that runs beside the replay
    #[must_use]
    pub fn curtin_install_command(&self) -> PlatformCommand {
        if self.dry_run {
            return self.logged(&self.scaled_sleep(1.0));
        }
        let mut cmd = self.curtin();
        cmd.args(["--showtrace", "-c"])
            .arg(self.curtin_config_path().display().to_string())
            .arg("install");
        self.logged(&cmd)
    }

    #[must_use]
    pub fn install_package_command(&self, package: &str) -> PlatformCommand {
        if self.dry_run {
            return self.logged(&self.scaled_sleep(2.0));
        }
        let mut cmd = self.curtin();
        cmd.args(["system-install", "-t", fixed_paths::TARGET_DIR, "--", package]);
        self.logged(&cmd)
    }

    /// Undo the installer's apt configuration in the target
    #[must_use]
    pub fn restore_apt_commands(
        &self,
        target: &std::path::Path,
        has_network: bool,
    ) -> Vec<PlatformCommand> {
        if self.dry_run {
            return vec![self.logged(&self.scaled_sleep(1.0))];
        }
        let mut umount_apt = PlatformCommand::new("umount");
        umount_apt.arg(target.join("etc/apt").display().to_string());

        let second = if has_network {
            let mut update = self.curtin();
            update.args(["in-target", "-t", fixed_paths::TARGET_DIR, "--", "apt-get", "update"]);
            update
        } else {
            let mut umount_lists = PlatformCommand::new("umount");
            umount_lists.arg(target.join("var/lib/apt/lists").display().to_string());
            umount_lists
        };
        vec![self.logged(&umount_apt), self.logged(&second)]
    }

    /// The security update run, with `APT_CONFIG` relative to the target
    #[must_use]
    pub fn unattended_upgrades_command(&self, apt_config: &str) -> PlatformCommand {
        let mut cmd = if self.dry_run {
            self.scaled_sleep(5.0)
        } else {
            let mut cmd = self.curtin();
            cmd.args([
                "in-target",
                "-t",
                fixed_paths::TARGET_DIR,
                "--",
                "unattended-upgrades",
                "-v",
            ]);
            cmd
        };
        cmd.env("APT_CONFIG", apt_config);
        self.logged(&cmd)
    }

    #[must_use]
    pub fn stop_unattended_upgrades_command(&self) -> PlatformCommand {
        let mut cmd = PlatformCommand::new("chroot");
        cmd.args([
            fixed_paths::TARGET_DIR,
            fixed_paths::UNATTENDED_UPGRADE_SHUTDOWN,
            "--stop-only",
        ]);
        self.logged(&cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn options(dry_run: bool) -> ControllerOptions {
        let mut config = Config::default();
        config.general.dry_run = dry_run;
        config.general.scale_factor = 10.0;
        config.install.log_syslog_identifier = Some("log.1".to_string());
        config.paths.dry_run_dir = Some(PathBuf::from("/tmp/dry"));
        ControllerOptions::from_config(&config)
    }

    #[test]
    fn dry_run_sleeps_scale_down() {
        let opts = options(true);
        assert_eq!(opts.unmount_command(Path::new("/t")).command_line(), "sleep 0.02");
        assert_eq!(
            opts.install_package_command("vim").command_line(),
            "systemd-cat --level-prefix=false --identifier=log.1 sleep 0.2"
        );
        let restore = opts.restore_apt_commands(Path::new("/t"), true);
        assert_eq!(restore.len(), 1);
        assert!(restore[0].command_line().ends_with("sleep 0.1"));
        assert!(opts.curtin_install_command().command_line().ends_with("sleep 0.1"));
    }

    #[test]
    fn unusable_scale_factor_sleeps_in_real_time() {
        let mut opts = options(true);
        opts.scale_factor = 0.0;
        assert_eq!(opts.unmount_command(Path::new("/t")).command_line(), "sleep 0.2");
        opts.scale_factor = f64::NAN;
        assert_eq!(opts.unmount_command(Path::new("/t")).command_line(), "sleep 0.2");
    }

    #[test]
    fn real_commands_call_the_install_tool() {
        let opts = options(false);
        assert_eq!(
            opts.unmount_command(Path::new("/target")).command_line(),
            "python3 -m curtin unmount -t /target"
        );
        assert_eq!(
            opts.curtin_install_command().command_line(),
            "systemd-cat --level-prefix=false --identifier=log.1 python3 -m curtin --showtrace -c /var/log/installer/subiquity-curtin-install.conf install"
        );
        assert!(opts
            .install_package_command("openssh-server")
            .command_line()
            .ends_with("python3 -m curtin system-install -t /target -- openssh-server"));
    }

    #[test]
    fn apt_restore_depends_on_network() {
        let opts = options(false);
        let online: Vec<String> = opts
            .restore_apt_commands(Path::new("/target"), true)
            .iter()
            .map(PlatformCommand::command_line)
            .collect();
        assert!(online[0].ends_with("umount /target/etc/apt"));
        assert!(online[1].ends_with("curtin in-target -t /target -- apt-get update"));

        let offline = opts.restore_apt_commands(Path::new("/target"), false);
        assert!(offline[1]
            .command_line()
            .ends_with("umount /target/var/lib/apt/lists"));
    }

    #[test]
    fn unattended_upgrades_gets_target_relative_apt_config() {
        let opts = options(false);
        let cmd = opts.unattended_upgrades_command("/tmp/tmpabc");
        assert!(cmd
            .command_line()
            .ends_with("curtin in-target -t /target -- unattended-upgrades -v"));
        assert_eq!(
            cmd.get_env_vars(),
            &[("APT_CONFIG".to_string(), "/tmp/tmpabc".to_string())]
        );
    }

    #[test]
    fn failure_flag_selects_failing_replay() {
        let mut opts = options(true);
        assert!(opts.replay_source().ends_with("curtin-events.json"));
        opts.debug_flags.push(INSTALL_FAIL_FLAG.to_string());
        assert!(opts.replay_source().ends_with("curtin-events-fail.json"));
        assert_eq!(opts.curtin_log_path(), PathBuf::from("/tmp/dry/install.log"));
    }
}
