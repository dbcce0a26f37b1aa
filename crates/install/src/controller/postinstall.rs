//! Final configuration of the installed system and the security update run

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use subi_errors::{ContextError, Error, InstallError, PlatformError};
use subi_events::{AppEvent, EventEmitter, InstallEvent};
use subi_platform::ProcessHandle;
use subi_types::{ContextId, InstallState};

use super::{lock, InstallProgressController, UnattendedUpgradesRun};
use crate::model::{write_cloud_init, write_file};
use crate::options::UU_APT_CONF;

fn task_error(e: &tokio::task::JoinError) -> Error {
    InstallError::TaskError {
        message: e.to_string(),
    }
    .into()
}

impl InstallProgressController {
    pub(super) async fn postinstall(&self, context: ContextId) -> Result<(), Error> {
        self.write_autoinstall_capture().await?;

        self.in_context(
            context,
            "configure_cloud_init",
            "configuring cloud-init",
            |_| self.configure_cloud_init(),
        )
        .await?;

        for package in self.inner.model.packages_to_install() {
            let name = format!("install_{package}");
            let description = format!("installing {package}");
            self.in_context(context, &name, &description, |_| {
                self.install_package(package.clone())
            })
            .await?;
        }

        self.in_context(
            context,
            "restore_apt_config",
            "restoring apt configuration",
            |_| self.restore_apt_config(),
        )
        .await
    }

    async fn write_autoinstall_capture(&self) -> Result<(), Error> {
        let path = self.inner.options.autoinstall_path();
        let document = self.inner.model.autoinstall_document()?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_file(&target, &document, 0o600))
            .await
            .map_err(|e| task_error(&e))?
            .map_err(|e| InstallError::WriteFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!(path = %path.display(), "autoinstall answers captured");
        Ok(())
    }

    async fn configure_cloud_init(&self) -> Result<(), Error> {
        let files = self.inner.model.cloud_init_files()?;
        let target = self.inner.model.target.clone();
        tokio::task::spawn_blocking(move || write_cloud_init(&target, &files))
            .await
            .map_err(|e| task_error(&e))?
    }

    async fn install_package(&self, package: String) -> Result<(), Error> {
        self.emit(AppEvent::Install(InstallEvent::PackageInstalling {
            package: package.clone(),
        }));
        let ctx = self.platform_context();
        let command = self.inner.options.install_package_command(&package);
        match self.inner.platform.run(&ctx, command, true).await {
            Ok(_) => Ok(()),
            Err(Error::Platform(e @ PlatformError::CommandFailed { .. })) => {
                Err(InstallError::PackageFailed {
                    package,
                    message: e.to_string(),
                }
                .into())
            }
            Err(e) => Err(e),
        }
    }

    async fn restore_apt_config(&self) -> Result<(), Error> {
        let options = &self.inner.options;
        let model = &self.inner.model;
        let ctx = self.platform_context();
        for command in options.restore_apt_commands(&model.target, model.has_network) {
            self.inner.platform.run(&ctx, command, true).await?;
        }
        Ok(())
    }

    pub(super) async fn run_unattended_upgrades(&self, context: ContextId) -> Result<(), Error> {
        let target = &self.inner.model.target;
        let tmp_dir = target.join("tmp");
        tokio::fs::create_dir_all(&tmp_dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &tmp_dir))?;

        // removed on drop, whichever way the run ends
        let mut apt_config = tempfile::Builder::new()
            .prefix("tmp")
            .tempfile_in(&tmp_dir)
            .map_err(|e| Error::io_with_path(&e, &tmp_dir))?;
        apt_config
            .write_all(UU_APT_CONF.as_bytes())
            .map_err(|e| Error::io_with_path(&e, apt_config.path()))?;
        let relative = apt_config
            .path()
            .strip_prefix(target)
            .map_err(|e| Error::internal(format!("apt config outside the target: {e}")))?;
        let apt_config_in_target = format!("/{}", relative.display());

        let ctx = self.platform_context();
        let command = self
            .inner
            .options
            .unattended_upgrades_command(&apt_config_in_target);
        let handle = self.inner.platform.start(&ctx, command).await?;
        *lock(&self.inner.unattended_upgrades) = Some(UnattendedUpgradesRun {
            handle: Arc::clone(&handle),
            context,
        });

        // a cancelled run exits through its signal, which is not a failure
        let result = handle.communicate().await;
        *lock(&self.inner.unattended_upgrades) = None;
        if let Err(e) = apt_config.close() {
            tracing::warn!(error = %e, "cannot remove the update apt config");
            self.emit_warning_with_context("cannot remove the update apt config", &e);
        }

        let output = result?;
        tracing::debug!(code = ?output.code(), "unattended-upgrades finished");
        Ok(())
    }

    /// Handle the reboot button.
    ///
    /// A running security update is stopped first. The reboot request is
    /// recorded even when stopping it fails.
    ///
    /// # Errors
    ///
    /// Returns the error from stopping the security update.
    pub async fn click_reboot(&self) -> Result<(), Error> {
        let run = lock(&self.inner.unattended_upgrades)
            .as_ref()
            .map(|run| (Arc::clone(&run.handle), run.context));

        let cancelled = run.is_some();
        let result = match run {
            Some((handle, context)) => self.stop_unattended_upgrades(handle, context).await,
            None => Ok(()),
        };

        self.emit(AppEvent::Install(InstallEvent::RebootRequested {
            cancelled_updates: cancelled,
        }));
        self.inner.reboot_clicked.set();
        result
    }

    async fn stop_unattended_upgrades(
        &self,
        handle: Arc<dyn ProcessHandle>,
        uu_context: ContextId,
    ) -> Result<(), Error> {
        if !self.advance_state(InstallState::UuRunning, InstallState::UuCancelling) {
            tracing::debug!(state = %self.install_state(), "security update is not cancellable");
            return Ok(());
        }
        self.inner.sink.event_finish(uu_context, None);

        let parent = lock(&self.inner.progress)
            .tree
            .parent(uu_context)
            .ok_or(ContextError::Unknown { id: uu_context.0 })?;

        self.in_context(
            parent,
            "stop_unattended_upgrades",
            "cancelling update",
            |_| async move {
                if self.inner.options.dry_run {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    handle.terminate()
                } else {
                    let ctx = self.platform_context();
                    let command = self.inner.options.stop_unattended_upgrades_command();
                    self.inner.platform.run(&ctx, command, true).await.map(|_| ())
                }
            },
        )
        .await
    }
}
