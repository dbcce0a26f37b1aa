//! Running the install tool and following its journal output

use std::path::Path;
use std::time::{Duration, Instant};

use serde_yml::Mapping;
use subi_config::fixed_paths;
use subi_errors::{Error, InstallError};
use subi_events::{AppEvent, EventEmitter, InstallEvent};
use subi_platform::journal::{MESSAGE, SYSLOG_IDENTIFIER};
use subi_platform::{
    tty, CommandOutput, EventReplay, InstallLock, Journal, JournalRecord, PlatformCommand,
};
use subi_types::ContextId;

use super::{lock, InstallProgressController, ProgressState};
use crate::curtin::{CurtinEvent, LogLine, TreeUpdate};

const DRAIN_POLLS: u32 = 50;
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

async fn write_config(path: &Path, config: &Mapping) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io_with_path(&e, parent))?;
    }
    let header = format!(
        "# Autogenerated by SUbiquity: {} UTC\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.6f")
    );
    let contents = format!("{header}{}", serde_yml::to_string(config)?);
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| {
            InstallError::WriteFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            }
            .into()
        })
}

impl InstallProgressController {
    pub(super) async fn unmount_target(&self) -> Result<(), Error> {
        let options = &self.inner.options;
        let target = &self.inner.model.target;
        let ctx = self.platform_context();

        self.inner
            .platform
            .run(&ctx, options.unmount_command(target), true)
            .await
            .map_err(|e| InstallError::UnmountFailed {
                target: target.display().to_string(),
                message: e.to_string(),
            })?;

        if !options.dry_run {
            tokio::fs::remove_dir_all(target)
                .await
                .map_err(|e| Error::io_with_path(&e, target))?;
        }
        Ok(())
    }

    /// Write the install tool configuration and note the files a crash
    /// report should carry
    async fn prepare_curtin_command(&self) -> Result<PlatformCommand, Error> {
        let options = &self.inner.options;
        let config_path = options.curtin_config_path();
        let config = self.inner.model.render(&options.event_syslog_identifier);
        write_config(&config_path, &config).await?;
        self.emit(AppEvent::Install(InstallEvent::ConfigWritten {
            path: config_path.clone(),
        }));

        let reporter = &self.inner.reporter;
        reporter.note_file("CurtinConfig", &config_path);
        reporter.note_file("CurtinLog", &options.curtin_log_path());
        reporter.note_file("CurtinErrors", Path::new(fixed_paths::CURTIN_ERROR_TARFILE));

        Ok(options.curtin_install_command())
    }

    pub(super) async fn curtin_install(&self, context: ContextId) -> Result<(), Error> {
        tracing::debug!("curtin_install");
        let options = &self.inner.options;
        lock(&self.inner.progress).curtin.register_root(context);

        let journal = &self.inner.journal;
        let mut log_lines = journal.listen(&[options.log_syslog_identifier.clone()])?;
        let mut events = journal.listen(&[options.event_syslog_identifier.clone()])?;

        let command = self.prepare_curtin_command().await?;
        tracing::debug!(command = %command.command_line(), "curtin install cmd");

        let install_lock = InstallLock::new(&options.lock_file);
        let mut guard = install_lock.exclusive().await?;
        let holder = tty::controlling_tty();
        guard.write_content(&holder)?;
        self.emit(AppEvent::Install(InstallEvent::LockAcquired {
            path: guard.path().to_path_buf(),
            holder,
        }));
        self.log_starting_install().await;

        let result = {
            let run = self.run_install_tool(command);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    result = &mut run => break result,
                    Some(record) = log_lines.recv() => self.on_log_record(&record),
                    Some(record) = events.recv() => self.on_event_record(&record),
                }
            }
        };

        // records published before the tool exited are still applied
        while let Some(record) = log_lines.try_recv() {
            self.on_log_record(&record);
        }
        while let Some(record) = events.try_recv() {
            self.on_event_record(&record);
        }
        log_lines.remove();
        events.remove();
        drop(guard);

        let output = result?;
        tracing::debug!(code = ?output.code(), "curtin_install completed");
        Ok(())
    }

    async fn log_starting_install(&self) {
        const TEXT: &str = "starting install";
        match &self.inner.journal {
            Journal::Memory(journal) => {
                journal.publish(
                    &JournalRecord::new()
                        .with_field(SYSLOG_IDENTIFIER, "subiquity")
                        .with_field(MESSAGE, TEXT),
                );
            }
            Journal::System(_) => {
                let mut cmd = PlatformCommand::new("logger");
                cmd.args(["--tag", "subiquity", TEXT]);
                let ctx = self.platform_context();
                if let Err(e) = self.inner.platform.run(&ctx, cmd, false).await {
                    tracing::warn!(error = %e, "cannot log install start to the journal");
                    self.emit_warning_with_context("cannot log install start to the journal", &e);
                }
            }
        }
    }

    /// The install tool itself, or in dry-run mode a stand-in command joined
    /// with a replay of recorded events
    async fn run_install_tool(&self, command: PlatformCommand) -> Result<CommandOutput, Error> {
        let options = &self.inner.options;
        let ctx = self.platform_context();
        let platform = &self.inner.platform;

        if !options.dry_run {
            return platform.run(&ctx, command, true).await;
        }

        let journal = self
            .inner
            .journal
            .as_memory()
            .ok_or(InstallError::ReplayUnavailable)?;
        let replay = EventReplay::new(
            options.replay_source(),
            options.event_syslog_identifier.as_str(),
            options.log_syslog_identifier.as_str(),
        )
        .scale_factor(options.scale_factor)
        .log_file(options.curtin_log_path());

        let (output, summary) = tokio::join!(platform.run(&ctx, command, true), replay.run(journal));
        let output = output?;
        let summary = summary?;
        if let Some(name) = summary.failures.first() {
            return Err(InstallError::ToolReportedFailure { name: name.clone() }.into());
        }
        Ok(output)
    }

    fn on_log_record(&self, record: &JournalRecord) {
        let line: LogLine = match record.decode() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed log record");
                return;
            }
        };
        lock(&self.inner.traceback).feed(&line.message);
        self.inner.sink.add_log_line(&line.message);
    }

    fn on_event_record(&self, record: &JournalRecord) {
        let event: CurtinEvent = match record.decode() {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed install tool event");
                return;
            }
        };

        let (update, shown_parent) = {
            let mut progress = lock(&self.inner.progress);
            let ProgressState { tree, curtin } = &mut *progress;
            let update = curtin.apply(&event, tree);
            let shown_parent = match &update {
                Some(TreeUpdate::Started { parent, .. }) if !tree.is_root(*parent) => Some(*parent),
                _ => None,
            };
            (update, shown_parent)
        };

        match update {
            Some(TreeUpdate::Started { id, description, .. }) => {
                self.inner.sink.event_start(id, shown_parent, &description);
            }
            Some(TreeUpdate::Finished { id, status }) => {
                self.inner.sink.event_finish(id, Some(status));
            }
            None => {}
        }
    }

    /// Give the view a bounded time to show every step as finished, then
    /// stop attaching events to the install tool context
    pub(super) async fn drain_curtin_events(&self) {
        let started = Instant::now();
        let mut polls = 0;
        while self.inner.sink.ongoing() && polls < DRAIN_POLLS {
            tokio::time::sleep(DRAIN_INTERVAL).await;
            polls += 1;
        }
        tracing::debug!(
            waited_ms = started.elapsed().as_millis(),
            polls,
            "waited for events to drain"
        );
        lock(&self.inner.progress).curtin.discard_root();
    }
}
