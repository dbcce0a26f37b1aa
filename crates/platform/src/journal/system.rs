use std::process::Stdio;

use subi_errors::{Error, PlatformError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::{Detach, JournalRecord, JournalSubscription, SYSLOG_IDENTIFIER};

/// The host journal, read by following `journalctl`
#[derive(Debug, Clone)]
pub struct SystemJournal {
    journalctl: String,
}

impl Default for SystemJournal {
    fn default() -> Self {
        Self {
            journalctl: "journalctl".to_string(),
        }
    }
}

impl SystemJournal {
    /// Arguments that follow new records for `identifiers`.
    ///
    /// Repeated matches on the same field are alternatives to journalctl.
    #[must_use]
    pub fn follow_args(identifiers: &[String]) -> Vec<String> {
        let mut args = vec![
            "--follow".to_string(),
            "--output=json".to_string(),
            "--lines=0".to_string(),
        ];
        args.extend(
            identifiers
                .iter()
                .map(|id| format!("{SYSLOG_IDENTIFIER}={id}")),
        );
        args
    }

    pub(super) fn listen(&self, identifiers: &[String]) -> Result<JournalSubscription, Error> {
        let mut child = Command::new(&self.journalctl)
            .args(Self::follow_args(identifiers))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlatformError::JournalUnavailable {
                message: e.to_string(),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlatformError::JournalUnavailable {
                message: "journalctl stdout was not captured".to_string(),
            })?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            // dropping the child kills journalctl
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match JournalRecord::from_json_line(&line) {
                    Ok(record) => {
                        if sender.send(record).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "skipping unparseable journal line"),
                }
            }
        });

        Ok(JournalSubscription::new(
            identifiers.to_vec(),
            receiver,
            Detach::Task(task),
        ))
    }
}
