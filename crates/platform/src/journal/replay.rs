use std::path::{Path, PathBuf};
use std::time::Duration;

use subi_errors::{Error, InstallError};
use tokio::io::AsyncWriteExt;

use super::{JournalRecord, MemoryJournal, SYSLOG_IDENTIFIER};

const TIMESTAMP: &str = "__REALTIME_TIMESTAMP";
const MAX_GAP: Duration = Duration::from_secs(1);

/// Replays a recorded install tool run into a [`MemoryJournal`].
///
/// The source is one journal record per line, as written by
/// `journalctl --output=json`. Records carrying `CURTIN_*` fields are
/// republished under the event identifier, everything else under the log
/// identifier. Gaps between records follow their realtime timestamps,
/// capped at one second and divided by the scale factor.
#[derive(Debug, Clone)]
pub struct EventReplay {
    source: PathBuf,
    event_identifier: String,
    log_identifier: String,
    scale_factor: f64,
    log_file: Option<PathBuf>,
}

/// What a replay published
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub published: usize,
    /// Names of steps that finished with a `FAIL` result
    pub failures: Vec<String>,
}

impl ReplaySummary {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

impl EventReplay {
    #[must_use]
    pub fn new(
        source: impl Into<PathBuf>,
        event_identifier: impl Into<String>,
        log_identifier: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            event_identifier: event_identifier.into(),
            log_identifier: log_identifier.into(),
            scale_factor: 1.0,
            log_file: None,
        }
    }

    /// Speed the replay up by `scale_factor`; values that are not finite
    /// and positive leave the original pacing in place
    #[must_use]
    pub fn scale_factor(mut self, scale_factor: f64) -> Self {
        if scale_factor.is_finite() && scale_factor > 0.0 {
            self.scale_factor = scale_factor;
        } else {
            tracing::warn!(scale_factor, "ignoring invalid replay scale factor");
            self.scale_factor = 1.0;
        }
        self
    }

    /// Also append every log message to this file
    #[must_use]
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    fn delay(&self, previous: Option<u64>, current: Option<u64>) -> Duration {
        let (Some(previous), Some(current)) = (previous, current) else {
            return Duration::ZERO;
        };
        let gap = Duration::from_micros(current.saturating_sub(previous)).min(MAX_GAP);
        gap.div_f64(self.scale_factor)
    }

    /// Publish every record, pacing them like the original run.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or contains a line that
    /// is not a journal record, or if the log file cannot be written.
    pub async fn run(&self, journal: &MemoryJournal) -> Result<ReplaySummary, Error> {
        let contents = tokio::fs::read_to_string(&self.source)
            .await
            .map_err(|e| InstallError::ReplayFailed {
                message: format!("{}: {e}", self.source.display()),
            })?;

        let mut log = match &self.log_file {
            Some(path) => Some(
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| Error::io_with_path(&e, path))?,
            ),
            None => None,
        };

        let mut summary = ReplaySummary::default();
        let mut previous = None;

        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut record =
                JournalRecord::from_json_line(line).map_err(|e| InstallError::ReplayFailed {
                    message: format!("{}:{}: {e}", self.source.display(), number + 1),
                })?;

            let timestamp = record.get(TIMESTAMP).and_then(|t| t.parse::<u64>().ok());
            let delay = self.delay(previous, timestamp);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if timestamp.is_some() {
                previous = timestamp;
            }

            let is_event = record.keys().any(|k| k.starts_with("CURTIN_"));
            if is_event {
                if record.get("CURTIN_EVENT_TYPE") == Some("finish")
                    && record.get("CURTIN_RESULT") == Some("FAIL")
                {
                    summary
                        .failures
                        .push(record.get("CURTIN_NAME").unwrap_or("???").to_string());
                }
                record.insert(SYSLOG_IDENTIFIER, self.event_identifier.as_str());
            } else {
                if let (Some(file), Some(message)) = (log.as_mut(), record.message()) {
                    file.write_all(format!("{message}\n").as_bytes()).await?;
                }
                record.insert(SYSLOG_IDENTIFIER, self.log_identifier.as_str());
            }

            journal.publish(&record);
            summary.published += 1;
        }

        if let Some(mut file) = log {
            file.flush().await?;
        }

        tracing::debug!(
            source = %self.source.display(),
            published = summary.published,
            failures = summary.failures.len(),
            "replay finished"
        );
        Ok(summary)
    }
}
