//! Crash reports for failed installs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use subi_errors::{Error, InstallError};
use subi_events::{AppEvent, EventEmitter, EventSender, InstallEvent};
use subi_types::{ErrorReportKind, ReportRef, Uuid};

/// A crash report as persisted
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub id: Uuid,
    pub kind: ErrorReportKind,
    pub title: String,
    pub message: String,
    pub interrupt: bool,
    pub created: DateTime<Utc>,
    pub context: BTreeMap<String, String>,
    /// Files the report refers to, by role
    pub files: BTreeMap<String, PathBuf>,
    #[serde(skip)]
    pub path: PathBuf,
}

impl ErrorReport {
    #[must_use]
    pub fn reference(&self) -> ReportRef {
        ReportRef {
            id: self.id,
            path: self.path.clone(),
            kind: self.kind,
        }
    }
}

/// Creates and shows crash reports
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    /// Create a report; `None` when no report could be produced
    async fn make_report(
        &self,
        kind: ErrorReportKind,
        message: &str,
        interrupt: bool,
        context: BTreeMap<String, String>,
    ) -> Option<ErrorReport>;

    /// Ask the UI to show a report
    fn show_report(&self, report: &ReportRef);

    /// Remember a file to attach to later reports
    fn note_file(&self, key: &str, path: &Path);
}

/// Writes reports as JSON files into a crash directory
pub struct FileErrorReporter {
    dir: PathBuf,
    files: Mutex<BTreeMap<String, PathBuf>>,
    event_sender: Option<EventSender>,
}

impl EventEmitter for FileErrorReporter {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl FileErrorReporter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, event_sender: Option<EventSender>) -> Self {
        Self {
            dir: dir.into(),
            files: Mutex::new(BTreeMap::new()),
            event_sender,
        }
    }

    #[must_use]
    pub fn noted_files(&self) -> BTreeMap<String, PathBuf> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn write_report(dir: &Path, report: &ErrorReport) -> Result<(), Error> {
    std::fs::create_dir_all(dir).map_err(|e| Error::io_with_path(&e, dir))?;
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&report.path, json).map_err(|e| Error::io_with_path(&e, &report.path))
}

#[async_trait]
impl ErrorReporter for FileErrorReporter {
    async fn make_report(
        &self,
        kind: ErrorReportKind,
        message: &str,
        interrupt: bool,
        context: BTreeMap<String, String>,
    ) -> Option<ErrorReport> {
        let id = Uuid::new_v4();
        let report = ErrorReport {
            id,
            kind,
            title: kind.label().to_string(),
            message: message.to_string(),
            interrupt,
            created: Utc::now(),
            context,
            files: self.noted_files(),
            path: self.dir.join(format!("{id}.crash.json")),
        };

        let dir = self.dir.clone();
        let pending = report.clone();
        let written = match tokio::task::spawn_blocking(move || write_report(&dir, &pending)).await
        {
            Ok(result) => result,
            Err(e) => Err(InstallError::TaskError {
                message: e.to_string(),
            }
            .into()),
        };

        match written {
            Ok(()) => {
                tracing::info!(path = %report.path.display(), "crash report written");
                self.emit(AppEvent::Install(InstallEvent::CrashReportCreated {
                    report: report.reference(),
                }));
                Some(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to write crash report");
                None
            }
        }
    }

    fn show_report(&self, report: &ReportRef) {
        self.emit(AppEvent::Install(InstallEvent::ErrorReportShown {
            report: report.clone(),
        }));
    }

    fn note_file(&self, key: &str, path: &Path) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subi_events::channel;

    #[tokio::test]
    async fn report_is_written_with_noted_files() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = channel();
        let reporter = FileErrorReporter::new(dir.path().join("crash"), Some(tx));
        reporter.note_file("CurtinLog", Path::new("/var/log/curtin/install.log"));

        let mut context = BTreeMap::new();
        context.insert("Traceback".to_string(), "Traceback ...".to_string());
        let report = reporter
            .make_report(ErrorReportKind::InstallFail, "install failed", false, context)
            .await
            .unwrap();

        assert!(report.path.ends_with(format!("{}.crash.json", report.id)));
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report.path).unwrap()).unwrap();
        assert_eq!(written["kind"], "install_fail");
        assert_eq!(written["message"], "install failed");
        assert_eq!(written["context"]["Traceback"], "Traceback ...");
        assert_eq!(written["files"]["CurtinLog"], "/var/log/curtin/install.log");

        assert!(matches!(
            rx.recv().await.unwrap().event,
            AppEvent::Install(InstallEvent::CrashReportCreated { .. })
        ));
        reporter.show_report(&report.reference());
        assert!(matches!(
            rx.recv().await.unwrap().event,
            AppEvent::Install(InstallEvent::ErrorReportShown { .. })
        ));
    }

    #[tokio::test]
    async fn unwritable_directory_gives_no_report() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let reporter = FileErrorReporter::new(file.path().join("crash"), None);
        assert!(reporter
            .make_report(ErrorReportKind::InstallFail, "install failed", false, BTreeMap::new())
            .await
            .is_none());
    }
}
