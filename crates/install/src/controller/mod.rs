//! The install progress controller
//!
//! Drives one install from the first readiness wait to `DONE` or `ERROR`.
//! The pipeline runs as a single task; the reboot path can run concurrently
//! from another task and reaches the running security update through the
//! shared state.
//!
//! Shared state is guarded by `std::sync::Mutex`. Guards are always dropped
//! before the next `.await`.

mod curtin_phase;
mod postinstall;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use subi_errors::{Error, InstallError, UserFacingError};
use subi_events::{EventEmitter, EventSender};
use subi_platform::{Journal, Platform, PlatformContext, ProcessHandle};
use subi_types::{ContextId, ErrorReportKind, InstallState, ReportRef, Status, StatusKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::context::ContextTree;
use crate::curtin::CurtinEventTracker;
use crate::model::InstallModel;
use crate::options::ControllerOptions;
use crate::report::{ErrorReporter, FileErrorReporter};
use crate::signal::{wait_all, Signal};
use crate::sink::{ProgressSink, ProgressView};
use crate::traceback::TracebackExtractor;

/// Status banner shown when the install fails
pub const ERROR_STATUS_TEXT: &str = "An error has occurred";

/// How an install ended when it did not return an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Completed,
    /// The install failed and the user was shown the error
    Failed { report: Option<ReportRef> },
}

struct ProgressState {
    tree: ContextTree,
    curtin: CurtinEventTracker,
}

struct UnattendedUpgradesRun {
    handle: Arc<dyn ProcessHandle>,
    context: ContextId,
}

struct Inner {
    options: ControllerOptions,
    model: InstallModel,
    platform: Arc<Platform>,
    journal: Journal,
    sink: Arc<dyn ProgressSink>,
    reporter: Arc<dyn ErrorReporter>,
    event_sender: Option<EventSender>,
    state: watch::Sender<InstallState>,
    progress: Mutex<ProgressState>,
    traceback: Mutex<TracebackExtractor>,
    unattended_upgrades: Mutex<Option<UnattendedUpgradesRun>>,
    crash_report: Mutex<Option<ReportRef>>,
    reboot_clicked: Signal,
    reboot_on_exit: AtomicBool,
    task: Mutex<Option<JoinHandle<Result<InstallOutcome, Error>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the install pipeline; clones share one install
#[derive(Clone)]
pub struct InstallProgressController {
    inner: Arc<Inner>,
}

/// Builder for [`InstallProgressController`]
pub struct ControllerBuilder {
    options: ControllerOptions,
    model: InstallModel,
    platform: Option<Arc<Platform>>,
    journal: Option<Journal>,
    sink: Option<Arc<dyn ProgressSink>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    event_sender: Option<EventSender>,
}

impl ControllerBuilder {
    #[must_use]
    pub fn platform(mut self, platform: Arc<Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    #[must_use]
    pub fn journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    #[must_use]
    pub fn event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// Fill in defaults: the host platform, the system journal (in-memory
    /// for dry runs), an event-backed progress view and file crash reports.
    #[must_use]
    pub fn build(self) -> InstallProgressController {
        let options = self.options;
        let event_sender = self.event_sender;
        let journal = self.journal.unwrap_or_else(|| {
            if options.dry_run {
                Journal::memory()
            } else {
                Journal::system()
            }
        });
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(ProgressView::new(event_sender.clone())));
        let reporter = self.reporter.unwrap_or_else(|| {
            Arc::new(FileErrorReporter::new(
                options.crash_dir.clone(),
                event_sender.clone(),
            ))
        });
        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(Platform::current()));

        let reboot_clicked = Signal::new();
        if options.reboot {
            reboot_clicked.set();
        }
        let (state, _) = watch::channel(InstallState::NotStarted);

        InstallProgressController {
            inner: Arc::new(Inner {
                options,
                model: self.model,
                platform,
                journal,
                sink,
                reporter,
                event_sender,
                state,
                progress: Mutex::new(ProgressState {
                    tree: ContextTree::new(),
                    curtin: CurtinEventTracker::new(),
                }),
                traceback: Mutex::new(TracebackExtractor::new()),
                unattended_upgrades: Mutex::new(None),
                crash_report: Mutex::new(None),
                reboot_clicked,
                reboot_on_exit: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }
}

impl EventEmitter for InstallProgressController {
    fn event_sender(&self) -> Option<&EventSender> {
        self.inner.event_sender.as_ref()
    }
}

impl InstallProgressController {
    #[must_use]
    pub fn builder(options: ControllerOptions, model: InstallModel) -> ControllerBuilder {
        ControllerBuilder {
            options,
            model,
            platform: None,
            journal: None,
            sink: None,
            reporter: None,
            event_sender: None,
        }
    }

    /// Run the install on a background task
    pub fn start(&self) {
        let this = self.clone();
        let task = tokio::spawn(async move { this.install().await });
        *lock(&self.inner.task) = Some(task);
    }

    /// Wait for the task spawned by [`start`](Self::start)
    ///
    /// # Errors
    ///
    /// Returns the install error in non-interactive mode, or an error if the
    /// task was never started, was already awaited, or panicked.
    pub async fn wait_for_install(&self) -> Result<InstallOutcome, Error> {
        let task = lock(&self.inner.task).take();
        let Some(task) = task else {
            return Err(Error::internal("install task is not running"));
        };
        task.await.map_err(|e| InstallError::TaskError {
            message: e.to_string(),
        })?
    }

    /// Wait for an unattended install and reboot when the UI exits
    ///
    /// # Errors
    ///
    /// Returns an error if the install task fails.
    pub async fn apply_autoinstall_config(&self) -> Result<(), Error> {
        self.wait_for_install().await?;
        self.inner.reboot_on_exit.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn install_state(&self) -> InstallState {
        *self.inner.state.borrow()
    }

    /// Follow install state changes
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<InstallState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn model(&self) -> &InstallModel {
        &self.inner.model
    }

    #[must_use]
    pub fn options(&self) -> &ControllerOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.inner.journal
    }

    #[must_use]
    pub fn sink(&self) -> &Arc<dyn ProgressSink> {
        &self.inner.sink
    }

    /// Set once the user asked to reboot
    #[must_use]
    pub fn reboot_clicked(&self) -> &Signal {
        &self.inner.reboot_clicked
    }

    #[must_use]
    pub fn reboot_on_exit(&self) -> bool {
        self.inner.reboot_on_exit.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn crash_report(&self) -> Option<ReportRef> {
        lock(&self.inner.crash_report).clone()
    }

    /// Whether a security update run can currently be cancelled
    #[must_use]
    pub fn unattended_upgrades_running(&self) -> bool {
        lock(&self.inner.unattended_upgrades).is_some()
    }

    /// The captured traceback, empty when none was seen
    #[must_use]
    pub fn traceback(&self) -> String {
        lock(&self.inner.traceback).traceback()
    }

    /// Move to `state` if the lifecycle allows it; returns whether it moved
    fn update_state(&self, state: InstallState) -> bool {
        let mut previous = None;
        let moved = self.inner.state.send_if_modified(|current| {
            previous = Some(*current);
            if current.can_advance_to(state) {
                *current = state;
                true
            } else {
                false
            }
        });
        if moved {
            if let Some(from) = previous {
                tracing::info!(from = %from, to = %state, "install state changed");
            }
            self.inner.sink.update_for_state(state);
        } else if let Some(from) = previous {
            tracing::warn!(from = %from, to = %state, "refusing install state change");
        }
        moved
    }

    /// Move from `from` to `to`, unless the state moved on already
    fn advance_state(&self, from: InstallState, to: InstallState) -> bool {
        let advanced = self.inner.state.send_if_modified(|current| {
            if *current == from && current.can_advance_to(to) {
                *current = to;
                true
            } else {
                false
            }
        });
        if advanced {
            tracing::info!(from = %from, to = %to, "install state changed");
            self.inner.sink.update_for_state(to);
        }
        advanced
    }

    fn platform_context(&self) -> PlatformContext {
        self.inner.platform.create_context(self.inner.event_sender.clone())
    }

    /// Enter a new context; tree roots are not shown
    fn open_context(
        &self,
        parent: Option<ContextId>,
        name: &str,
        description: &str,
    ) -> Result<ContextId, Error> {
        let (id, shown_parent) = {
            let mut progress = lock(&self.inner.progress);
            let tree = &mut progress.tree;
            let id = match parent {
                Some(parent) => tree.child(parent, name, description)?,
                None => tree.root(name, description),
            };
            tree.enter(id)?;
            (id, parent.filter(|p| !tree.is_root(*p)))
        };
        if parent.is_some() {
            self.inner.sink.event_start(id, shown_parent, description);
        }
        Ok(id)
    }

    fn close_context(&self, id: ContextId, status: Status) {
        let (recorded, shown) = {
            let mut progress = lock(&self.inner.progress);
            let shown = !progress.tree.is_root(id);
            (progress.tree.exit(id, status), shown)
        };
        match recorded {
            Ok(status) if shown => self.inner.sink.event_finish(id, Some(status)),
            Ok(_) => {}
            Err(e) => tracing::warn!(context = %id, error = %e, "cannot close context"),
        }
    }

    /// Run `f` inside a child context of `parent`, closed with the outcome
    async fn in_context<T, F, Fut>(
        &self,
        parent: ContextId,
        name: &str,
        description: &str,
        f: F,
    ) -> Result<T, Error>
    where
        F: FnOnce(ContextId) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let id = self.open_context(Some(parent), name, description)?;
        let result = f(id).await;
        self.close_context(
            id,
            if result.is_ok() {
                Status::Ok
            } else {
                Status::Error
            },
        );
        result
    }

    /// Run the whole pipeline.
    ///
    /// # Errors
    ///
    /// In non-interactive mode a failure is returned after the error path
    /// ran. Interactive failures are reported as [`InstallOutcome::Failed`].
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        let root = self.open_context(None, "install", "")?;
        let result = self.run_pipeline(root).await;

        let outcome = match result {
            Ok(()) => Ok(InstallOutcome::Completed),
            Err(e) => {
                let report = self.curtin_error(&e).await;
                if self.inner.options.interactive {
                    Ok(InstallOutcome::Failed { report })
                } else {
                    Err(e)
                }
            }
        };
        self.close_context(
            root,
            if matches!(outcome, Ok(InstallOutcome::Completed)) {
                Status::Ok
            } else {
                Status::Error
            },
        );
        outcome
    }

    async fn run_pipeline(&self, root: ContextId) -> Result<(), Error> {
        let model = &self.inner.model;

        wait_all(&model.install_events).await;
        self.update_state(InstallState::NeedsConfirmation);

        model.confirmation.wait().await;
        self.update_state(InstallState::Running);

        if tokio::fs::try_exists(&model.target).await.unwrap_or(false) {
            self.in_context(root, "unmount_target", "umounting /target dir", |_| {
                self.unmount_target()
            })
            .await?;
        }

        self.in_context(root, "curtin_install", "installing system", |ctx| {
            self.curtin_install(ctx)
        })
        .await?;

        self.update_state(InstallState::PostWait);
        wait_all(&model.postinstall_events).await;

        self.drain_curtin_events().await;

        self.update_state(InstallState::PostRunning);
        self.in_context(root, "postinstall", "final system configuration", |ctx| {
            self.postinstall(ctx)
        })
        .await?;

        if model.has_network {
            self.update_state(InstallState::UuRunning);
            self.in_context(
                root,
                "run_unattended_upgrades",
                "downloading and installing security updates",
                |ctx| self.run_unattended_upgrades(ctx),
            )
            .await?;
        }

        self.update_state(InstallState::Done);
        Ok(())
    }

    /// The error path: report, close everything and switch to `ERROR`
    async fn curtin_error(&self, error: &Error) -> Option<ReportRef> {
        tracing::error!(error = %error, "install failed");
        self.emit_error_with_details("install failed", error.to_string());
        let sink = &self.inner.sink;
        sink.add_log_line(&format!("install failed: {}", error.user_message()));
        if let Some(hint) = error.user_hint() {
            sink.add_log_line(hint);
        }

        let mut context = BTreeMap::new();
        context.insert("Error".to_string(), error.to_string());
        let traceback = self.traceback();
        if !traceback.is_empty() {
            context.insert("Traceback".to_string(), traceback);
        }
        let report = self
            .inner
            .reporter
            .make_report(ErrorReportKind::InstallFail, "install failed", false, context)
            .await
            .map(|report| report.reference());
        lock(&self.inner.crash_report).clone_from(&report);

        sink.finish_all();
        sink.set_status(StatusKind::Error, ERROR_STATUS_TEXT);
        if !sink.is_showing() {
            sink.show();
        }
        self.update_state(InstallState::Error);
        if let Some(report) = &report {
            self.inner.reporter.show_report(report);
        }
        report
    }
}
