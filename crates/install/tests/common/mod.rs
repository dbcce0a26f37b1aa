//! Fakes shared by the pipeline tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use subi_errors::Error;
use subi_events::EventReceiver;
use subi_install::{
    ControllerOptions, FileErrorReporter, InstallModel, InstallProgressController, ProgressSink,
    Signal,
};
use subi_platform::journal::{MESSAGE, SYSLOG_IDENTIFIER};
use subi_platform::{
    CommandOutput, Journal, JournalRecord, MemoryJournal, Platform, PlatformCommand,
    PlatformContext, ProcessHandle, ProcessOperations,
};
use subi_types::{ContextId, InstallState, Status, StatusKind};
use tempfile::TempDir;
use tokio::sync::Notify;

pub const LOG_ID: &str = "test-log";
pub const EVENT_ID: &str = "test-event";

pub fn exit_code(code: i32) -> CommandOutput {
    CommandOutput {
        status: ExitStatus::from_raw(code << 8),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

pub fn event(kind: &str, name: &str, extra: (&str, &str)) -> JournalRecord {
    JournalRecord::new()
        .with_field(SYSLOG_IDENTIFIER, EVENT_ID)
        .with_field("CURTIN_EVENT_TYPE", kind)
        .with_field("CURTIN_NAME", name)
        .with_field(extra.0, extra.1)
}

pub fn start(name: &str, message: &str) -> JournalRecord {
    event("start", name, ("CURTIN_MESSAGE", message))
}

pub fn finish(name: &str, result: &str) -> JournalRecord {
    event("finish", name, ("CURTIN_RESULT", result))
}

pub fn log_line(message: &str) -> JournalRecord {
    JournalRecord::new()
        .with_field(SYSLOG_IDENTIFIER, LOG_ID)
        .with_field(MESSAGE, message)
}

/// A started process that exits when released or terminated
pub struct FakeHandle {
    release: Notify,
    terminated: AtomicBool,
}

impl FakeHandle {
    fn new(hold: bool) -> Self {
        let handle = Self {
            release: Notify::new(),
            terminated: AtomicBool::new(false),
        };
        if !hold {
            handle.release.notify_one();
        }
        handle
    }

    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        None
    }

    async fn communicate(&self) -> Result<CommandOutput, Error> {
        self.release.notified().await;
        if self.was_terminated() {
            Ok(CommandOutput {
                status: ExitStatus::from_raw(15),
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        } else {
            Ok(exit_code(0))
        }
    }

    fn terminate(&self) -> Result<(), Error> {
        self.terminated.store(true, Ordering::SeqCst);
        self.release.notify_one();
        Ok(())
    }
}

/// Records every command and plays the install tool's journal output
pub struct FakeProcess {
    journal: MemoryJournal,
    commands: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
    install_records: Mutex<Vec<JournalRecord>>,
    hold_spawned: AtomicBool,
    spawned: Mutex<Vec<Arc<FakeHandle>>>,
}

impl FakeProcess {
    pub fn new(journal: MemoryJournal) -> Self {
        Self {
            journal,
            commands: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            install_records: Mutex::new(Vec::new()),
            hold_spawned: AtomicBool::new(false),
            spawned: Mutex::new(Vec::new()),
        }
    }

    /// Commands containing `pattern` exit with status 1
    pub fn fail_on(&self, pattern: &str) {
        *self.fail_on.lock().unwrap() = Some(pattern.to_string());
    }

    /// Records published while the install tool runs
    pub fn on_install(&self, records: Vec<JournalRecord>) {
        *self.install_records.lock().unwrap() = records;
    }

    /// Keep started processes running until terminated
    pub fn hold_spawned(&self) {
        self.hold_spawned.store(true, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.commands().iter().any(|c| c.contains(pattern))
    }

    pub fn spawned(&self) -> Vec<Arc<FakeHandle>> {
        self.spawned.lock().unwrap().clone()
    }
}

struct FakeOps(Arc<FakeProcess>);

#[async_trait]
impl ProcessOperations for FakeOps {
    async fn execute_command(
        &self,
        _ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error> {
        let fake = &self.0;
        let line = cmd.command_line();
        fake.commands.lock().unwrap().push(line.clone());

        if line.contains("--showtrace") {
            let records: Vec<_> = fake.install_records.lock().unwrap().drain(..).collect();
            for record in &records {
                fake.journal.publish(record);
            }
        }
        if line.contains("--stop-only") {
            for handle in fake.spawned() {
                handle.terminate()?;
            }
        }

        let failing = fake
            .fail_on
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|pattern| line.contains(pattern.as_str()));
        Ok(exit_code(i32::from(failing)))
    }

    async fn spawn_command(
        &self,
        _ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<Arc<dyn ProcessHandle>, Error> {
        let fake = &self.0;
        fake.commands.lock().unwrap().push(cmd.command_line());
        let handle = Arc::new(FakeHandle::new(fake.hold_spawned.load(Ordering::SeqCst)));
        fake.spawned.lock().unwrap().push(Arc::clone(&handle));
        Ok(handle)
    }
}

/// Remembers everything the pipeline showed
#[derive(Default)]
pub struct RecordingSink {
    open: Mutex<HashSet<ContextId>>,
    pub started: Mutex<Vec<(ContextId, Option<ContextId>, String)>>,
    pub finished: Mutex<Vec<(ContextId, Option<Status>)>>,
    pub lines: Mutex<Vec<String>>,
    pub states: Mutex<Vec<InstallState>>,
    pub status: Mutex<Option<(StatusKind, String)>>,
    showing: AtomicBool,
}

impl RecordingSink {
    pub fn states(&self) -> Vec<InstallState> {
        self.states.lock().unwrap().clone()
    }

    pub fn started_id(&self, description: &str) -> Option<ContextId> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .find(|(_, _, d)| d == description)
            .map(|(id, _, _)| *id)
    }

    pub fn started_entry(&self, description: &str) -> Option<(ContextId, Option<ContextId>)> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .find(|(_, _, d)| d == description)
            .map(|(id, parent, _)| (*id, *parent))
    }

    pub fn finish_of(&self, id: ContextId) -> Vec<Option<Status>> {
        self.finished
            .lock()
            .unwrap()
            .iter()
            .filter(|(finished, _)| *finished == id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.open.lock().unwrap().len()
    }
}

impl ProgressSink for RecordingSink {
    fn event_start(&self, id: ContextId, parent: Option<ContextId>, description: &str) {
        self.open.lock().unwrap().insert(id);
        self.started
            .lock()
            .unwrap()
            .push((id, parent, description.to_string()));
    }

    fn event_finish(&self, id: ContextId, status: Option<Status>) {
        self.open.lock().unwrap().remove(&id);
        self.finished.lock().unwrap().push((id, status));
    }

    fn add_log_line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn update_for_state(&self, state: InstallState) {
        self.states.lock().unwrap().push(state);
    }

    fn finish_all(&self) {
        let open: Vec<_> = self.open.lock().unwrap().drain().collect();
        let mut finished = self.finished.lock().unwrap();
        finished.extend(open.into_iter().map(|id| (id, None)));
    }

    fn set_status(&self, kind: StatusKind, text: &str) {
        *self.status.lock().unwrap() = Some((kind, text.to_string()));
    }

    fn ongoing(&self) -> bool {
        !self.open.lock().unwrap().is_empty()
    }

    fn is_showing(&self) -> bool {
        self.showing.load(Ordering::SeqCst)
    }

    fn show(&self) {
        self.showing.store(true, Ordering::SeqCst);
    }
}

pub fn options(dir: &Path, dry_run: bool) -> ControllerOptions {
    ControllerOptions {
        dry_run,
        scale_factor: 1000.0,
        interactive: true,
        debug_flags: Vec::new(),
        reboot: false,
        python: "python3".to_string(),
        root: dir.join("root"),
        log_dir: dir.join("log"),
        lock_file: dir.join("run").join("installing"),
        crash_dir: dir.join("crash"),
        replay_dir: dir.join("replay"),
        log_syslog_identifier: LOG_ID.to_string(),
        event_syslog_identifier: EVENT_ID.to_string(),
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub controller: InstallProgressController,
    pub process: Arc<FakeProcess>,
    pub sink: Arc<RecordingSink>,
    pub journal: MemoryJournal,
    pub events: EventReceiver,
}

/// A controller wired to fakes, with the confirmation already given
pub fn harness(
    dry_run: bool,
    configure: impl FnOnce(&Path, &mut ControllerOptions, &mut InstallModel),
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path(), dry_run);
    let mut model = InstallModel::new(dir.path().join("target"));
    model.confirmation = Signal::set_already();
    configure(dir.path(), &mut opts, &mut model);

    let journal = MemoryJournal::new();
    let process = Arc::new(FakeProcess::new(journal.clone()));
    let sink = Arc::new(RecordingSink::default());
    let reporter = Arc::new(FileErrorReporter::new(opts.crash_dir.clone(), None));
    let (sender, events) = subi_events::channel();

    let controller = InstallProgressController::builder(opts, model)
        .platform(Arc::new(Platform::new(Box::new(FakeOps(Arc::clone(&process))))))
        .journal(Journal::Memory(journal.clone()))
        .sink(sink.clone())
        .reporter(reporter)
        .event_sender(sender)
        .build();

    Harness {
        dir,
        controller,
        process,
        sink,
        journal,
        events,
    }
}
