//! Editing sessions: one writer per project, with debounced auto-save.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crossbeam_channel::{select, Receiver, Sender};
use jod_thread::JoinHandle;
use thiserror::Error;

use crate::{
    files::FileService,
    node::ProjectId,
    projection::{project, Projection},
    reconcile::{CancelToken, ReconcileError, ReconcileReport, Reconciler},
    snapshot::DesiredSnapshot,
    store::StoreError,
};

/// How long the auto-saver waits after the last change before saving.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Manual,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(ReconcileReport),

    /// Another pass was already running for this session. Nothing was
    /// touched.
    Busy,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not load the stored project")]
    Load(#[from] StoreError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub reconciling: bool,
    pub has_completed_initial_sync: bool,
}

/// Marks a session as reconciling for as long as it's alive.
pub struct ReconcileGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for ReconcileGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().unwrap().reconciling = false;
    }
}

/// The editing session of one project.
///
/// At most one reconciliation pass runs per session at a time. Saves that
/// arrive while a pass is in flight report [`SaveOutcome::Busy`].
pub struct EditSession {
    files: Arc<FileService>,
    project_id: ProjectId,
    state: Mutex<SessionState>,
    cancel: CancelToken,
}

impl EditSession {
    pub fn new(files: Arc<FileService>, project_id: ProjectId) -> Self {
        Self {
            files,
            project_id,
            state: Mutex::new(SessionState::default()),
            cancel: CancelToken::new(),
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn files(&self) -> &Arc<FileService> {
        &self.files
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Tears the session down. A pass in flight stops at its next entry, and
    /// later saves, including auto-saves, start nothing.
    pub fn close(&self) {
        log::debug!("Closing the edit session of project {}", self.project_id);
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Claims the session for one pass, or returns `None` if a pass is
    /// already running.
    pub fn begin(&self) -> Option<ReconcileGuard<'_>> {
        let mut state = self.state.lock().unwrap();
        if state.reconciling {
            return None;
        }

        state.reconciling = true;
        Some(ReconcileGuard { state: &self.state })
    }

    pub fn save(
        &self,
        snapshot: &DesiredSnapshot,
        trigger: SaveTrigger,
    ) -> Result<SaveOutcome, SessionError> {
        let Some(guard) = self.begin() else {
            log::debug!("{:?} save skipped, a pass is already running", trigger);
            return Ok(SaveOutcome::Busy);
        };

        self.save_with_guard(guard, snapshot, trigger, &self.cancel)
            .map(SaveOutcome::Saved)
    }

    /// Runs one pass while holding the session, releasing it afterwards
    /// whether or not the pass succeeded.
    pub fn save_with_guard(
        &self,
        guard: ReconcileGuard<'_>,
        snapshot: &DesiredSnapshot,
        trigger: SaveTrigger,
        cancel: &CancelToken,
    ) -> Result<ReconcileReport, SessionError> {
        let started = Instant::now();
        let tree = self.files.load_tree(self.project_id)?;
        let report = Reconciler::new(&self.files)
            .with_cancel(cancel.clone())
            .reconcile(snapshot, &tree)?;

        log::info!(
            "{:?} save of project {} applied {} operation(s) in {:.2?}",
            trigger,
            self.project_id,
            report.operations.len(),
            started.elapsed()
        );

        drop(guard);
        Ok(report)
    }

    /// Pushes the editing surface's first snapshot into an empty project.
    ///
    /// Runs once per session. Projects that already have stored nodes are
    /// left alone. A failed sync may be retried.
    pub fn initial_sync(&self, snapshot: &DesiredSnapshot) -> Result<SaveOutcome, SessionError> {
        let guard = {
            let mut state = self.state.lock().unwrap();
            if state.has_completed_initial_sync {
                return Ok(SaveOutcome::Saved(ReconcileReport::default()));
            }
            if state.reconciling {
                return Ok(SaveOutcome::Busy);
            }

            state.has_completed_initial_sync = true;
            state.reconciling = true;
            ReconcileGuard { state: &self.state }
        };

        let result = self.run_initial_sync(guard, snapshot);
        if result.is_err() {
            self.state.lock().unwrap().has_completed_initial_sync = false;
        }

        result.map(SaveOutcome::Saved)
    }

    fn run_initial_sync(
        &self,
        guard: ReconcileGuard<'_>,
        snapshot: &DesiredSnapshot,
    ) -> Result<ReconcileReport, SessionError> {
        let tree = self.files.load_tree(self.project_id)?;
        if !tree.is_empty() {
            log::debug!(
                "Project {} already has {} stored node(s), skipping initial sync",
                self.project_id,
                tree.len()
            );
            return Ok(ReconcileReport::default());
        }

        log::info!("Running initial sync of project {}", self.project_id);
        self.save_with_guard(guard, snapshot, SaveTrigger::Auto, &self.cancel)
    }

    /// Reloads the stored project and builds the editor's view of it.
    pub fn projection(&self) -> Result<Projection, StoreError> {
        let tree = self.files.load_tree(self.project_id)?;
        Ok(project(&tree))
    }
}

/// Status updates published by an [`AutoSaver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveEvent {
    Started,
    Saved { operations: usize },

    /// The session was busy when the timer fired. The pending snapshot is
    /// kept and the timer restarted.
    Deferred,
    Failed { message: String },
}

/// Saves snapshots of an [`EditSession`] once edits have settled.
///
/// Every call to [`AutoSaver::update`] replaces the pending snapshot and
/// restarts the timer. Dropping the saver stops it; a pass in flight stops at
/// its next entry.
pub struct AutoSaver {
    update_sender: Sender<DesiredSnapshot>,
    event_receiver: Receiver<AutoSaveEvent>,

    /// Signaled on drop so the job thread leaves its loop.
    shutdown_sender: Sender<()>,
    cancel: CancelToken,

    /// Joined on drop.
    #[allow(unused)]
    job_thread: JoinHandle<()>,
}

impl AutoSaver {
    pub fn start(session: Arc<EditSession>, debounce: Duration) -> Self {
        let (update_sender, update_receiver) = crossbeam_channel::unbounded();
        let (event_sender, event_receiver) = crossbeam_channel::unbounded();
        let (shutdown_sender, shutdown_receiver) = crossbeam_channel::bounded(1);
        let cancel = CancelToken::new();

        let task = JobThreadContext {
            session,
            debounce,
            cancel: cancel.clone(),
            event_sender,
            pending: None,
            deadline: None,
        };

        let job_thread = jod_thread::Builder::new()
            .name("AutoSaver thread".to_owned())
            .spawn(move || task.run(update_receiver, shutdown_receiver))
            .expect("Could not start AutoSaver thread");

        Self {
            update_sender,
            event_receiver,
            shutdown_sender,
            cancel,
            job_thread,
        }
    }

    /// Queues the latest snapshot. Returns `false` if the saver has stopped.
    pub fn update(&self, snapshot: DesiredSnapshot) -> bool {
        self.update_sender.send(snapshot).is_ok()
    }

    pub fn events(&self) -> Receiver<AutoSaveEvent> {
        self.event_receiver.clone()
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.cancel.cancel();
        let _ = self.shutdown_sender.send(());
    }
}

struct JobThreadContext {
    session: Arc<EditSession>,
    debounce: Duration,
    cancel: CancelToken,
    event_sender: Sender<AutoSaveEvent>,

    /// The newest snapshot not saved yet.
    pending: Option<DesiredSnapshot>,
    deadline: Option<Instant>,
}

impl JobThreadContext {
    fn run(mut self, updates: Receiver<DesiredSnapshot>, shutdown: Receiver<()>) {
        log::trace!("AutoSaver thread started");

        loop {
            let timer = match self.deadline {
                Some(deadline) => crossbeam_channel::at(deadline),
                None => crossbeam_channel::never(),
            };

            select! {
                recv(updates) -> snapshot => match snapshot {
                    Ok(snapshot) => {
                        log::trace!("AutoSaver received a snapshot of {} entries", snapshot.len());
                        self.pending = Some(snapshot);
                        self.deadline = Some(Instant::now() + self.debounce);
                    }
                    Err(_) => return,
                },
                recv(shutdown) -> _ => {
                    log::trace!("AutoSaver shutdown signal received...");
                    return;
                },
                recv(timer) -> _ => self.fire(),
            }
        }
    }

    fn fire(&mut self) {
        self.deadline = None;
        let Some(snapshot) = self.pending.take() else {
            return;
        };

        if self.session.is_closed() {
            log::debug!("Session is closed, dropping auto-save");
            return;
        }

        let Some(guard) = self.session.begin() else {
            log::debug!("Session is busy, deferring auto-save");
            self.pending = Some(snapshot);
            self.deadline = Some(Instant::now() + self.debounce);
            self.publish(AutoSaveEvent::Deferred);
            return;
        };

        self.publish(AutoSaveEvent::Started);
        let result =
            self.session
                .save_with_guard(guard, &snapshot, SaveTrigger::Auto, &self.cancel);

        match result {
            Ok(report) => self.publish(AutoSaveEvent::Saved {
                operations: report.operations.len(),
            }),
            Err(err) => {
                log::warn!("Auto-save failed: {}", err);
                self.publish(AutoSaveEvent::Failed {
                    message: err.to_string(),
                });
            }
        }
    }

    fn publish(&self, event: AutoSaveEvent) {
        let _ = self.event_sender.send(event);
    }
}
