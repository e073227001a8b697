//! The task manager façade.
//!
//! `TaskManager` owns the ordered work queue and the worker, serializes all
//! access to them behind one lock, and exposes the public lifecycle
//! (`start`/`stop`) and mutation (`register_task`/`unregister_task`) API.
//! Any number of callers may use the façade concurrently with each other
//! and with the worker.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::queue::{Entry, WorkQueue};
use crate::status::{PendingTask, SchedulerStatus};
use crate::task::{Task, TaskId};
use crate::worker::Worker;
use crate::SchedulerError;

/// Lifecycle state of a [`TaskManager`].
///
/// `Stopping` is transient: it is observable only while a `stop` call is
/// waiting for the worker to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Stopped,
    Running,
    Stopping,
}

/// Everything guarded by the single shared lock.
pub(crate) struct Shared {
    pub(crate) state: ManagerState,
    pub(crate) queue: WorkQueue,
    /// Due entries extracted by the worker but not yet executed.
    pub(crate) batch: VecDeque<Entry>,
    /// Identity of the task whose `run` is currently in flight.
    pub(crate) running: Option<TaskId>,
    pub(crate) executions: u64,
    pub(crate) panics: u64,
}

pub(crate) struct Inner {
    pub(crate) name: String,
    pub(crate) shared: Mutex<Shared>,
    /// Wakes the worker so it recomputes its wait deadline.
    pub(crate) wake: Notify,
    /// Signaled after every completed `Task::run`; unblocks cancellers.
    pub(crate) run_done: Notify,
}

/// Concurrent periodic-task scheduler.
///
/// Exactly one worker executes all registered tasks, serially, in
/// `(due, seq)` order. Created stopped; `start` spawns the worker and
/// `stop` joins it. The manager holds non-owning `Arc` references to
/// tasks and never outlives-manages them: it only stops invoking a task
/// once it is unregistered or returns the stop sentinel.
pub struct TaskManager {
    inner: Arc<Inner>,
    worker: tokio::sync::Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl TaskManager {
    /// Create a stopped manager.
    pub fn new() -> Self {
        Self::named("scheduler")
    }

    /// Create a stopped manager that identifies itself as `name` in log
    /// events. Each subsystem (admin, migration, staging, purge) typically
    /// names its own manager.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                shared: Mutex::new(Shared {
                    state: ManagerState::Stopped,
                    queue: WorkQueue::new(),
                    batch: VecDeque::new(),
                    running: None,
                    executions: 0,
                    panics: 0,
                }),
                wake: Notify::new(),
                run_done: Notify::new(),
            }),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    /// Start the worker.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if the manager is not
    /// stopped; no second worker is spawned.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut slot = self.worker.lock().await;
        {
            let mut shared = self.inner.shared.lock().unwrap();
            if shared.state != ManagerState::Stopped {
                return Err(SchedulerError::AlreadyRunning);
            }
            shared.state = ManagerState::Running;
        }
        let token = CancellationToken::new();
        let handle = tokio::spawn(Worker::new(self.inner.clone(), token.clone()).run());
        *slot = Some((token, handle));
        info!(manager = %self.inner.name, "scheduler started");
        Ok(())
    }

    /// Stop the worker, waiting for any in-flight run to finish.
    ///
    /// Cancellation is cooperative and untimed: the call blocks until the
    /// worker has actually exited. Entries still pending at that point are
    /// not executed; they stay queued and run again after a restart.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] if the manager is stopped or
    /// another `stop` is already in progress.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let mut slot = self.worker.lock().await;
        {
            let mut shared = self.inner.shared.lock().unwrap();
            if shared.state != ManagerState::Running {
                return Err(SchedulerError::NotRunning);
            }
            shared.state = ManagerState::Stopping;
        }
        if let Some((token, handle)) = slot.take() {
            token.cancel();
            self.inner.wake.notify_one();
            if handle.await.is_err() {
                error!(manager = %self.inner.name, "worker aborted unexpectedly");
            }
        }
        self.inner.shared.lock().unwrap().state = ManagerState::Stopped;
        info!(manager = %self.inner.name, "scheduler stopped");
        Ok(())
    }

    /// Register `task` to run at absolute time `due`.
    ///
    /// The worker is woken only when the new entry becomes the minimum, so
    /// it never sleeps past a newly registered due time. A `due` in the
    /// past makes the task immediately eligible.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] unless the manager is
    /// running, and [`SchedulerError::AlreadyRegistered`] if the task is
    /// already pending, due, or currently executing.
    pub fn register_task(
        &self,
        task: Arc<dyn Task>,
        due: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let name = task.name().to_string();
        let id = TaskId::of(&task);
        let needs_wake = {
            let mut shared = self.inner.shared.lock().unwrap();
            if shared.state != ManagerState::Running {
                return Err(SchedulerError::NotRunning);
            }
            if shared.batch.iter().any(|entry| entry.id() == id)
                || shared.running == Some(id)
            {
                return Err(SchedulerError::AlreadyRegistered(name));
            }
            let previous_min = shared.queue.next_due();
            if !shared.queue.insert(task, due) {
                return Err(SchedulerError::AlreadyRegistered(name));
            }
            previous_min.map_or(true, |min| due < min)
        };
        debug!(manager = %self.inner.name, task = %name, due = %due, "task registered");
        if needs_wake {
            self.inner.wake.notify_one();
        }
        Ok(())
    }

    /// Cancel all future runs of `task`.
    ///
    /// Returns whether a pending entry was found and removed. If the task
    /// is mid-run when this is called, the call waits for that run to
    /// finish and removes any entry the run rescheduled, so after
    /// `unregister_task` returns the task is guaranteed never to run
    /// again.
    pub async fn unregister_task(&self, task: &Arc<dyn Task>) -> bool {
        let id = TaskId::of(task);
        loop {
            let notified = self.inner.run_done.notified();
            tokio::pin!(notified);
            {
                let mut shared = self.inner.shared.lock().unwrap();
                if shared.queue.remove(id) {
                    debug!(manager = %self.inner.name, task = %task.name(), "task unregistered");
                    return true;
                }
                if let Some(pos) = shared.batch.iter().position(|entry| entry.id() == id) {
                    shared.batch.remove(pos);
                    debug!(manager = %self.inner.name, task = %task.name(), "task unregistered");
                    return true;
                }
                if shared.running != Some(id) {
                    return false;
                }
                // Mid-run: arm the waiter while still holding the lock so
                // the completion signal cannot be missed, then wait and
                // re-check (the run may reschedule the task).
                notified.as_mut().enable();
            }
            notified.await;
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ManagerState {
        self.inner.shared.lock().unwrap().state
    }

    /// Whether the manager is running.
    pub fn is_running(&self) -> bool {
        self.state() == ManagerState::Running
    }

    /// Number of entries waiting to run (queued or due-but-not-started).
    pub fn pending_count(&self) -> usize {
        let shared = self.inner.shared.lock().unwrap();
        shared.queue.len() + shared.batch.len()
    }

    /// Point-in-time snapshot of state, pending entries, and run counters.
    pub fn status(&self) -> SchedulerStatus {
        let shared = self.inner.shared.lock().unwrap();
        let mut pending: Vec<PendingTask> = shared
            .batch
            .iter()
            .map(|entry| PendingTask {
                name: entry.task.name().to_string(),
                due_at: entry.due,
                seq: entry.seq,
            })
            .collect();
        pending.extend(shared.queue.pending());
        SchedulerStatus {
            state: shared.state,
            pending,
            executions: shared.executions,
            panics: shared.panics,
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
