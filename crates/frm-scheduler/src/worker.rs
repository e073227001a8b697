//! The single background execution loop.
//!
//! One worker runs per started manager. It alternates between waiting for
//! the next due time (or a wake signal) and draining every due entry in
//! `(due, seq)` order. All `Task::run` invocations happen here, serially,
//! and always without the shared lock held so callers can register and
//! unregister concurrently with a run.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::manager::Inner;

pub(crate) struct Worker {
    inner: Arc<Inner>,
    token: CancellationToken,
}

impl Worker {
    pub(crate) fn new(inner: Arc<Inner>, token: CancellationToken) -> Self {
        Self { inner, token }
    }

    /// The worker loop: wait, drain due entries, repeat until cancelled.
    ///
    /// Wakes are advisory. Every iteration re-reads the true minimum due
    /// time under the lock, so spurious wakeups and stale sleep deadlines
    /// are harmless.
    pub(crate) async fn run(self) {
        debug!(manager = %self.inner.name, "worker started");
        loop {
            let next = self.inner.shared.lock().unwrap().queue.next_due();
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = self.inner.wake.notified() => {}
                _ = Self::wait_until(next) => {}
            }
            if self.token.is_cancelled() {
                break;
            }
            self.drain_due().await;
        }
        let pending = {
            let mut shared = self.inner.shared.lock().unwrap();
            // Drain was interrupted: unexecuted entries keep their slot in
            // the queue so a restarted worker sees them unchanged.
            while let Some(entry) = shared.batch.pop_front() {
                shared.queue.restore(entry);
            }
            shared.queue.len()
        };
        debug!(manager = %self.inner.name, pending, "worker exited");
    }

    /// Sleep until `due`, or forever when the queue is empty.
    async fn wait_until(due: Option<DateTime<Utc>>) {
        match due {
            Some(due) => {
                let delay = (due - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                tokio::time::sleep(delay).await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Extract every due entry and run them in ascending `(due, seq)` order.
    ///
    /// The in-flight task's identity is published under the same lock that
    /// removes it from the batch, so `unregister_task` always observes a
    /// task as pending, batched, running, or gone -- never in a gap between
    /// those states.
    async fn drain_due(&self) {
        let now = Utc::now();
        {
            let mut shared = self.inner.shared.lock().unwrap();
            let due = shared.queue.extract_due(now);
            if due.is_empty() {
                return;
            }
            debug!(manager = %self.inner.name, count = due.len(), "draining due tasks");
            shared.batch = due.into();
        }

        loop {
            let entry = {
                let mut shared = self.inner.shared.lock().unwrap();
                if self.token.is_cancelled() {
                    // Stop requested mid-drain: no further tasks execute.
                    return;
                }
                match shared.batch.pop_front() {
                    Some(entry) => {
                        shared.running = Some(entry.id());
                        entry
                    }
                    None => return,
                }
            };

            let name = entry.task.name().to_string();
            let started = Instant::now();
            debug!(manager = %self.inner.name, task = %name, "task started");

            // Run without the lock; a panic must not take the worker down
            // with it.
            let result = AssertUnwindSafe(entry.task.run(now)).catch_unwind().await;

            {
                let mut shared = self.inner.shared.lock().unwrap();
                shared.running = None;
                match result {
                    Ok(next_due) => {
                        shared.executions += 1;
                        debug!(
                            manager = %self.inner.name,
                            task = %name,
                            duration_ms = started.elapsed().as_millis() as u64,
                            rescheduled = next_due.is_some(),
                            "task completed"
                        );
                        if let Some(due) = next_due {
                            // Cannot collide: register rejects a task that
                            // is still running.
                            shared.queue.insert(entry.task.clone(), due);
                        }
                    }
                    Err(_) => {
                        shared.panics += 1;
                        error!(
                            manager = %self.inner.name,
                            task = %name,
                            "task panicked during run; dropping it"
                        );
                    }
                }
            }
            // Unblocks unregister calls waiting on the in-flight run.
            self.inner.run_done.notify_waiters();
        }
    }
}
