//! Shared harness for scheduler end-to-end tests.
//!
//! Provides [`RecordingTask`], a task implementation that records every
//! invocation time and delegates the reschedule decision to a closure over
//! the run count, mirroring how FRM subsystems decide their next scan time.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use frm_scheduler::Task;

/// Install a fmt subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// A [`Task`] that records each run time and asks a closure for the next
/// due time.
///
/// The closure receives the total number of runs so far (including the
/// current one) and the current time, and returns the next due time or
/// `None` to stop.
pub struct RecordingTask {
    name: String,
    runs: Mutex<Vec<DateTime<Utc>>>,
    next: Box<dyn Fn(usize, DateTime<Utc>) -> Option<DateTime<Utc>> + Send + Sync>,
}

impl RecordingTask {
    pub fn new(
        name: impl Into<String>,
        next: impl Fn(usize, DateTime<Utc>) -> Option<DateTime<Utc>> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            runs: Mutex::new(Vec::new()),
            next: Box::new(next),
        })
    }

    /// A task that runs once and never reschedules.
    pub fn once(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, |_runs, _now| None)
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    /// Times at which the task ran, in execution order.
    pub fn run_times(&self) -> Vec<DateTime<Utc>> {
        self.runs.lock().unwrap().clone()
    }

    /// The `Arc<dyn Task>` handle used to register and unregister this
    /// task. All handles from the same `RecordingTask` share one identity.
    pub fn as_task(self: &Arc<Self>) -> Arc<dyn Task> {
        self.clone()
    }
}

#[async_trait]
impl Task for RecordingTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let count = {
            let mut runs = self.runs.lock().unwrap();
            runs.push(now);
            runs.len()
        };
        (self.next)(count, now)
    }
}
