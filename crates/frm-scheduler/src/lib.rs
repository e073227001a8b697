//! Concurrent periodic-task scheduler for the file residency manager.
//!
//! FRM subsystems (admin, migration, staging, purge) periodically rescan
//! storage spaces and drive background maintenance. This crate is the engine
//! they share: a subsystem registers a [`Task`] to run at an absolute time,
//! the task reschedules itself after each run by returning its next due
//! time, and any thread can cancel it safely.
//!
//! # Design
//!
//! - A single worker executes all tasks serially in `(due time, sequence)`
//!   order; equal due times run in registration order.
//! - Registrations and cancellations may arrive from any thread while a
//!   task is mid-run; nothing is lost or duplicated.
//! - `unregister_task` is a crisp cancellation: once it returns, the task
//!   will never run again, even if it was executing when the call was made.
//! - Shutdown is cooperative via a `CancellationToken`: `stop` waits for
//!   the in-flight run to finish, never force-kills the worker.
//! - A panicking task is logged and dropped; unrelated tasks keep running.
//!
//! Diagnostics are emitted as [`tracing`] events; the embedding process
//! supplies the subscriber.
//!
//! # Example
//!
//! ```ignore
//! use frm_scheduler::{task_fn, TaskManager};
//! use chrono::Utc;
//!
//! let manager = TaskManager::named("purge");
//! manager.start().await?;
//!
//! // Rescan every ten minutes until the policy says otherwise.
//! let scan = task_fn("purge-scan", |now| async move {
//!     run_purge_scan().await;
//!     Some(now + chrono::Duration::minutes(10))
//! });
//! manager.register_task(scan.clone(), Utc::now())?;
//!
//! // Later, from any thread:
//! manager.unregister_task(&scan).await;
//! manager.stop().await?;
//! ```

mod error;
mod manager;
mod queue;
mod status;
mod task;
mod worker;

pub use error::SchedulerError;
pub use manager::{ManagerState, TaskManager};
pub use status::{PendingTask, SchedulerStatus};
pub use task::{interval_task, task_fn, FnTask, IntervalTask, Task};
