//! The task capability and ready-made task adapters.
//!
//! A [`Task`] is a unit of periodic work: the worker invokes [`Task::run`]
//! with the current time, and the return value tells the scheduler when to
//! run it next. Returning `None` means "never run this task again" and the
//! task is implicitly removed after the invocation.
//!
//! Tasks have no identity beyond the `Arc` they are registered through;
//! the same `Arc` (or a clone of it) must be passed to
//! [`TaskManager::unregister_task`](crate::TaskManager::unregister_task)
//! to cancel pending runs.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A unit of work that can be run and tells the scheduler when to run again.
///
/// Implementations are supplied by each subsystem (a periodic purge scan, a
/// migration poll, a log-rotation trigger); the scheduler core only invokes
/// them. `run` should return promptly relative to its scheduling interval:
/// the worker executes all tasks serially, so a long run delays every other
/// due task.
#[async_trait]
pub trait Task: Send + Sync {
    /// Human-readable name used in log events. Not required to be unique.
    fn name(&self) -> &str {
        "task"
    }

    /// Execute the task.
    ///
    /// `now` is the scheduler's notion of current time at the moment of
    /// invocation. Return `Some(t)` to become due again at absolute time
    /// `t` (a past `t` makes the task immediately eligible on the next
    /// worker iteration), or `None` to never run again.
    async fn run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Opaque task identity derived from the `Arc` data pointer.
///
/// Two `Arc`s compare equal here iff they point at the same task object,
/// which is the reference-equality contract cancellation relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TaskId(usize);

impl TaskId {
    pub(crate) fn of(task: &Arc<dyn Task>) -> Self {
        Self(Arc::as_ptr(task) as *const () as usize)
    }
}

/// A [`Task`] backed by an async closure.
///
/// Built with [`task_fn`]; the closure receives the current time and returns
/// the next due time directly, giving full control over the reschedule
/// policy.
pub struct FnTask<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(DateTime<Utc>) -> Fut + Send + Sync,
    Fut: Future<Output = Option<DateTime<Utc>>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        (self.f)(now).await
    }
}

/// Wrap an async closure as a registrable [`Task`].
///
/// # Example
///
/// ```ignore
/// let scan = task_fn("purge-scan", |now| async move {
///     run_purge_scan().await;
///     Some(now + chrono::Duration::minutes(10))
/// });
/// manager.register_task(scan.clone(), Utc::now())?;
/// ```
pub fn task_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Task>
where
    F: Fn(DateTime<Utc>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<DateTime<Utc>>> + Send + 'static,
{
    Arc::new(FnTask {
        name: name.into(),
        f,
    })
}

/// A [`Task`] that runs an async closure at a fixed interval, forever.
///
/// After each run the task becomes due again at `now + every`. Use
/// [`TaskManager::unregister_task`](crate::TaskManager::unregister_task) to
/// stop it.
pub struct IntervalTask<F> {
    name: String,
    every: chrono::Duration,
    f: F,
}

#[async_trait]
impl<F, Fut> Task for IntervalTask<F>
where
    F: Fn(DateTime<Utc>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        (self.f)(now).await;
        Some(now + self.every)
    }
}

/// Wrap an async closure as a task that repeats every `every`.
pub fn interval_task<F, Fut>(
    name: impl Into<String>,
    every: chrono::Duration,
    f: F,
) -> Arc<dyn Task>
where
    F: Fn(DateTime<Utc>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(IntervalTask {
        name: name.into(),
        every,
        f,
    })
}
