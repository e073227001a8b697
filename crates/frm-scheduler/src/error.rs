//! Error types for the scheduler crate.
//!
//! All variants are local, recoverable conditions returned to the caller.
//! Redundant lifecycle calls (double start, double stop) are expected caller
//! patterns and surface as errors here rather than panics.

use thiserror::Error;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The manager is already running; a second start is a no-op.
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// A mutation or stop was attempted while the manager is not running.
    #[error("scheduler is not running")]
    NotRunning,

    /// The task already has a pending entry; re-registering before the
    /// previous entry fires is rejected.
    #[error("task '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::AlreadyRunning;
        assert!(err.to_string().contains("already running"));

        let err = SchedulerError::NotRunning;
        assert!(err.to_string().contains("not running"));

        let err = SchedulerError::AlreadyRegistered("purge-scan".to_string());
        assert!(err.to_string().contains("purge-scan"));
    }
}
