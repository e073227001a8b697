//! Scheduler status snapshots for observability.
//!
//! A [`SchedulerStatus`] is a point-in-time export of the manager's state,
//! suitable for an admin surface to serialize as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manager::ManagerState;

/// A pending entry as seen by [`TaskManager::status`](crate::TaskManager::status).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTask {
    /// Task name as reported by [`Task::name`](crate::Task::name).
    pub name: String,
    /// Absolute time at which the entry becomes eligible to run.
    pub due_at: DateTime<Utc>,
    /// Registration sequence number (the tie-break for equal due times).
    pub seq: u64,
}

/// Point-in-time snapshot of a task manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Lifecycle state of the manager.
    pub state: ManagerState,
    /// Entries waiting to run, ascending by `(due_at, seq)`.
    pub pending: Vec<PendingTask>,
    /// Total number of completed task runs since construction.
    pub executions: u64,
    /// Number of runs that panicked (the task was dropped afterwards).
    pub panics: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes() {
        let status = SchedulerStatus {
            state: ManagerState::Running,
            pending: vec![PendingTask {
                name: "purge-scan".to_string(),
                due_at: Utc::now(),
                seq: 7,
            }],
            executions: 3,
            panics: 0,
        };

        let json = serde_json::to_string(&status).unwrap();
        let parsed: SchedulerStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.state, ManagerState::Running);
        assert_eq!(parsed.pending.len(), 1);
        assert_eq!(parsed.pending[0].name, "purge-scan");
        assert_eq!(parsed.executions, 3);
    }
}
