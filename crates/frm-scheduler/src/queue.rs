//! Time-ordered queue of pending task entries.
//!
//! Entries are ordered by `(due, seq)` ascending, so the minimum element is
//! always the next entry to become eligible. The sequence number is assigned
//! at insert time from a monotone counter and acts purely as a deterministic
//! tie-break: entries with equal due times run in registration order.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::status::PendingTask;
use crate::task::{Task, TaskId};

/// A pending (task, due-time, sequence) record.
pub(crate) struct Entry {
    pub(crate) task: Arc<dyn Task>,
    pub(crate) due: DateTime<Utc>,
    pub(crate) seq: u64,
}

impl Entry {
    pub(crate) fn id(&self) -> TaskId {
        TaskId::of(&self.task)
    }
}

// Ordering is by (due, seq) only; the task reference carries no order.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Min-ordered collection of pending entries with at most one entry per
/// task reference.
///
/// Backed by a binary heap keyed on `(due, seq)` plus a membership index
/// used to enforce the one-entry-per-task invariant. Removal by task is an
/// O(n) heap rebuild; cancellation is not a hot path.
pub(crate) struct WorkQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    index: HashSet<TaskId>,
    next_seq: u64,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            index: HashSet::new(),
            next_seq: 0,
        }
    }

    /// Insert a new entry for `task` due at `due`, assigning a fresh
    /// sequence number.
    ///
    /// Returns `false` (without inserting) if the task already has a
    /// pending entry.
    pub(crate) fn insert(&mut self, task: Arc<dyn Task>, due: DateTime<Utc>) -> bool {
        if !self.index.insert(TaskId::of(&task)) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { task, due, seq }));
        true
    }

    /// Put back an entry previously removed by [`extract_due`], keeping its
    /// original due time and sequence number.
    ///
    /// Used when a drain is interrupted by shutdown: unexecuted entries
    /// return to the queue untouched so a restarted worker still honors
    /// their order.
    ///
    /// [`extract_due`]: WorkQueue::extract_due
    pub(crate) fn restore(&mut self, entry: Entry) {
        if self.index.insert(entry.id()) {
            self.heap.push(Reverse(entry));
        }
    }

    /// Due time of the minimum entry, if any.
    pub(crate) fn next_due(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    /// Remove and return every entry with `due <= now`, in ascending
    /// `(due, seq)` order.
    pub(crate) fn extract_due(&mut self, now: DateTime<Utc>) -> Vec<Entry> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.due > now {
                break;
            }
            let Some(Reverse(entry)) = self.heap.pop() else {
                break;
            };
            self.index.remove(&entry.id());
            due.push(entry);
        }
        due
    }

    /// Remove the entry referencing `id`, if present.
    pub(crate) fn remove(&mut self, id: TaskId) -> bool {
        if !self.index.remove(&id) {
            return false;
        }
        let heap = std::mem::take(&mut self.heap);
        self.heap = heap
            .into_iter()
            .filter(|Reverse(entry)| entry.id() != id)
            .collect();
        true
    }

    pub(crate) fn contains(&self, id: TaskId) -> bool {
        self.index.contains(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Snapshot of all pending entries sorted by `(due, seq)`.
    pub(crate) fn pending(&self) -> Vec<PendingTask> {
        let mut pending: Vec<PendingTask> = self
            .heap
            .iter()
            .map(|Reverse(entry)| PendingTask {
                name: entry.task.name().to_string(),
                due_at: entry.due,
                seq: entry.seq,
            })
            .collect();
        pending.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.seq.cmp(&b.seq)));
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopTask;

    #[async_trait]
    impl Task for NoopTask {
        async fn run(&self, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
            None
        }
    }

    fn noop() -> Arc<dyn Task> {
        Arc::new(NoopTask)
    }

    #[test]
    fn test_extract_due_ascending_order() {
        let mut queue = WorkQueue::new();
        let now = Utc::now();

        queue.insert(noop(), now + chrono::Duration::seconds(30));
        queue.insert(noop(), now + chrono::Duration::seconds(10));
        queue.insert(noop(), now + chrono::Duration::seconds(20));

        let due = queue.extract_due(now + chrono::Duration::seconds(60));
        let times: Vec<_> = due.iter().map(|e| e.due).collect();
        assert_eq!(
            times,
            vec![
                now + chrono::Duration::seconds(10),
                now + chrono::Duration::seconds(20),
                now + chrono::Duration::seconds(30),
            ]
        );
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_equal_due_times_keep_insertion_order() {
        let mut queue = WorkQueue::new();
        let due = Utc::now();

        for _ in 0..4 {
            assert!(queue.insert(noop(), due));
        }

        let extracted = queue.extract_due(due);
        let seqs: Vec<_> = extracted.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_extract_due_leaves_future_entries() {
        let mut queue = WorkQueue::new();
        let now = Utc::now();

        queue.insert(noop(), now - chrono::Duration::seconds(5));
        queue.insert(noop(), now + chrono::Duration::seconds(5));

        let due = queue.extract_due(now);
        assert_eq!(due.len(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due(), Some(now + chrono::Duration::seconds(5)));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut queue = WorkQueue::new();
        let task = noop();
        let now = Utc::now();

        assert!(queue.insert(task.clone(), now));
        assert!(!queue.insert(task.clone(), now + chrono::Duration::seconds(1)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_by_task() {
        let mut queue = WorkQueue::new();
        let keep = noop();
        let gone = noop();
        let now = Utc::now();

        queue.insert(keep.clone(), now + chrono::Duration::seconds(1));
        queue.insert(gone.clone(), now + chrono::Duration::seconds(2));

        assert!(queue.remove(TaskId::of(&gone)));
        assert!(!queue.remove(TaskId::of(&gone)));
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(TaskId::of(&keep)));
        assert!(!queue.contains(TaskId::of(&gone)));
    }

    #[test]
    fn test_restore_keeps_due_and_seq() {
        let mut queue = WorkQueue::new();
        let now = Utc::now();

        queue.insert(noop(), now);
        queue.insert(noop(), now + chrono::Duration::seconds(1));

        let mut extracted = queue.extract_due(now);
        assert_eq!(extracted.len(), 1);
        let entry = extracted.remove(0);
        let (due, seq) = (entry.due, entry.seq);

        queue.restore(entry);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next_due(), Some(due));
        assert_eq!(queue.pending()[0].seq, seq);
    }

    #[test]
    fn test_pending_snapshot_sorted() {
        let mut queue = WorkQueue::new();
        let now = Utc::now();

        queue.insert(noop(), now + chrono::Duration::seconds(20));
        queue.insert(noop(), now + chrono::Duration::seconds(10));

        let pending = queue.pending();
        assert_eq!(pending.len(), 2);
        assert!(pending[0].due_at < pending[1].due_at);
    }
}
