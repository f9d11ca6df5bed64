// crates/server/src/dispatch.rs
//! Task dispatch: the repeat queue, the monotone cursor, and the progress
//! store. The three form one consistency region and live behind a single
//! lock in [`crate::state::ServerState`], so concurrent sessions always see
//! a coherent snapshot and no fresh number is handed out twice.

use std::collections::{HashSet, VecDeque};

use taskfleet_core::{JobNumber, ProgressStore, Task};
use tracing::debug;

use crate::config::JobSource;

#[derive(Debug)]
pub struct Dispatcher {
    progress: ProgressStore,
    /// Next candidate for fresh dispatch. Never rewinds; gap-filling goes
    /// through the repeat queue.
    cursor: JobNumber,
    repeat: VecDeque<Task>,
}

impl Dispatcher {
    pub fn new(progress: ProgressStore) -> Self {
        // First fresh candidate is the number right past the completed
        // prefix; `next_task` skips anything recorded above it.
        let cursor = (progress.floor() + 1).max(0) as JobNumber;
        Self {
            progress,
            cursor,
            repeat: VecDeque::new(),
        }
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Next task to hand out: queued repeats first, then the cursor.
    /// Never returns a number the store already contains.
    pub fn next_task(&mut self, get_job: &JobSource) -> Task {
        while let Some(task) = self.repeat.pop_front() {
            if !self.progress.contains(task.num) {
                return task;
            }
            debug!(num = task.num, "dropping queued repeat, already complete");
        }
        while self.progress.contains(self.cursor) {
            self.cursor += 1;
        }
        let task = Task::new(self.cursor, (get_job)(self.cursor));
        self.cursor += 1;
        task
    }

    /// Queue a task for re-dispatch unless its number is already queued.
    pub fn push_repeat(&mut self, task: Task) {
        if self.repeat.iter().any(|queued| queued.num == task.num) {
            return;
        }
        self.repeat.push_back(task);
    }

    /// Record a completed number. Idempotent.
    pub fn record(&mut self, num: JobNumber) {
        self.progress.add(num);
    }

    /// Turn every gap in the progress store into a queued repeat, skipping
    /// numbers already waiting in the queue. Returns how many were added.
    pub fn reconcile(&mut self, get_job: &JobSource) -> usize {
        let missing = self.progress.missing();
        if missing.is_empty() {
            return 0;
        }
        let queued: HashSet<JobNumber> = self.repeat.iter().map(|task| task.num).collect();
        let mut added = 0;
        for num in missing {
            if queued.contains(&num) {
                continue;
            }
            debug!(num, "job missing, queueing repeat");
            self.repeat.push_back(Task::new(num, (get_job)(num)));
            added += 1;
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobSource;
    use serde_json::json;
    use std::sync::Arc;

    fn job_source() -> JobSource {
        Arc::new(|num| json!(num))
    }

    #[test]
    fn test_fresh_sequence_starts_at_zero() {
        let mut dispatcher = Dispatcher::new(ProgressStore::default());
        let source = job_source();
        assert_eq!(dispatcher.next_task(&source).num, 0);
        assert_eq!(dispatcher.next_task(&source).num, 1);
    }

    #[test]
    fn test_start_offset_respected() {
        let mut dispatcher = Dispatcher::new(ProgressStore::new(99));
        let source = job_source();
        assert_eq!(dispatcher.next_task(&source).num, 100);
    }

    #[test]
    fn test_cursor_skips_completed_numbers() {
        let mut dispatcher = Dispatcher::new(ProgressStore::with_above(1, [3, 4]));
        let source = job_source();
        // 2 is the first gap but gap-filling is the reconciler's job; the
        // cursor starts past the floor and skips 3 and 4.
        assert_eq!(dispatcher.next_task(&source).num, 2);
        assert_eq!(dispatcher.next_task(&source).num, 5);
    }

    #[test]
    fn test_repeat_queue_served_before_cursor() {
        let mut dispatcher = Dispatcher::new(ProgressStore::default());
        let source = job_source();
        let mut lost = Task::new(7, json!(7));
        lost.runs = 1;
        dispatcher.push_repeat(lost);
        let task = dispatcher.next_task(&source);
        assert_eq!(task.num, 7);
        assert_eq!(task.runs, 1, "repeat keeps its hand-out count");
        assert_eq!(dispatcher.next_task(&source).num, 0);
    }

    #[test]
    fn test_push_repeat_dedups_by_number() {
        let mut dispatcher = Dispatcher::new(ProgressStore::default());
        dispatcher.push_repeat(Task::new(7, json!(7)));
        dispatcher.push_repeat(Task::new(7, json!(7)));
        assert_eq!(dispatcher.repeat.len(), 1);
    }

    #[test]
    fn test_stale_repeat_dropped_at_pop() {
        let mut dispatcher = Dispatcher::new(ProgressStore::default());
        let source = job_source();
        dispatcher.push_repeat(Task::new(9, json!(9)));
        // A racing session completed 9 while it sat in the queue.
        dispatcher.record(9);
        assert_eq!(dispatcher.next_task(&source).num, 0);
        assert!(dispatcher.repeat.is_empty());
    }

    #[test]
    fn test_reconcile_queues_gaps_once() {
        let mut dispatcher = Dispatcher::new(ProgressStore::with_above(0, [3, 5]));
        let source = job_source();
        assert_eq!(dispatcher.reconcile(&source), 2);
        let queued: Vec<_> = dispatcher.repeat.iter().map(|t| t.num).collect();
        assert_eq!(queued, vec![1, 2]);
        // A second sweep finds the same gaps already queued.
        assert_eq!(dispatcher.reconcile(&source), 0);
    }

    #[test]
    fn test_reconcile_payload_matches_number() {
        let mut dispatcher = Dispatcher::new(ProgressStore::with_above(0, [4]));
        let source = job_source();
        dispatcher.reconcile(&source);
        for task in &dispatcher.repeat {
            assert_eq!(task.data, json!(task.num));
        }
    }

    #[test]
    fn test_reconcile_noop_without_gaps() {
        let mut dispatcher = Dispatcher::new(ProgressStore::new(10));
        let source = job_source();
        assert_eq!(dispatcher.reconcile(&source), 0);
        assert!(dispatcher.repeat.is_empty());
    }
}
