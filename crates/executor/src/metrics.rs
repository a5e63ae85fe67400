use std::time::Duration;

use serde::Serialize;

use crate::task::Outcome;

/// Point-in-time view of an executor, answered by its run loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutorStats {
    /// Executor display name.
    pub name: String,
    /// Configured concurrency limit.
    pub limit: usize,
    /// Tasks waiting in the pending queue.
    pub waiting: usize,
    /// Tasks whose work function is in flight.
    pub running: usize,
    /// Tasks accepted into the queue.
    pub submitted: u64,
    /// Tasks whose work function has been invoked.
    pub started: u64,
    /// Tasks that resolved with a value.
    pub succeeded: u64,
    /// Tasks that resolved with the work function's error.
    pub failed: u64,
    /// Tasks whose work function panicked.
    pub panicked: u64,
    /// Tasks discarded before they settled.
    pub cancelled: u64,
    /// Mean wall-clock duration of settled tasks.
    pub avg_task_duration: Duration,
}

impl ExecutorStats {
    pub(crate) fn new(name: String, limit: usize) -> Self {
        Self {
            name,
            limit,
            ..Self::default()
        }
    }

    /// Tasks that have settled, one way or another, after starting.
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }

    /// Record a settled task. Cancelled tasks do not count towards the mean.
    pub(crate) fn record_completion(&mut self, outcome: Outcome, duration: Duration) {
        match outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Panicked => self.panicked += 1,
            Outcome::Cancelled => {
                self.cancelled += 1;
                return;
            }
        }

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let count = self.completed();
        self.avg_task_duration = if count == 1 {
            duration
        } else {
            let prev_nanos = self.avg_task_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }
}
