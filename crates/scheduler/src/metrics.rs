use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Scheduler operational counters, snapshotted via [`clone`](Clone).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Tasks admitted since startup.
    pub tasks_scheduled: u64,
    /// Tasks completed, by executor kind.
    pub tasks_completed: HashMap<String, u64>,
    /// Times a running task was preempted by a higher-priority one.
    pub preemptions: u64,
    /// Pool steps driven since startup.
    pub steps_executed: u64,
    /// Steps driven, by executor kind.
    pub steps_by_kind: HashMap<String, u64>,
    /// Rolling average step duration by executor kind.
    pub avg_step_duration: HashMap<String, Duration>,
    /// Completion time by executor kind.
    pub last_completed: HashMap<String, DateTime<Utc>>,
    /// Pending-queue depth at the last dispatch.
    pub pending_depth: usize,
}

impl SchedulerMetrics {
    pub fn record_scheduled(&mut self) {
        self.tasks_scheduled += 1;
    }

    pub fn record_step(&mut self, kind: &str, duration: Duration) {
        self.steps_executed += 1;
        let count = self.steps_by_kind.entry(kind.to_string()).or_default();
        *count += 1;
        let n = *count as u32;

        // Incremental mean: new_avg = prev_avg + (sample - prev_avg) / n
        let prev = self
            .avg_step_duration
            .get(kind)
            .copied()
            .unwrap_or_default();
        let new_avg = if n == 1 {
            duration
        } else if duration >= prev {
            prev + (duration - prev) / n
        } else {
            prev - (prev - duration) / n
        };
        self.avg_step_duration.insert(kind.to_string(), new_avg);
    }

    pub fn record_completed(&mut self, kind: &str) {
        *self.tasks_completed.entry(kind.to_string()).or_default() += 1;
        self.last_completed.insert(kind.to_string(), Utc::now());
    }

    pub fn record_preemption(&mut self) {
        self.preemptions += 1;
    }
}
