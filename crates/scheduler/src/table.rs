//! Per-task lifecycle tracking.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};

use serde::Serialize;

use lockstep_core::TaskId;

/// Lifecycle of an admitted task.
///
/// Pending → Active → (Suspended → Active)* → Completed. A suspended task
/// keeps its live executor and resumes stepping where it left off once it
/// wins the queue again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    /// In the queue, never activated.
    Pending,
    /// Currently being stepped on the pool.
    Active,
    /// Preempted; executor retained, back in the queue.
    Suspended,
    /// Done. Terminal.
    Completed,
}

pub(crate) type CompletionCallback = Box<dyn FnOnce(TaskId) + Send>;

/// Status, completion signal, and callback list for one admitted task.
///
/// Records stay in the table after completion so a late `wait_for` returns
/// immediately and a late `on_completed` fires synchronously.
pub(crate) struct TaskRecord {
    state: Mutex<RecordState>,
    completed: Condvar,
}

struct RecordState {
    status: TaskStatus,
    callbacks: Vec<CompletionCallback>,
}

impl TaskRecord {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecordState {
                status: TaskStatus::Pending,
                callbacks: Vec::new(),
            }),
            completed: Condvar::new(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.state.lock().unwrap().status
    }

    /// Record a non-terminal transition (Active, Suspended).
    pub fn set_status(&self, status: TaskStatus) {
        debug_assert!(status != TaskStatus::Completed, "use complete()");
        let mut state = self.state.lock().unwrap();
        if state.status != TaskStatus::Completed {
            state.status = status;
        }
    }

    /// Mark the task complete, wake all waiters, and fire drained callbacks
    /// outside the lock.
    pub fn complete(&self, id: TaskId) {
        let callbacks = {
            let mut state = self.state.lock().unwrap();
            state.status = TaskStatus::Completed;
            std::mem::take(&mut state.callbacks)
        };
        self.completed.notify_all();
        for callback in callbacks {
            callback(id);
        }
    }

    /// Block until the task completes. Returns immediately if it already has.
    pub fn wait(&self) {
        let mut state = self.state.lock().unwrap();
        while state.status != TaskStatus::Completed {
            state = self.completed.wait(state).unwrap();
        }
    }

    /// Register a callback; fires synchronously if the task already
    /// completed.
    pub fn on_completed(&self, id: TaskId, callback: CompletionCallback) {
        {
            let mut state = self.state.lock().unwrap();
            if state.status != TaskStatus::Completed {
                state.callbacks.push(callback);
                return;
            }
        }
        // Already complete: fire outside the lock.
        callback(id);
    }
}

/// Task table: id → lifecycle record.
pub(crate) type TaskTable = Mutex<HashMap<TaskId, std::sync::Arc<TaskRecord>>>;
