use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use lockstep_core::{Executor, StepStatus, TaskId};
use lockstep_pool::ThreadPool;

use crate::queue::{PendingEntry, Work};
use crate::registry::ExecutorRegistry;
use crate::table::TaskStatus;

use super::core::Shared;

/// Dispatch loop, run by the dedicated driver thread.
///
/// Repeatedly selects the highest-priority pending entry, resolves its
/// executor (building a fresh one or resuming a preempted one), and steps it
/// on the pool until it stops or a strictly higher-priority task appears.
/// Preemption only happens between steps; the step in flight always runs to
/// completion on every worker first.
pub(super) fn run(shared: &Shared, registry: &ExecutorRegistry, pool: &ThreadPool) {
    loop {
        let Some(entry) = next_entry(shared) else {
            return;
        };
        let PendingEntry {
            id,
            kind,
            priority,
            seq,
            work,
        } = entry;

        let executor: Arc<dyn Executor> = match work {
            Work::Fresh(task) => match registry.build(task) {
                Some(executor) => Arc::from(executor),
                None => {
                    // The kind was checked at admission; losing it here means
                    // the host replaced the registry contents mid-run. Fail
                    // the task rather than wedge its waiters.
                    warn!(%id, %kind, "executor factory disappeared; completing task unrun");
                    complete(shared, id, &kind);
                    continue;
                }
            },
            Work::Suspended(executor) => {
                debug!(%id, %kind, priority, "resuming preempted task");
                executor
            }
        };

        set_status(shared, id, TaskStatus::Active);
        debug!(%id, %kind, priority, "task active");
        loop {
            if shared.shutdown.load(Ordering::SeqCst) {
                // Abandon the active task between steps; shutdown is not a
                // completion.
                return;
            }

            let started = Instant::now();
            let status = pool.run_step_and_wait(Arc::clone(&executor));
            shared
                .metrics
                .write()
                .unwrap()
                .record_step(&kind, started.elapsed());

            match status {
                StepStatus::Stop => {
                    complete(shared, id, &kind);
                    break;
                }
                StepStatus::Continue => {
                    let preempt = {
                        let queue = shared.queue.lock().unwrap();
                        queue.top_priority().is_some_and(|top| top > priority)
                    };
                    if preempt {
                        debug!(%id, %kind, priority, "preempted");
                        shared.metrics.write().unwrap().record_preemption();
                        set_status(shared, id, TaskStatus::Suspended);
                        shared.queue.lock().unwrap().requeue(PendingEntry {
                            id,
                            kind: kind.clone(),
                            priority,
                            seq,
                            work: Work::Suspended(Arc::clone(&executor)),
                        });
                        break;
                    }
                }
            }
        }
    }
}

/// Block until a pending entry or shutdown. `None` means shut down.
fn next_entry(shared: &Shared) -> Option<PendingEntry> {
    let mut queue = shared.queue.lock().unwrap();
    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(entry) = queue.pop() {
            shared.metrics.write().unwrap().pending_depth = queue.len();
            return Some(entry);
        }
        queue = shared.queue_signal.wait(queue).unwrap();
    }
}

fn set_status(shared: &Shared, id: TaskId, status: TaskStatus) {
    if let Some(record) = shared.table.lock().unwrap().get(&id) {
        record.set_status(status);
    }
}

/// Mark `id` complete: fire callbacks, wake waiters, bump counters.
fn complete(shared: &Shared, id: TaskId, kind: &str) {
    shared.metrics.write().unwrap().record_completed(kind);
    let record = shared.table.lock().unwrap().get(&id).cloned();
    match record {
        Some(record) => record.complete(id),
        None => warn!(%id, "completed task missing from table"),
    }
    debug!(%id, %kind, "task completed");
}
