use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use lockstep_core::{Executor, GenericTask, StepStatus, Task};

use crate::error::SchedulerError;
use crate::table::TaskStatus;

use super::TaskSystem;

// ── Scripted test executor ──────────────────────────────────────────

/// Open/closed latch handed to executors through an opaque param.
struct Gate {
    open: Mutex<bool>,
    signal: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(false),
            signal: Condvar::new(),
        })
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.signal.notify_all();
    }

    fn wait_open(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.signal.wait(open).unwrap();
        }
    }
}

/// Test executor scripted entirely through task parameters:
///
/// - `steps` (int): steps until it reports `Stop` (default 1)
/// - `sleep` (int): milliseconds thread 0 sleeps per step
/// - `label` (string): pushed to `log` on the final step
/// - `log` (any, `Mutex<Vec<String>>`): completion order log
/// - `gate` (any, `Gate`): thread 0 blocks on it each step
/// - `counter` (any, `AtomicUsize`): incremented once per executed step
/// - `touched` (any, `Mutex<HashSet<usize>>`): every thread inserts its index
struct ScriptedExecutor {
    label: String,
    steps: usize,
    sleep_ms: u64,
    progress: AtomicUsize,
    log: Option<Arc<Mutex<Vec<String>>>>,
    gate: Option<Arc<Gate>>,
    counter: Option<Arc<AtomicUsize>>,
    touched: Option<Arc<Mutex<HashSet<usize>>>>,
}

fn scripted_factory(task: Box<dyn Task>) -> Box<dyn Executor> {
    Box::new(ScriptedExecutor {
        label: task.string_param("label").unwrap_or_default(),
        steps: task.int_param("steps").unwrap_or(1) as usize,
        sleep_ms: task.int_param("sleep").unwrap_or(0) as u64,
        progress: AtomicUsize::new(0),
        log: task
            .any_param("log")
            .and_then(|p| p.downcast::<Mutex<Vec<String>>>().ok()),
        gate: task.any_param("gate").and_then(|p| p.downcast::<Gate>().ok()),
        counter: task
            .any_param("counter")
            .and_then(|p| p.downcast::<AtomicUsize>().ok()),
        touched: task
            .any_param("touched")
            .and_then(|p| p.downcast::<Mutex<HashSet<usize>>>().ok()),
    })
}

impl Executor for ScriptedExecutor {
    fn execute_step(&self, thread_index: usize, _thread_count: usize) -> StepStatus {
        if let Some(touched) = &self.touched {
            touched.lock().unwrap().insert(thread_index);
        }

        // Only thread 0 advances progress; siblings report the shared view.
        if thread_index != 0 {
            return if self.progress.load(Ordering::SeqCst) >= self.steps {
                StepStatus::Stop
            } else {
                StepStatus::Continue
            };
        }

        if let Some(gate) = &self.gate {
            gate.wait_open();
        }
        if self.sleep_ms > 0 {
            thread::sleep(Duration::from_millis(self.sleep_ms));
        }
        if let Some(counter) = &self.counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }

        let done = self.progress.fetch_add(1, Ordering::SeqCst) + 1 >= self.steps;
        if done {
            if let Some(log) = &self.log {
                log.lock().unwrap().push(self.label.clone());
            }
            StepStatus::Stop
        } else {
            StepStatus::Continue
        }
    }
}

fn system(threads: usize) -> TaskSystem {
    let system = TaskSystem::with_threads(threads);
    system.register_executor("scripted", scripted_factory);
    system
}

fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn single_task_completes() {
    let system = system(2);
    let counter = Arc::new(AtomicUsize::new(0));

    let task = GenericTask::new("scripted")
        .with_int("steps", 3)
        .with_any("counter", counter.clone());
    let id = system.schedule(Box::new(task), 1).unwrap();

    system.wait_for(id).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 3);

    let metrics = system.metrics();
    assert_eq!(metrics.tasks_scheduled, 1);
    assert_eq!(metrics.tasks_completed["scripted"], 1);
    assert!(metrics.steps_executed >= 3);

    system.shutdown();
}

#[test]
fn highest_priority_pending_task_runs_first() {
    let system = system(2);
    let log = new_log();
    let gate = Gate::new();

    // A gated task holds the pool while the rest are admitted.
    let holder = GenericTask::new("scripted")
        .with_string("label", "holder")
        .with_any("log", log.clone())
        .with_any("gate", gate.clone());
    let holder_id = system.schedule(Box::new(holder), 100).unwrap();

    let mut ids = Vec::new();
    for (label, priority) in [("low", 1), ("high", 10), ("mid", 5)] {
        let task = GenericTask::new("scripted")
            .with_string("label", label)
            .with_any("log", log.clone());
        ids.push(system.schedule(Box::new(task), priority).unwrap());
    }

    gate.open();
    system.wait_for(holder_id).unwrap();
    for id in ids {
        system.wait_for(id).unwrap();
    }

    assert_eq!(
        *log.lock().unwrap(),
        vec!["holder", "high", "mid", "low"],
        "selection must follow descending priority"
    );

    system.shutdown();
}

#[test]
fn equal_priorities_complete_in_submission_order() {
    let system = system(2);
    let log = new_log();

    let mut ids = Vec::new();
    for label in ["a", "b", "c", "d"] {
        let task = GenericTask::new("scripted")
            .with_string("label", label)
            .with_any("log", log.clone());
        ids.push(system.schedule(Box::new(task), 7).unwrap());
    }
    for id in ids {
        system.wait_for(id).unwrap();
    }

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d"]);

    system.shutdown();
}

#[test]
fn higher_priority_task_preempts_and_loser_resumes() {
    let system = system(4);
    let log = new_log();
    let low_steps = Arc::new(AtomicUsize::new(0));

    let low = GenericTask::new("scripted")
        .with_string("label", "low")
        .with_int("steps", 30)
        .with_int("sleep", 5)
        .with_any("log", log.clone())
        .with_any("counter", low_steps.clone());
    let low_id = system.schedule(Box::new(low), 10).unwrap();

    // Wait until the low task is actually stepping before admitting the
    // high one.
    while low_steps.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    let high = GenericTask::new("scripted")
        .with_string("label", "high")
        .with_int("steps", 3)
        .with_int("sleep", 5)
        .with_any("log", log.clone());
    let high_id = system.schedule(Box::new(high), 20).unwrap();

    system.wait_for(high_id).unwrap();
    system.wait_for(low_id).unwrap();

    // The high task finished before the low one resumed, and the low task's
    // executor kept its progress: exactly 30 steps total, not 30 + a rerun.
    assert_eq!(*log.lock().unwrap(), vec!["high", "low"]);
    assert_eq!(low_steps.load(Ordering::SeqCst), 30);
    assert!(system.metrics().preemptions >= 1);

    system.shutdown();
}

#[test]
fn step_fans_out_to_every_worker() {
    let system = system(4);
    let touched: Arc<Mutex<HashSet<usize>>> = Arc::new(Mutex::new(HashSet::new()));

    let task = GenericTask::new("scripted")
        .with_int("steps", 2)
        .with_any("touched", touched.clone());
    let id = system.schedule(Box::new(task), 1).unwrap();
    system.wait_for(id).unwrap();

    assert_eq!(
        *touched.lock().unwrap(),
        HashSet::from([0, 1, 2, 3]),
        "every worker must execute each step"
    );

    system.shutdown();
}

#[test]
fn status_tracks_the_task_lifecycle() {
    let system = system(2);
    let gate = Gate::new();

    let holder = GenericTask::new("scripted").with_any("gate", gate.clone());
    let holder_id = system.schedule(Box::new(holder), 10).unwrap();

    // Wait for the holder to be activated; it then blocks on the gate.
    while system.status(holder_id).unwrap() != TaskStatus::Active {
        thread::sleep(Duration::from_millis(1));
    }

    // A task admitted behind an active one stays pending.
    let queued = GenericTask::new("scripted");
    let queued_id = system.schedule(Box::new(queued), 1).unwrap();
    assert_eq!(system.status(queued_id).unwrap(), TaskStatus::Pending);

    gate.open();
    system.wait_for(holder_id).unwrap();
    system.wait_for(queued_id).unwrap();
    assert_eq!(system.status(holder_id).unwrap(), TaskStatus::Completed);
    assert_eq!(system.status(queued_id).unwrap(), TaskStatus::Completed);

    system.shutdown();
}

#[test]
fn preempted_task_reports_suspended() {
    let system = system(2);
    let low_steps = Arc::new(AtomicUsize::new(0));
    let gate = Gate::new();

    let low = GenericTask::new("scripted")
        .with_int("steps", 50)
        .with_int("sleep", 2)
        .with_any("counter", low_steps.clone());
    let low_id = system.schedule(Box::new(low), 10).unwrap();

    while low_steps.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    // A gated high-priority task preempts and then holds the pool, leaving
    // the low task observably suspended.
    let high = GenericTask::new("scripted").with_any("gate", gate.clone());
    let high_id = system.schedule(Box::new(high), 20).unwrap();

    while system.status(high_id).unwrap() != TaskStatus::Active {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(system.status(low_id).unwrap(), TaskStatus::Suspended);

    gate.open();
    system.wait_for(high_id).unwrap();
    system.wait_for(low_id).unwrap();

    system.shutdown();
}

#[test]
fn wait_for_unknown_id_is_not_found() {
    let system = system(2);
    let bogus = lockstep_core::TaskId::generate();

    assert!(matches!(
        system.wait_for(bogus),
        Err(SchedulerError::TaskNotFound(_))
    ));
    assert!(matches!(
        system.on_completed(bogus, |_| {}),
        Err(SchedulerError::TaskNotFound(_))
    ));

    system.shutdown();
}

#[test]
fn wait_for_completed_task_returns_immediately() {
    let system = system(2);
    let id = system
        .schedule(Box::new(GenericTask::new("scripted")), 1)
        .unwrap();
    system.wait_for(id).unwrap();

    // Second wait must not block.
    system.wait_for(id).unwrap();

    // A late callback fires synchronously.
    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = Arc::clone(&fired);
    system
        .on_completed(id, move |_| {
            fired2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    system.shutdown();
}

#[test]
fn completion_callback_fires_exactly_once() {
    let system = system(2);
    let fired = Arc::new(AtomicUsize::new(0));
    let gate = Gate::new();

    let task = GenericTask::new("scripted").with_any("gate", gate.clone());
    let id = system.schedule(Box::new(task), 1).unwrap();

    let fired2 = Arc::clone(&fired);
    system
        .on_completed(id, move |_| {
            fired2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0, "must not fire early");

    gate.open();
    system.wait_for(id).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    system.shutdown();
}

#[test]
fn unknown_executor_kind_is_rejected_at_admission() {
    let system = system(2);
    let result = system.schedule(Box::new(GenericTask::new("no-such-kind")), 1);
    assert!(matches!(
        result,
        Err(SchedulerError::UnknownExecutor(kind)) if kind == "no-such-kind"
    ));
    system.shutdown();
}

#[test]
#[should_panic(expected = "schedule after shutdown")]
fn schedule_after_shutdown_panics() {
    let system = system(2);
    system.shutdown();
    let _ = system.schedule(Box::new(GenericTask::new("scripted")), 1);
}

#[test]
fn independent_systems_coexist() {
    let a = system(2);
    let b = system(2);

    let id_a = a
        .schedule(Box::new(GenericTask::new("scripted")), 1)
        .unwrap();
    let id_b = b
        .schedule(Box::new(GenericTask::new("scripted")), 1)
        .unwrap();

    a.wait_for(id_a).unwrap();
    b.wait_for(id_b).unwrap();

    // Ids are tracked per system, not globally.
    assert!(matches!(
        a.wait_for(id_b),
        Err(SchedulerError::TaskNotFound(_))
    ));

    a.shutdown();
    b.shutdown();
}
