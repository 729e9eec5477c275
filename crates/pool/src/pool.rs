use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use tracing::debug;

use lockstep_core::{Executor, StepStatus};

/// State shared between the pool handle and its workers.
///
/// `slots[i]` is worker `i`'s current step: `Some` while a step is assigned
/// or in flight, cleared by the worker itself once `execute_step` returns.
/// During any dispatch either all slots point at the same executor or all are
/// empty; the pool never runs two executors at once, or a partial gang.
struct State {
    slots: Vec<Option<Arc<dyn Executor>>>,
    running: bool,
    /// Set by any worker whose `execute_step` returned [`StepStatus::Stop`]
    /// during the current step. Reset on dispatch.
    saw_stop: bool,
}

impl State {
    fn all_slots_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }
}

struct Shared {
    state: Mutex<State>,
    /// Signals both "step available" (dispatcher -> workers) and "slot
    /// retired" (worker -> dispatcher and idle siblings). Because one condvar
    /// carries both meanings, every signal must be `notify_all`; a
    /// `notify_one` could wake an idle worker instead of the blocked
    /// dispatcher and lose the wakeup.
    signal: Condvar,
}

/// Fixed-size gang-stepping worker pool. Non re-entrant: at most one step is
/// in flight pool-wide at any time.
///
/// Contract violations (double start, dispatch while a step is in flight,
/// stopping a stopped pool) are programmer errors and panic; they are never
/// reported as recoverable results.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    slots: Vec::new(),
                    running: false,
                    saw_stop: false,
                }),
                signal: Condvar::new(),
            }),
            workers: Vec::new(),
        }
    }

    /// Spawn `thread_count` workers. Panics if the pool is already running or
    /// `thread_count` is zero.
    pub fn start(&mut self, thread_count: usize) {
        assert!(thread_count > 0, "thread count must be positive");
        assert!(self.workers.is_empty(), "already started");

        {
            let mut state = self.shared.state.lock().unwrap();
            state.slots = vec![None; thread_count];
            state.running = true;
        }

        self.workers.reserve(thread_count);
        for index in 0..thread_count {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("lockstep-worker-{index}"))
                .spawn(move || worker_main(&shared, index, thread_count))
                .expect("failed to spawn worker thread");
            self.workers.push(handle);
        }
        debug!(thread_count, "pool started");
        // Does not wait for workers to reach their loop; a dispatched step
        // simply waits in the slot until they do.
    }

    /// Assign `executor` to every worker's slot and wake the gang. Returns
    /// immediately; workers may not have started the step yet. Panics if the
    /// pool is not running or the previous step has not fully retired.
    pub fn dispatch_step(&self, executor: Arc<dyn Executor>) {
        {
            let mut state = self.shared.state.lock().unwrap();
            assert!(state.running, "pool is not running");
            assert!(state.all_slots_empty(), "previous step still in flight");
            state.saw_stop = false;
            for slot in state.slots.iter_mut() {
                *slot = Some(Arc::clone(&executor));
            }
        }
        self.shared.signal.notify_all();
    }

    /// Run one step on every worker and block until all of them have retired
    /// it. Returns [`StepStatus::Stop`] if any worker reported completion
    /// during the step.
    pub fn run_step_and_wait(&self, executor: Arc<dyn Executor>) -> StepStatus {
        self.dispatch_step(executor);

        let mut state = self.shared.state.lock().unwrap();
        while !state.all_slots_empty() {
            state = self.shared.signal.wait(state).unwrap();
        }
        if state.saw_stop {
            StepStatus::Stop
        } else {
            StepStatus::Continue
        }
    }

    /// Stop the pool: clear the running flag, wake every worker so it
    /// observes the flag and exits, and join them all. Joining implicitly
    /// waits for an in-flight step to finish. Panics if not running.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            assert!(state.running, "can't stop a pool that isn't running");
            state.running = false;
        }
        self.shared.signal.notify_all();

        for handle in self.workers.drain(..) {
            handle.join().expect("worker thread panicked");
        }

        let mut state = self.shared.state.lock().unwrap();
        state.slots.clear();
        debug!("pool stopped");
    }

    /// Number of live worker threads: 0 before `start` and after `stop`.
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Stop a still-running pool so workers never outlive their owner. A
        // poisoned lock means a contract violation already unwound through a
        // worker or caller; skip the join rather than panic mid-unwind.
        let running = match self.shared.state.lock() {
            Ok(state) => state.running,
            Err(_) => return,
        };
        if running {
            self.stop();
        }
    }
}

/// Worker entry point. Suspends (no spinning) until its slot is filled or the
/// pool is stopping, runs one step, retires its own slot, and wakes everyone.
fn worker_main(shared: &Shared, index: usize, thread_count: usize) {
    loop {
        let executor = {
            let mut state = shared.state.lock().unwrap();
            loop {
                if !state.running {
                    return;
                }
                if let Some(executor) = state.slots[index].clone() {
                    break executor;
                }
                state = shared.signal.wait(state).unwrap();
            }
        };

        let status = executor.execute_step(index, thread_count);

        {
            let mut state = shared.state.lock().unwrap();
            state.slots[index] = None;
            if status == StepStatus::Stop {
                state.saw_stop = true;
            }
        }
        // The dispatcher and idle siblings wait on the same condvar, so this
        // must wake all of them.
        shared.signal.notify_all();
    }
}
