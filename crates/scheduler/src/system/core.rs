use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;

use tracing::info;

use lockstep_core::{ExecutorFactory, RuntimeConfig, Task, TaskId};
use lockstep_pool::ThreadPool;

use crate::error::SchedulerError;
use crate::metrics::SchedulerMetrics;
use crate::plugin::{self, PluginHandle};
use crate::queue::PendingQueue;
use crate::registry::{ExecutorRegistry, PluginRegistrar};
use crate::table::{TaskRecord, TaskStatus, TaskTable};

/// State shared between the caller-facing [`TaskSystem`] handle and its
/// dispatch thread.
pub(crate) struct Shared {
    pub queue: Mutex<PendingQueue>,
    /// Wakes the dispatch thread when work arrives or shutdown is requested.
    pub queue_signal: Condvar,
    pub shutdown: AtomicBool,
    pub table: TaskTable,
    pub metrics: RwLock<SchedulerMetrics>,
}

/// The task scheduler. Owns the executor registry, the pending priority
/// queue, the per-task completion table, and a dedicated dispatch thread
/// driving the worker pool.
///
/// There is no process-wide instance: hosts construct one (or several, in
/// tests) and share it behind an `Arc`.
pub struct TaskSystem {
    shared: Arc<Shared>,
    registry: Arc<ExecutorRegistry>,
    plugins: Mutex<Vec<PluginHandle>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    worker_threads: usize,
}

impl TaskSystem {
    /// Build a system from config: resolve the worker count, start the
    /// dispatch thread and pool, and load any configured plugins. A plugin
    /// failure tears the system back down and is returned to the caller.
    pub fn new(config: &RuntimeConfig) -> Result<Self, SchedulerError> {
        let system = Self::with_threads(config.resolved_worker_threads());
        for path in &config.plugin_paths {
            if let Err(err) = system.load_plugin(path) {
                system.shutdown();
                return Err(err);
            }
        }
        Ok(system)
    }

    /// Build a system with an explicit worker count. Panics if
    /// `worker_threads` is zero (programmer error, same contract as the
    /// pool).
    pub fn with_threads(worker_threads: usize) -> Self {
        assert!(worker_threads > 0, "thread count must be positive");

        let shared = Arc::new(Shared {
            queue: Mutex::new(PendingQueue::new()),
            queue_signal: Condvar::new(),
            shutdown: AtomicBool::new(false),
            table: Mutex::new(HashMap::new()),
            metrics: RwLock::new(SchedulerMetrics::default()),
        });
        let registry = Arc::new(ExecutorRegistry::new());

        let driver = {
            let shared = Arc::clone(&shared);
            let registry = Arc::clone(&registry);
            std::thread::Builder::new()
                .name("lockstep-dispatch".to_string())
                .spawn(move || {
                    let mut pool = ThreadPool::new();
                    pool.start(worker_threads);
                    super::dispatch::run(&shared, &registry, &pool);
                    pool.stop();
                })
                .expect("failed to spawn dispatch thread")
        };

        info!(worker_threads, "task system started");
        Self {
            shared,
            registry,
            plugins: Mutex::new(Vec::new()),
            driver: Mutex::new(Some(driver)),
            worker_threads,
        }
    }

    /// Register an executor factory directly. Later registrations for the
    /// same kind overwrite earlier ones.
    pub fn register_executor(&self, kind: &str, factory: ExecutorFactory) {
        self.registry.register(kind, factory);
    }

    /// Load a plugin library and let it register its executor kinds.
    pub fn load_plugin(&self, path: impl AsRef<Path>) -> Result<(), SchedulerError> {
        let mut registrar = PluginRegistrar::new(Arc::clone(&self.registry));
        let handle = plugin::load(path.as_ref(), &mut registrar)?;
        self.plugins.lock().unwrap().push(handle);
        Ok(())
    }

    /// Admit a task at the given priority. Returns its id immediately; the
    /// dispatch thread picks it up asynchronously. A task whose declared
    /// executor kind has no registered factory is rejected here rather than
    /// left to fail at activation.
    ///
    /// Panics if called after [`shutdown`](Self::shutdown).
    pub fn schedule(&self, task: Box<dyn Task>, priority: i32) -> Result<TaskId, SchedulerError> {
        assert!(
            !self.shared.shutdown.load(Ordering::SeqCst),
            "schedule after shutdown"
        );

        let kind = task.executor_kind().to_string();
        if !self.registry.contains(&kind) {
            return Err(SchedulerError::UnknownExecutor(kind));
        }

        let id = TaskId::generate();
        self.shared
            .table
            .lock()
            .unwrap()
            .insert(id, Arc::new(TaskRecord::new()));

        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.push_fresh(id, kind, priority, task);
            let mut metrics = self.shared.metrics.write().unwrap();
            metrics.record_scheduled();
            metrics.pending_depth = queue.len();
        }
        self.shared.queue_signal.notify_all();
        Ok(id)
    }

    /// Block until the task completes. Unknown ids are a normal not-found
    /// result; completed tasks return immediately.
    pub fn wait_for(&self, id: TaskId) -> Result<(), SchedulerError> {
        let record = self
            .shared
            .table
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::TaskNotFound(id))?;
        record.wait();
        Ok(())
    }

    /// Register a completion callback, fired exactly once. If the task has
    /// already completed the callback fires synchronously before this
    /// returns.
    pub fn on_completed(
        &self,
        id: TaskId,
        callback: impl FnOnce(TaskId) + Send + 'static,
    ) -> Result<(), SchedulerError> {
        let record = self
            .shared
            .table
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::TaskNotFound(id))?;
        record.on_completed(id, Box::new(callback));
        Ok(())
    }

    /// Current lifecycle status of a task. Unknown ids are a normal
    /// not-found result.
    pub fn status(&self, id: TaskId) -> Result<TaskStatus, SchedulerError> {
        let record = self
            .shared
            .table
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::TaskNotFound(id))?;
        Ok(record.status())
    }

    /// Snapshot of the scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.shared.metrics.read().unwrap().clone()
    }

    /// Registered executor kinds, for diagnostics.
    pub fn executor_kinds(&self) -> Vec<String> {
        self.registry.kinds()
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Stop the dispatch thread and the pool. The active task finishes its
    /// current step and is abandoned; pending tasks stay unfinished.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        let driver = self.driver.lock().unwrap().take();
        let Some(driver) = driver else { return };

        {
            // Flip the flag under the queue lock so the dispatch thread is
            // either before its shutdown check (and will see the flag) or
            // parked in the wait (and will get the notify) — never between.
            let _queue = self.shared.queue.lock().unwrap();
            self.shared.shutdown.store(true, Ordering::SeqCst);
        }
        self.shared.queue_signal.notify_all();
        driver.join().expect("dispatch thread panicked");
        info!("task system stopped");
    }
}

impl Drop for TaskSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}
