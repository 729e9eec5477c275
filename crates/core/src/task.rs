//! Task and executor abstractions.
//!
//! A [`Task`] is an immutable description of requested work: named parameters
//! plus the kind of executor that must run it. An [`Executor`] is the stateful
//! unit of execution built from a task by a registered factory; the scheduler
//! drives it one [step](Executor::execute_step) at a time across every worker
//! thread in the pool, and the executor alone decides when it is done.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared opaque parameter value. The Rust rendition of a `void*` parameter:
/// callers downcast with [`Any::downcast_ref`] / `Arc::downcast`.
pub type AnyParam = Arc<dyn Any + Send + Sync>;

/// An immutable description of requested work.
///
/// All parameter accessors default to absent; implementors override only the
/// kinds they carry. `executor_kind` names the registered factory that must
/// run this task and is the only mandatory capability.
pub trait Task: Send + Sync {
    fn int_param(&self, _name: &str) -> Option<i64> {
        None
    }

    fn string_param(&self, _name: &str) -> Option<String> {
        None
    }

    fn float_param(&self, _name: &str) -> Option<f64> {
        None
    }

    fn any_param(&self, _name: &str) -> Option<AnyParam> {
        None
    }

    /// Name of the executor kind this task requires. Used purely for
    /// registry lookup.
    fn executor_kind(&self) -> &str;
}

/// Outcome of a single execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// More steps are needed.
    Continue,
    /// The run is logically complete.
    Stop,
}

/// A steppable unit of execution bound to one task.
///
/// `execute_step` is invoked concurrently by every worker in the pool, each
/// with its own 0-based `thread_index` and the total `thread_count`, so
/// executors partition work internally (e.g. rows by index modulo count) and
/// keep any mutable progress behind atomics or locks.
pub trait Executor: Send + Sync {
    fn execute_step(&self, thread_index: usize, thread_count: usize) -> StepStatus;
}

/// Constructor for an executor kind. A plain `fn` pointer so it can be
/// handed across the plugin boundary and stored in the registry by value.
pub type ExecutorFactory = fn(Box<dyn Task>) -> Box<dyn Executor>;

// ── Map-backed task ─────────────────────────────────────────────────

/// A [`Task`] backed by parameter maps, for hosts that do not want to define
/// a dedicated task type per submission.
pub struct GenericTask {
    kind: String,
    ints: HashMap<String, i64>,
    strings: HashMap<String, String>,
    floats: HashMap<String, f64>,
    anys: HashMap<String, AnyParam>,
}

impl GenericTask {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ints: HashMap::new(),
            strings: HashMap::new(),
            floats: HashMap::new(),
            anys: HashMap::new(),
        }
    }

    pub fn with_int(mut self, name: impl Into<String>, value: i64) -> Self {
        self.ints.insert(name.into(), value);
        self
    }

    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.strings.insert(name.into(), value.into());
        self
    }

    pub fn with_float(mut self, name: impl Into<String>, value: f64) -> Self {
        self.floats.insert(name.into(), value);
        self
    }

    pub fn with_any(mut self, name: impl Into<String>, value: AnyParam) -> Self {
        self.anys.insert(name.into(), value);
        self
    }
}

impl Task for GenericTask {
    fn int_param(&self, name: &str) -> Option<i64> {
        self.ints.get(name).copied()
    }

    fn string_param(&self, name: &str) -> Option<String> {
        self.strings.get(name).cloned()
    }

    fn float_param(&self, name: &str) -> Option<f64> {
        self.floats.get(name).copied()
    }

    fn any_param(&self, name: &str) -> Option<AnyParam> {
        self.anys.get(name).cloned()
    }

    fn executor_kind(&self) -> &str {
        &self.kind
    }
}
