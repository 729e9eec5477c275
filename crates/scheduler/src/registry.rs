//! Executor kind registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use lockstep_core::{Executor, ExecutorFactory, Task};

/// Maps executor-kind names to their factories.
///
/// Mutated while plugins load (before steady-state scheduling) and read-only
/// afterwards, so the `RwLock` is effectively uncontended on the dispatch
/// path.
pub struct ExecutorRegistry {
    factories: RwLock<HashMap<String, ExecutorFactory>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register a factory under `kind`. Later registrations for the same
    /// name overwrite the earlier one.
    pub fn register(&self, kind: &str, factory: ExecutorFactory) {
        let previous = self
            .factories
            .write()
            .unwrap()
            .insert(kind.to_string(), factory);
        if previous.is_some() {
            info!(kind, "executor factory replaced");
        } else {
            info!(kind, "executor factory registered");
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.read().unwrap().contains_key(kind)
    }

    /// Build an executor for `task` from the factory registered under the
    /// task's declared kind.
    pub fn build(&self, task: Box<dyn Task>) -> Option<Box<dyn Executor>> {
        let factory = self
            .factories
            .read()
            .unwrap()
            .get(task.executor_kind())
            .copied()?;
        Some(factory(task))
    }

    pub fn kinds(&self) -> Vec<String> {
        self.factories.read().unwrap().keys().cloned().collect()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration capability handed to a plugin's init entry point.
///
/// A concrete struct (not a trait object) so a thin pointer to it can cross
/// the `extern "C"` plugin boundary.
pub struct PluginRegistrar {
    registry: Arc<ExecutorRegistry>,
    registered: usize,
}

impl PluginRegistrar {
    pub(crate) fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self {
            registry,
            registered: 0,
        }
    }

    /// Called by the plugin for each executor kind it provides.
    pub fn register(&mut self, kind: &str, factory: ExecutorFactory) {
        self.registry.register(kind, factory);
        self.registered += 1;
    }

    /// Number of kinds this registrar has seen. Used to confirm a plugin's
    /// init actually registered something.
    pub(crate) fn registered(&self) -> usize {
        self.registered
    }
}
