use thiserror::Error;

use lockstep_core::TaskId;

/// Errors surfaced by the scheduler. These are expected outcomes reported as
/// values; contract violations (double pool start and friends) panic instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("no executor registered for kind '{0}'")]
    UnknownExecutor(String),

    #[error("failed to load plugin {path}: {reason}")]
    PluginLoad { path: String, reason: String },

    #[error("plugin {path} does not export '{symbol}'")]
    PluginSymbol { path: String, symbol: String },

    #[error("invalid plugin path: {0}")]
    PluginPath(String),
}
