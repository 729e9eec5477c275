pub mod config;
pub mod error;
pub mod id;
pub mod task;

pub use config::RuntimeConfig;
pub use error::CoreError;
pub use id::TaskId;
pub use task::*;
