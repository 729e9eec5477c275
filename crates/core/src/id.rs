use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Opaque identifier for a submitted task.
///
/// The high 32 bits carry the unix-millisecond admission timestamp, the low
/// 32 bits are random. Ids are unique with overwhelming probability within a
/// process run; their numeric ordering carries no meaning (neither priority
/// nor submission order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Mint a fresh id. Called once per task, at admission time.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis() as u64;
        let noise = rand::random::<u32>() as u64;
        TaskId((millis << 32) | noise)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
