//! Printer demo plugin.
//!
//! Registers the "printer" executor kind: counts from 1 to the task's `max`
//! parameter, one number per step, sleeping `sleep` milliseconds each step to
//! simulate work. Thread 0 advances the count; sibling workers idle through
//! the step and report the shared view.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use lockstep_core::{Executor, StepStatus, Task};
use lockstep_scheduler::PluginRegistrar;

pub struct PrinterExecutor {
    max: i64,
    sleep_ms: u64,
    progress: AtomicI64,
}

impl PrinterExecutor {
    pub fn new(task: Box<dyn Task>) -> Self {
        Self {
            max: task.int_param("max").unwrap_or(100),
            sleep_ms: task.int_param("sleep").unwrap_or(0) as u64,
            progress: AtomicI64::new(0),
        }
    }
}

impl Executor for PrinterExecutor {
    fn execute_step(&self, thread_index: usize, _thread_count: usize) -> StepStatus {
        if thread_index != 0 {
            return if self.progress.load(Ordering::SeqCst) >= self.max {
                StepStatus::Stop
            } else {
                StepStatus::Continue
            };
        }

        if self.sleep_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.sleep_ms));
        }
        let current = self.progress.fetch_add(1, Ordering::SeqCst) + 1;
        println!("printer: {current}/{}", self.max);

        if current >= self.max {
            StepStatus::Stop
        } else {
            StepStatus::Continue
        }
    }
}

pub fn make_printer(task: Box<dyn Task>) -> Box<dyn Executor> {
    Box::new(PrinterExecutor::new(task))
}

/// Plugin entry point, resolved by the host via `dlsym`.
///
/// # Safety
///
/// `registrar` must be the valid, exclusive pointer the host loader passes
/// during `load_plugin`.
#[no_mangle]
pub unsafe extern "C" fn lockstep_plugin_init(registrar: *mut PluginRegistrar) {
    let registrar = &mut *registrar;
    registrar.register("printer", make_printer);
}
