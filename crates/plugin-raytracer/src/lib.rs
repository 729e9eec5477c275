//! Raytracer demo plugin.
//!
//! Registers the "raytracer" executor kind: shades an RGB image of the scene
//! named by the task's `scene` parameter, one row per worker per step. Rows
//! are partitioned by index modulo thread count, so worker `t` shades rows
//! `t`, `t + n`, `t + 2n`, ... — the canonical gang fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use lockstep_core::{Executor, StepStatus, Task};
use lockstep_scheduler::PluginRegistrar;

const DEFAULT_WIDTH: usize = 256;
const DEFAULT_HEIGHT: usize = 256;

pub struct RaytracerExecutor {
    scene: String,
    width: usize,
    height: usize,
    image: Mutex<Vec<u8>>,
    /// Per-worker step counts, sized lazily on first step. Each worker's
    /// count is only touched by that worker, and the pool's step barrier
    /// orders the accesses.
    thread_steps: Mutex<Vec<usize>>,
    rows_shaded: AtomicUsize,
}

impl RaytracerExecutor {
    pub fn new(task: Box<dyn Task>) -> Self {
        let width = task.int_param("width").unwrap_or(DEFAULT_WIDTH as i64) as usize;
        let height = task.int_param("height").unwrap_or(DEFAULT_HEIGHT as i64) as usize;
        Self {
            scene: task.string_param("scene").unwrap_or_else(|| "example".to_string()),
            width,
            height,
            image: Mutex::new(vec![0; width * height * 3]),
            thread_steps: Mutex::new(Vec::new()),
            rows_shaded: AtomicUsize::new(0),
        }
    }

    pub fn rows_shaded(&self) -> usize {
        self.rows_shaded.load(Ordering::SeqCst)
    }

    /// Copy of the shaded image, for hosts that want the output.
    pub fn image(&self) -> Vec<u8> {
        self.image.lock().unwrap().clone()
    }

    fn shade_row(&self, row: usize) -> Vec<u8> {
        let mut line = Vec::with_capacity(self.width * 3);
        // Scene name seeds the palette so different scenes are visibly
        // different.
        let seed = self
            .scene
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        let tint = (seed % 128) as f32 / 255.0;

        for col in 0..self.width {
            let u = col as f32 / self.width as f32;
            let v = row as f32 / self.height as f32;

            // Sky gradient over a checkered floor.
            let (r, g, b) = if v < 0.5 {
                let t = v * 2.0;
                (0.5 + 0.5 * t * tint, 0.7, 1.0 - 0.3 * t)
            } else {
                let fu = (u * 16.0) as usize;
                let fv = ((v - 0.5) * 16.0) as usize;
                if (fu + fv) % 2 == 0 {
                    (0.9, 0.9 - tint, 0.8)
                } else {
                    (0.2 + tint, 0.2, 0.25)
                }
            };
            line.push((r.clamp(0.0, 1.0) * 255.0) as u8);
            line.push((g.clamp(0.0, 1.0) * 255.0) as u8);
            line.push((b.clamp(0.0, 1.0) * 255.0) as u8);
        }
        line
    }
}

impl Executor for RaytracerExecutor {
    fn execute_step(&self, thread_index: usize, thread_count: usize) -> StepStatus {
        let step = {
            let mut steps = self.thread_steps.lock().unwrap();
            if steps.len() < thread_count {
                steps.resize(thread_count, 0);
            }
            let step = steps[thread_index];
            steps[thread_index] += 1;
            step
        };

        let row = step * thread_count + thread_index;
        if row >= self.height {
            // This worker is out of rows; by the end of this step every
            // sibling has shaded its last one too.
            return StepStatus::Stop;
        }

        let line = self.shade_row(row);
        {
            let mut image = self.image.lock().unwrap();
            let offset = row * self.width * 3;
            image[offset..offset + self.width * 3].copy_from_slice(&line);
        }

        let shaded = self.rows_shaded.fetch_add(1, Ordering::SeqCst) + 1;
        if shaded == self.height {
            println!("raytracer: scene '{}' complete ({} rows)", self.scene, self.height);
        }
        StepStatus::Continue
    }
}

pub fn make_raytracer(task: Box<dyn Task>) -> Box<dyn Executor> {
    Box::new(RaytracerExecutor::new(task))
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
    registrar.register("raytracer", make_raytracer);
}
