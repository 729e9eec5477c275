//! lockstep-demo — drives the task system against the demo plugins.
//!
//! Loads the given plugin libraries, submits two printer tasks at different
//! priorities (the second high enough to preempt the first), and optionally a
//! raytracer task, then waits for everything to finish.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use lockstep_core::{GenericTask, RuntimeConfig};
use lockstep_scheduler::TaskSystem;

/// Demo driver for the lockstep task runtime.
#[derive(Parser, Debug)]
#[command(name = "lockstep-demo", version, about)]
struct Cli {
    /// Path to a runtime config TOML file.
    #[arg(long, env = "LOCKSTEP_CONFIG")]
    config: Option<PathBuf>,

    /// Number of worker threads (overrides config; 0 = auto).
    #[arg(long, env = "LOCKSTEP_THREADS", default_value_t = 4)]
    threads: usize,

    /// Plugin library to load (repeatable).
    #[arg(long = "plugin")]
    plugins: Vec<PathBuf>,

    /// Scene name for the raytracer task, if its plugin is loaded.
    #[arg(long, default_value = "example")]
    scene: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if cli.threads > 0 {
        config.worker_threads = cli.threads;
    }
    config.plugin_paths.extend(cli.plugins.iter().cloned());

    let system = TaskSystem::new(&config).context("starting task system")?;
    info!(
        workers = system.worker_threads(),
        kinds = ?system.executor_kinds(),
        "runtime up"
    );

    if system.executor_kinds().iter().any(|k| k == "printer") {
        run_printer_scenario(&system)?;
    }
    if system.executor_kinds().iter().any(|k| k == "raytracer") {
        run_raytracer_scenario(&system, &cli.scene)?;
    }

    info!(metrics = %serde_json::to_string(&system.metrics())?, "done");
    system.shutdown();
    Ok(())
}

/// Two printer tasks; the second is admitted mid-run at a higher priority and
/// should finish first.
fn run_printer_scenario(system: &TaskSystem) -> anyhow::Result<()> {
    let first = GenericTask::new("printer")
        .with_int("max", 100)
        .with_int("sleep", 25);
    let second = GenericTask::new("printer")
        .with_int("max", 100)
        .with_int("sleep", 25);

    let first_id = system.schedule(Box::new(first), 10)?;

    // Give the first task time to start before outranking it.
    std::thread::sleep(Duration::from_millis(300));
    let second_id = system.schedule(Box::new(second), 20)?;

    system.on_completed(first_id, |id| {
        info!(%id, "first printer task finished");
    })?;

    system.wait_for(second_id)?;
    system.wait_for(first_id)?;
    Ok(())
}

fn run_raytracer_scenario(system: &TaskSystem, scene: &str) -> anyhow::Result<()> {
    let task = GenericTask::new("raytracer").with_string("scene", scene);
    let id = system.schedule(Box::new(task), 1)?;
    system.wait_for(id)?;
    Ok(())
}
