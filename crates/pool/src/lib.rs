//! Gang-stepping worker pool.
//!
//! A [`ThreadPool`] owns a fixed set of OS threads for its lifetime and runs
//! one executor at a time across *all* of them collectively: each dispatch is
//! a single step, every worker calls `execute_step` once with its own index,
//! and the pool forms a full barrier before the next step may begin. The pool
//! is deliberately not a work-queue — it assumes a single disciplined owner
//! (the scheduler's dispatch thread) and enforces its contract with panics.

pub mod pool;

pub use pool::ThreadPool;
