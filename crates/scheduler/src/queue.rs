//! Pending-task priority queue.
//!
//! A max-heap ordered by `(priority, admission order)`: higher priority wins,
//! FIFO among equals via a monotonically increasing sequence number. Entries
//! carry either a not-yet-activated task or the live executor of a preempted
//! one — a suspended task re-enters the heap with its original priority and
//! sequence and resumes stepping where it left off when it wins again.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use lockstep_core::{Executor, Task, TaskId};

/// What the dispatcher finds when an entry wins the heap.
pub(crate) enum Work {
    /// Never activated: the executor is built on activation.
    Fresh(Box<dyn Task>),
    /// Preempted mid-run: the executor keeps its partial progress.
    Suspended(Arc<dyn Executor>),
}

pub(crate) struct PendingEntry {
    pub id: TaskId,
    pub kind: String,
    pub priority: i32,
    pub seq: u64,
    pub work: Work,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: highest priority first, then lowest sequence (FIFO).
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub(crate) struct PendingQueue {
    heap: BinaryHeap<PendingEntry>,
    next_seq: u64,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Admit a fresh task. Assigns the next sequence number.
    pub fn push_fresh(&mut self, id: TaskId, kind: String, priority: i32, task: Box<dyn Task>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(PendingEntry {
            id,
            kind,
            priority,
            seq,
            work: Work::Fresh(task),
        });
    }

    /// Return a preempted entry to the heap, keeping its original sequence.
    pub fn requeue(&mut self, entry: PendingEntry) {
        self.heap.push(entry);
    }

    pub fn pop(&mut self) -> Option<PendingEntry> {
        self.heap.pop()
    }

    /// Priority of the current heap top, if any. Used for the preemption
    /// check between steps.
    pub fn top_priority(&self) -> Option<i32> {
        self.heap.peek().map(|entry| entry.priority)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
