//! Parallel queue: a thin shard on the worker pool
//!
//! No ordering is provided across operations; dispatch simply forwards to
//! the pool with the queue's priority tag.

use std::sync::Arc;
use std::time::Duration;

use crate::ops;
use taskq_core::consumable::Consumable;
use taskq_core::operation::{IterationOperation, Operation};
use taskq_core::priority::QueuePriority;
use taskq_core::traits::{QueueImpl, WorkerPool};

pub struct ParallelQueue {
    pool: Arc<dyn WorkerPool>,
    priority: QueuePriority,
}

impl ParallelQueue {
    pub fn new(pool: Arc<dyn WorkerPool>, priority: QueuePriority) -> ParallelQueue {
        ParallelQueue { pool, priority }
    }
}

impl QueueImpl for ParallelQueue {
    fn submit(&self, op: Arc<Operation>) {
        self.pool.execute(op, self.priority);
    }

    fn apply(&self, times: usize, op: Arc<IterationOperation>) {
        let completed = Arc::new(Consumable::new(times));
        for index in 0..times {
            self.pool.execute(
                ops::apply_operation(index, Arc::clone(&op), Some(Arc::clone(&completed))),
                self.priority,
            );
        }
        completed.wait_for_consumed(None);
    }

    fn after(&self, delay: Duration, op: Arc<Operation>) {
        self.pool
            .execute(ops::delayed_operation(delay, op, None), self.priority);
    }
}
