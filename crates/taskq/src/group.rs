//! Group handles

use std::sync::Arc;
use std::time::Duration;

use crate::queue::Queue;
use taskq_core::operation::Operation;
use taskq_core::traits::WorkerPool;
use taskq_runtime::pool::ThreadPool;

/// Join primitive collecting completion of a set of operations
///
/// Operations submitted through a group are dispatched to the queue passed
/// alongside them; the group only tracks completion. A `wait` observes all
/// operations submitted before the call; operations submitted afterwards
/// are tracked for the next wait. Groups can be reused indefinitely.
#[derive(Clone)]
pub struct Group {
    inner: Arc<taskq_runtime::group::Group>,
}

impl Group {
    pub fn new() -> Group {
        Group {
            inner: Arc::new(taskq_runtime::group::Group::new(
                ThreadPool::global() as Arc<dyn WorkerPool>
            )),
        }
    }

    /// Submit a closure to `queue`, tracked by this group
    pub fn submit(&self, queue: &Queue, f: impl FnOnce() + Send + 'static) {
        self.submit_operation(queue, Operation::once(f));
    }

    /// Submit a prepared operation to `queue`, tracked by this group
    pub fn submit_operation(&self, queue: &Queue, op: Arc<Operation>) {
        op.bind_owner(queue.tag());
        self.inner.submit(op, queue.implementation());
    }

    /// Run a closure on `queue` once all tracked operations have returned
    pub fn notify(&self, queue: &Queue, f: impl FnOnce() + Send + 'static) {
        self.notify_operation(queue, Operation::once(f));
    }

    /// `notify` with a prepared operation
    pub fn notify_operation(&self, queue: &Queue, op: Arc<Operation>) {
        op.bind_owner(queue.tag());
        self.inner
            .notify(op, Arc::clone(queue.implementation()));
    }

    /// Block until every operation submitted before this call has returned
    ///
    /// `None` waits forever; returns false when the timeout expired first.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        self.inner.wait(timeout)
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}
