//! Queue handles
//!
//! A `Queue` is a cheap, clonable handle onto a queue implementation. All
//! handles cloned from one another compare equal and report the same
//! identity to `is_current_queue`. The implementation underneath lives
//! until the last handle *and* any operations still in flight have
//! released it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use taskq_core::operation::{is_current_owner, IterationOperation, Operation, OwnerTag};
use taskq_core::priority::QueuePriority;
use taskq_core::traits::{queue_impl_tag, QueueImpl, WorkerPool};
use taskq_runtime::pool::ThreadPool;
use taskq_runtime::serial::SerialQueue;

/// Handle onto a serial or parallel queue, see module docs
#[derive(Clone)]
pub struct Queue {
    label: String,
    inner: Arc<dyn QueueImpl>,
}

impl Queue {
    /// Create a new serial queue scheduled on the shared pool
    ///
    /// Operations submitted to the queue execute one at a time in
    /// submission order.
    pub fn new(label: &str, priority: QueuePriority) -> Queue {
        let pool = ThreadPool::global() as Arc<dyn WorkerPool>;
        Queue::with_impl(label, Arc::new(SerialQueue::new(pool, label, priority)))
    }

    pub(crate) fn with_impl(label: &str, inner: Arc<dyn QueueImpl>) -> Queue {
        Queue {
            label: label.to_string(),
            inner,
        }
    }

    /// The label the queue was created with
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueue a closure for asynchronous execution
    pub fn submit(&self, f: impl FnOnce() + Send + 'static) {
        self.submit_operation(Operation::once(f));
    }

    /// Enqueue a prepared operation for asynchronous execution
    pub fn submit_operation(&self, op: Arc<Operation>) {
        op.bind_owner(self.tag());
        self.inner.submit(op);
    }

    /// Execute `f` with indices `0..times`, blocking until all iterations
    /// have completed
    ///
    /// On a serial queue the iterations run one at a time; calling this
    /// from an operation already running on the same serial queue
    /// deadlocks.
    pub fn apply(&self, times: usize, f: impl Fn(usize) + Send + Sync + 'static) {
        self.apply_operation(times, IterationOperation::new(f));
    }

    /// `apply` with a prepared iteration operation
    pub fn apply_operation(&self, times: usize, op: Arc<IterationOperation>) {
        op.bind_owner(self.tag());
        self.inner.apply(times, op);
    }

    /// Execute a closure once the given delay has expired
    ///
    /// The delay is coarse: it occupies a worker for its full duration and
    /// only guarantees "no earlier than".
    pub fn after(&self, delay: Duration, f: impl FnOnce() + Send + 'static) {
        self.after_operation(delay, Operation::once(f));
    }

    /// `after` with a prepared operation
    pub fn after_operation(&self, delay: Duration, op: Arc<Operation>) {
        self.inner.after(delay, op);
    }

    /// True iff called from an operation dispatched through this queue
    pub fn is_current_queue(&self) -> bool {
        is_current_owner(self.tag())
    }

    pub(crate) fn tag(&self) -> OwnerTag {
        queue_impl_tag(&self.inner)
    }

    pub(crate) fn implementation(&self) -> &Arc<dyn QueueImpl> {
        &self.inner
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Queue) -> bool {
        self.tag() == other.tag()
    }
}

impl Eq for Queue {}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue").field("label", &self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use taskq_core::barrier::LightweightBarrier;

    #[test]
    fn test_clones_compare_equal() {
        let queue = Queue::new("taskq.test.eq", QueuePriority::Default);
        let clone = queue.clone();
        assert_eq!(queue, clone);

        let other = Queue::new("taskq.test.eq", QueuePriority::Default);
        assert_ne!(queue, other);
    }

    #[test]
    fn test_label_preserved() {
        let queue = Queue::new("taskq.test.label", QueuePriority::Utility);
        assert_eq!(queue.label(), "taskq.test.label");
    }

    #[test]
    fn test_submit_executes_closure() {
        let queue = Queue::new("taskq.test.submit", QueuePriority::Default);
        let count = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(LightweightBarrier::new());

        let counter = Arc::clone(&count);
        let signal = Arc::clone(&done);
        queue.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            signal.complete();
        });

        assert!(done.wait(Some(Duration::from_secs(5))));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_is_current_queue_inside_and_outside() {
        let queue = Queue::new("taskq.test.current", QueuePriority::Default);
        let done = Arc::new(LightweightBarrier::new());

        assert!(!queue.is_current_queue());

        let probe = queue.clone();
        let signal = Arc::clone(&done);
        queue.submit(move || {
            assert!(probe.is_current_queue());
            signal.complete();
        });

        assert!(done.wait(Some(Duration::from_secs(5))));
    }
}
