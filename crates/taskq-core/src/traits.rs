//! Engine seam traits
//!
//! Queues, timers and notifiers are built against these traits rather than
//! concrete types so that the scheduling engine stays swappable: the shared
//! auto-scaling pool, a dedicated thread and the user-driven main thread
//! all stand behind [`WorkerPool`], and every queue flavor (serial,
//! parallel, waitable wrapper) stands behind [`QueueImpl`].

use crate::operation::{Operation, IterationOperation, OwnerTag};
use crate::priority::QueuePriority;
use std::sync::Arc;
use std::time::Duration;

/// An executor that operations can be handed to
pub trait WorkerPool: Send + Sync {
    /// Queue the operation for execution
    ///
    /// The priority is a hint; implementations are free to ignore it.
    fn execute(&self, op: Arc<Operation>, priority: QueuePriority);

    /// Marks the calling worker as blocked, i.e. waiting on a resource
    ///
    /// Use this to notify the pool that it may spawn additional threads
    /// without overallocating the system's processor count, as the calling
    /// thread is blocking on a resource.
    fn notify_thread_blocked(&self) {}

    /// Marks the calling worker as unblocked, i.e. busy again
    ///
    /// Must be balanced 1:1 with `notify_thread_blocked`.
    fn notify_thread_unblocked(&self) {}
}

/// Implementation behind a queue handle
pub trait QueueImpl: Send + Sync {
    /// Enqueue the operation for asynchronous execution
    fn submit(&self, op: Arc<Operation>);

    /// Execute `op` with indices `0..times`, blocking the caller until all
    /// iterations have completed
    fn apply(&self, times: usize, op: Arc<IterationOperation>);

    /// Execute the operation after the given delay has expired
    fn after(&self, delay: Duration, op: Arc<Operation>);
}

/// Identity tag of a queue implementation, used for `is_current_queue`
/// queries and handle equality
#[inline]
pub fn queue_impl_tag(q: &Arc<dyn QueueImpl>) -> OwnerTag {
    OwnerTag::from_addr(Arc::as_ptr(q) as *const () as usize)
}
