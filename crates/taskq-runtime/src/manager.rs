//! Root owner for all serial operation queues
//!
//! A serial-queue handle may go out of scope in the caller while operations
//! are still in flight. The manager holds a share of every attached queue
//! and releases it only after the queue's detach marker has drained, so the
//! implementation lives exactly until the last operation has returned.
//!
//! Registry mutations run on a private background thread; `attach` and
//! `detach` are therefore safe to call from any thread at any time. The
//! manager is a process-wide singleton and intentionally leaked so it
//! outlives any other static during shutdown.

use std::sync::{Arc, Mutex, OnceLock};

use crate::manual::DedicatedThread;
use crate::serial::OperationQueue;
use taskq_core::operation::Operation;
use taskq_core::priority::QueuePriority;

/// Lifetime keeper for serial queues, see module docs
pub struct QueueManager {
    thread: DedicatedThread,
    queues: Mutex<Vec<Arc<OperationQueue>>>,
}

impl QueueManager {
    /// The global instance
    pub fn instance() -> &'static QueueManager {
        static INSTANCE: OnceLock<&'static QueueManager> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            Box::leak(Box::new(QueueManager {
                thread: DedicatedThread::new("taskq.queue-manager", QueuePriority::Background),
                queues: Mutex::new(Vec::new()),
            }))
        })
    }

    /// Keep the queue alive until explicitly detached again
    pub fn attach(&'static self, queue: Arc<OperationQueue>) {
        self.thread.execute(Operation::once(move || {
            self.queues.lock().unwrap().push(queue);
        }));
    }

    /// Release the queue registered under the given address
    ///
    /// Once the posted removal has run the queue may go out of scope at
    /// any time - there is no guarantee as to when.
    pub fn detach(&'static self, key: usize) {
        self.thread.execute(Operation::once(move || {
            self.queues
                .lock()
                .unwrap()
                .retain(|queue| Arc::as_ptr(queue) as usize != key);
        }));
    }

    #[cfg(test)]
    fn registered(&self, key: usize) -> bool {
        self.queues
            .lock()
            .unwrap()
            .iter()
            .any(|queue| Arc::as_ptr(queue) as usize == key)
    }
}
