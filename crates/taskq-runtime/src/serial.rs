//! Serial operation queue
//!
//! A threadsafe FIFO of operations drained one at a time even though the
//! pool underneath is concurrent. The queue posts a single reusable notify
//! operation (bound to `drain`) to the pool the first time the sequence
//! becomes non-empty; submissions that find the sequence non-empty skip the
//! wakeup because a drain is already awake or pending.
//!
//! After creation the owner must `attach` the queue so it registers with
//! the queue manager and its notification and lifetime management become
//! active. Once the owner has no further use for it, `detach` posts one
//! last barrier-like operation that unregisters the queue after everything
//! queued before it has completed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use crate::manager::QueueManager;
use crate::ops;
use crate::thread_name;
use taskq_core::consumable::Consumable;
use taskq_core::operation::{run_operation, IterationOperation, Operation};
use taskq_core::priority::QueuePriority;
use taskq_core::traits::{QueueImpl, WorkerPool};

/// FIFO of pending operations with a single-consumer drain
pub struct OperationQueue {
    label: String,
    priority: QueuePriority,
    pool: Arc<dyn WorkerPool>,
    state: Mutex<QueueState>,
}

struct QueueState {
    /// Pending operations; the front slot is emptied while its operation
    /// executes and only popped after it returned
    jobs: VecDeque<Option<Arc<Operation>>>,
    /// At most one drain call executes at any instant
    active_drain: bool,
    /// Wakeup handed to the pool on the empty -> non-empty edge; cleared
    /// on detach so no further wakeups are issued
    notify: Option<Arc<Operation>>,
}

impl OperationQueue {
    pub fn new(
        pool: Arc<dyn WorkerPool>,
        label: &str,
        priority: QueuePriority,
    ) -> Arc<OperationQueue> {
        Arc::new(OperationQueue {
            label: label.to_string(),
            priority,
            pool,
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                active_drain: false,
                notify: None,
            }),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueue a job for async execution
    ///
    /// The pool only needs a wakeup when all previous jobs have completed;
    /// otherwise a drain is still running and will pick the job up.
    pub fn submit(&self, op: Arc<Operation>) {
        let mut state = self.state.lock().unwrap();
        let wakeup = state.jobs.is_empty();
        state.jobs.push_back(Some(op));
        if wakeup {
            if let Some(notify) = state.notify.clone() {
                self.pool.execute(notify, self.priority);
            }
        }
    }

    /// Register with the queue manager and install the drain wakeup
    pub fn attach(self: &Arc<Self>) {
        let weak: Weak<OperationQueue> = Arc::downgrade(self);
        let notify = Operation::new(move || {
            if let Some(queue) = weak.upgrade() {
                queue.drain();
            }
        });

        {
            let mut state = self.state.lock().unwrap();
            state.notify = Some(notify);
        }

        QueueManager::instance().attach(Arc::clone(self));
    }

    /// Unregister from the queue manager once all queued jobs completed
    ///
    /// No further wakeups are issued after this call. When no jobs remain
    /// the queue unregisters immediately; otherwise a final marker
    /// operation queued at the tail performs the unregistration.
    pub fn detach(self: &Arc<Self>) {
        let empty = {
            let mut state = self.state.lock().unwrap();
            state.notify = None;
            state.jobs.is_empty()
        };

        let key = Arc::as_ptr(self) as usize;
        if empty {
            // nothing can get dispatched anymore, skip the tail marker and
            // unregister right away
            QueueManager::instance().detach(key);
        } else {
            self.submit(Operation::once(move || {
                QueueManager::instance().detach(key);
            }));
        }
    }

    /// Execute queued jobs until the sequence runs empty
    ///
    /// Two constraints drive the shape of this loop:
    /// 1. an entry is not removed from the sequence until AFTER it has
    ///    executed, so `submit` can probe "have all previous jobs
    ///    completed?" by checking for emptiness;
    /// 2. the operation must be released with the lock dropped so that its
    ///    destructor may submit recursively.
    fn drain(&self) {
        if taskq_core::trace::is_debug_enabled() {
            thread_name::set_current_thread_name(&self.label);
        }

        let mut state = self.state.lock().unwrap();
        state.active_drain = true;
        while !state.jobs.is_empty() {
            let job = state.jobs.front_mut().and_then(|slot| slot.take());
            drop(state);

            if let Some(job) = job {
                run_operation(&job);
                drop(job);
            }

            state = self.state.lock().unwrap();
            state.jobs.pop_front();
        }
        state.active_drain = false;
    }
}

impl Drop for OperationQueue {
    fn drop(&mut self) {
        // ensure no new notifications can get queued and wait for a
        // concurrent drain() to return before the state goes away
        loop {
            let active = {
                let mut state = self.state.lock().unwrap();
                state.notify = None;
                state.active_drain
            };
            if !active {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Serial queue implementation: one `OperationQueue` attached for its
/// lifetime to the queue manager
pub struct SerialQueue {
    queue: Arc<OperationQueue>,
}

impl SerialQueue {
    pub fn new(pool: Arc<dyn WorkerPool>, label: &str, priority: QueuePriority) -> SerialQueue {
        let queue = OperationQueue::new(pool, label, priority);
        queue.attach();
        SerialQueue { queue }
    }
}

impl QueueImpl for SerialQueue {
    fn submit(&self, op: Arc<Operation>) {
        self.queue.submit(op);
    }

    fn apply(&self, times: usize, op: Arc<IterationOperation>) {
        let completed = Arc::new(Consumable::new(times));
        for index in 0..times {
            self.queue.submit(ops::apply_operation(
                index,
                Arc::clone(&op),
                Some(Arc::clone(&completed)),
            ));
        }
        completed.wait_for_consumed(None);
    }

    fn after(&self, delay: Duration, op: Arc<Operation>) {
        self.queue.submit(ops::delayed_operation(delay, op, None));
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.queue.detach();
    }
}
