//! Waitable queue: synchronization with queued operations that cannot
//! deadlock the waiter
//!
//! The difference to submitting a barrier-like operation is the starvation
//! rescue: when the inner queue is never scheduled (e.g. on a system
//! heavily competing for CPU), the waiter takes over and executes the
//! pending operation on its own thread instead of blocking forever.
//!
//! Operations are drained by a single reusable worker operation that pops
//! exactly one user operation per invocation inside its critical section,
//! so no operation can ever be double-executed - regardless of whether the
//! worker ran on the inner queue or synchronously on a waiter.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use crate::queue::Queue;
use taskq_core::operation::{run_operation, IterationOperation, Operation};
use taskq_core::priority::QueuePriority;
use taskq_core::tq_trace;
use taskq_core::traits::QueueImpl;
use taskq_runtime::ops;

/// Queue wrapper with `wait_for_one` / `wait_for_all`, see module docs
pub struct WaitableQueue {
    queue: Queue,
    shared: Arc<WaitableImpl>,
}

impl WaitableQueue {
    /// Create a waitable queue delegating to a private serial queue
    pub fn new(label: &str, priority: QueuePriority) -> WaitableQueue {
        Self::with_inner(label, &Queue::new(label, priority))
    }

    /// Create a waitable queue delegating to the provided queue
    ///
    /// Operations queued here and operations submitted directly to the
    /// inner queue may still execute in parallel.
    pub fn with_inner(label: &str, inner: &Queue) -> WaitableQueue {
        let shared = WaitableImpl::new(inner.clone());
        let queue = Queue::with_impl(label, shared.clone() as Arc<dyn QueueImpl>);
        WaitableQueue { queue, shared }
    }

    /// Wait for a previously queued operation to complete
    ///
    /// Returns immediately if nothing was queued at all, or if an
    /// operation completed before that has not been waited for yet.
    /// Otherwise blocks until one operation completes, executing it on the
    /// calling thread when the inner queue is starved.
    pub fn wait_for_one(&self) {
        self.shared.wait_for_one();
    }

    /// Wait for all operations queued at the time of this call
    pub fn wait_for_all(&self) {
        self.shared.wait_for_all();
    }
}

impl Deref for WaitableQueue {
    type Target = Queue;

    fn deref(&self) -> &Queue {
        &self.queue
    }
}

struct WaitableImpl {
    state: Mutex<WaitableState>,
    cond: Condvar,
    inner: Queue,
    /// Reusable drain operation, submitted to the inner queue once per
    /// user operation
    worker: OnceLock<Arc<Operation>>,
}

struct WaitableState {
    operations: VecDeque<Arc<Operation>>,
    /// Operations completed but not yet waited for
    completed: usize,
    /// A drain pass is currently executing a user operation
    active: bool,
}

impl WaitableImpl {
    fn new(inner: Queue) -> Arc<WaitableImpl> {
        let shared = Arc::new(WaitableImpl {
            state: Mutex::new(WaitableState {
                operations: VecDeque::new(),
                completed: 0,
                active: false,
            }),
            cond: Condvar::new(),
            inner,
            worker: OnceLock::new(),
        });

        let weak = Arc::downgrade(&shared);
        let worker = Operation::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.drain_one();
            }
        });
        shared
            .worker
            .set(worker)
            .unwrap_or_else(|_| unreachable!("worker installed twice"));
        shared
    }

    fn worker(&self) -> &Arc<Operation> {
        self.worker.get().expect("worker not installed")
    }

    /// Execute at most one queued user operation
    fn drain_one(&self) {
        let mut state = self.state.lock().unwrap();
        // wait for parallel executions to complete
        while state.active {
            state = self.cond.wait(state).unwrap();
        }
        // we are the active worker now
        state.active = true;
        if let Some(op) = state.operations.pop_front() {
            drop(state);
            run_operation(&op);
            state = self.state.lock().unwrap();
            state.completed += 1;
        }
        // notify we are no longer active
        state.active = false;
        drop(state);
        self.cond.notify_all();
    }

    fn wait_for_one(&self) {
        let state = self.state.lock().unwrap();
        drop(self.wait_for_one_guarded(state));
    }

    fn wait_for_all(&self) {
        let mut state = self.state.lock().unwrap();
        while !state.operations.is_empty() {
            state = self.wait_for_one_guarded(state);
        }
    }

    fn wait_for_one_guarded<'a>(
        &'a self,
        mut state: MutexGuard<'a, WaitableState>,
    ) -> MutexGuard<'a, WaitableState> {
        while state.completed == 0 {
            if state.active {
                // another thread runs an operation, waiting cannot deadlock
                tq_trace!("waiting for active operation");
                state = self.cond.wait(state).unwrap();
            } else if state.operations.is_empty() {
                // there is some chance nothing was queued to begin with
                tq_trace!("no operations to wait for");
                return state;
            } else {
                // the queue is not scheduled, take over and do the
                // processing ourselves
                drop(state);
                tq_trace!("operation queue is starving, execute directly");
                self.drain_one();
                state = self.state.lock().unwrap();
            }
        }
        state.completed -= 1;
        state
    }
}

impl QueueImpl for WaitableImpl {
    fn submit(&self, op: Arc<Operation>) {
        let mut state = self.state.lock().unwrap();
        state.operations.push_back(op);
        drop(state);
        self.inner.submit_operation(Arc::clone(self.worker()));
    }

    fn apply(&self, times: usize, op: Arc<IterationOperation>) {
        for index in 0..times {
            self.submit(ops::apply_operation(index, Arc::clone(&op), None));
        }
        self.wait_for_all();
    }

    fn after(&self, delay: Duration, op: Arc<Operation>) {
        self.submit(ops::delayed_operation(delay, op, None));
    }
}

impl Drop for WaitableImpl {
    fn drop(&mut self) {
        self.wait_for_all();
    }
}
