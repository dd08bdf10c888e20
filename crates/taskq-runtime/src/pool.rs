//! Auto-scaling shared worker pool
//!
//! The pool starts with a concurrency budget equal to the logical CPU count
//! and spawns workers lazily as operations arrive. Long-blocking helpers
//! (timers, socket notifiers, group watchers) raise the budget through
//! `notify_thread_blocked` while they sleep so throughput is preserved, and
//! lower it again when they are done. The pool may therefore own more
//! threads than the budget while some of them are blocked; it never has
//! more *runnable* workers than the budget allows.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle};

use taskq_core::operation::{run_operation, Operation};
use taskq_core::priority::QueuePriority;
use taskq_core::traits::WorkerPool;
use taskq_core::{tq_error, tq_trace};

/// Shared auto-scaling pool, see module docs
pub struct ThreadPool {
    shared: Arc<PoolShared>,
}

struct PoolShared {
    state: Mutex<PoolState>,
    cond: Condvar,
    /// Monotonic worker counter for thread names and trace context
    spawned: AtomicUsize,
}

struct PoolState {
    /// Current concurrency budget; raised/lowered by blocked accounting
    max_threads: usize,
    threads: Vec<JoinHandle<()>>,
    idle_threads: usize,
    operations: VecDeque<Arc<Operation>>,
    cancelled: bool,
}

impl ThreadPool {
    /// Create a pool budgeted at the logical CPU count
    pub fn new() -> ThreadPool {
        let max_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::with_threads(max_threads)
    }

    /// Create a pool with an explicit concurrency budget
    pub fn with_threads(max_threads: usize) -> ThreadPool {
        tq_trace!("threadpool with {} ideal threads", max_threads);
        ThreadPool {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    max_threads,
                    threads: Vec::new(),
                    idle_threads: 0,
                    operations: VecDeque::new(),
                    cancelled: false,
                }),
                cond: Condvar::new(),
                spawned: AtomicUsize::new(0),
            }),
        }
    }

    /// The process-wide default pool
    ///
    /// Intentionally never torn down so that detached queues can drain
    /// during shutdown.
    pub fn global() -> Arc<ThreadPool> {
        static GLOBAL: OnceLock<Arc<ThreadPool>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ThreadPool::new())).clone()
    }

    /// Current concurrency budget (for tests and introspection)
    pub fn max_threads(&self) -> usize {
        self.shared.state.lock().unwrap().max_threads
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool for ThreadPool {
    fn execute(&self, op: Arc<Operation>, _priority: QueuePriority) {
        let mut state = self.shared.state.lock().unwrap();
        state.operations.push_back(op);
        PoolShared::schedule(&self.shared, &mut state);
    }

    fn notify_thread_blocked(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.max_threads += 1;
        tq_trace!("increased threads to {}", state.max_threads);
        PoolShared::schedule(&self.shared, &mut state);
    }

    fn notify_thread_unblocked(&self) {
        let mut state = self.shared.state.lock().unwrap();
        debug_assert!(state.max_threads > 0, "unbalanced notify_thread_unblocked");
        state.max_threads -= 1;
        tq_trace!("lowered threads again to {}", state.max_threads);
        PoolShared::schedule(&self.shared, &mut state);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let threads = {
            let mut state = self.shared.state.lock().unwrap();
            state.cancelled = true;
            self.shared.cond.notify_all();
            std::mem::take(&mut state.threads)
        };
        for thread in threads {
            let _ = thread.join();
        }
    }
}

impl PoolShared {
    /// Hand a pending operation to a worker; must run under the pool lock
    fn schedule(shared: &Arc<PoolShared>, state: &mut PoolState) {
        let active_threads = state.threads.len();
        // lets check if there is an idle thread first
        if state.idle_threads != 0 {
            state.idle_threads -= 1;
            shared.cond.notify_one();
        }
        // check if we are good to create another thread
        else if active_threads < state.max_threads {
            tq_trace!(
                "spawning thread #{} of {}",
                active_threads + 1,
                state.max_threads
            );
            let id = shared.spawned.fetch_add(1, Ordering::Relaxed);
            let worker = Arc::clone(shared);
            let handle = thread::Builder::new()
                .name(format!("taskq-worker-{}", id))
                .spawn(move || worker.run_thread(id))
                .expect("failed to spawn pool worker");
            state.threads.push(handle);
        }
        // all threads busy and processor allocation reached; the operation
        // will be picked up as soon as a thread becomes available
        else {
            tq_trace!(
                "fully loaded - threads={}, idle={}",
                active_threads,
                state.idle_threads
            );
        }
    }

    fn run_thread(self: Arc<PoolShared>, id: usize) {
        taskq_core::trace::set_worker_id(id as u32);

        let mut state = self.state.lock().unwrap();
        while !state.cancelled {
            if state.operations.is_empty() {
                state.idle_threads += 1;
                state = self.cond.wait(state).unwrap();
            }
            let op = state.operations.pop_front();
            drop(state);

            if let Some(op) = op {
                run_pool_operation(&op);
                drop(op);
            }

            state = self.state.lock().unwrap();
        }
        drop(state);

        tq_trace!("joining thread");
        taskq_core::trace::clear_worker_id();
    }
}

/// Execute an operation at the root of a pool worker
///
/// Release builds must not unwind across the worker loop: a panic escaping
/// user code prints a banner and terminates the process. Debug builds let
/// the panic propagate unaltered.
fn run_pool_operation(op: &Operation) {
    if cfg!(debug_assertions) {
        run_operation(op);
    } else if catch_unwind(AssertUnwindSafe(|| run_operation(op))).is_err() {
        tq_error!("operation panicked on a pool worker, terminating");
        std::process::abort();
    }
}
