//! Threads driven outside the shared pool
//!
//! A [`ManualThread`] is a drain loop the application runs on a thread of
//! its own choosing - this is what backs the main queue via `exec()`. A
//! [`DedicatedThread`] owns an OS thread running that loop, used where the
//! runtime needs a private serial executor (the queue manager).

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::thread_name;
use taskq_core::operation::{run_operation, Operation};
use taskq_core::priority::QueuePriority;
use taskq_core::tq_debug;
use taskq_core::traits::WorkerPool;

/// User-driven drain loop, see module docs
pub struct ManualThread {
    name: String,
    priority: QueuePriority,
    state: Mutex<ManualState>,
    cond: Condvar,
}

struct ManualState {
    ops: Vec<Arc<Operation>>,
    cancelled: bool,
}

impl ManualThread {
    pub fn new(name: &str, priority: QueuePriority) -> Arc<ManualThread> {
        Arc::new(ManualThread {
            name: name.to_string(),
            priority,
            state: Mutex::new(ManualState {
                ops: Vec::new(),
                cancelled: false,
            }),
            cond: Condvar::new(),
        })
    }

    /// Queue an operation for the next drain pass
    pub fn execute(&self, op: Arc<Operation>) {
        let mut state = self.state.lock().unwrap();
        state.ops.push(op);
        self.cond.notify_all();
    }

    /// Drain queued operations on the calling thread until cancelled
    ///
    /// Operations run in submission order, one batch at a time. The
    /// cancelled flag is cleared on exit so the loop can be entered again.
    pub fn run(&self) {
        thread_name::set_current_thread_name(&self.name);
        tq_debug!("manual thread {} running at {}", self.name, self.priority);

        let mut state = self.state.lock().unwrap();
        while !state.cancelled {
            if state.ops.is_empty() {
                state = self.cond.wait(state).unwrap();
            }
            let batch = std::mem::take(&mut state.ops);
            drop(state);

            for op in &batch {
                run_operation(op);
            }
            drop(batch);

            state = self.state.lock().unwrap();
        }
        state.cancelled = false;
    }

    /// Stop the drain loop
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        state.cancelled = true;
        self.cond.notify_all();
    }
}

impl WorkerPool for ManualThread {
    fn execute(&self, op: Arc<Operation>, _priority: QueuePriority) {
        ManualThread::execute(self, op);
    }

    // a manual thread has no budget to adjust, blocked notifications are
    // accepted and ignored
}

/// A manual thread bundled with an owned OS thread running its loop
pub struct DedicatedThread {
    thread: Arc<ManualThread>,
    handle: Option<JoinHandle<()>>,
}

impl DedicatedThread {
    pub fn new(name: &str, priority: QueuePriority) -> DedicatedThread {
        let manual = ManualThread::new(name, priority);
        let runner = Arc::clone(&manual);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || runner.run())
            .expect("failed to spawn dedicated thread");
        DedicatedThread {
            thread: manual,
            handle: Some(handle),
        }
    }

    pub fn execute(&self, op: Arc<Operation>) {
        self.thread.execute(op);
    }
}

impl Drop for DedicatedThread {
    fn drop(&mut self) {
        self.thread.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
