//! Periodic timer driven by a blocked pool worker
//!
//! `resume` and `suspend` are balanced: the 0 -> 1 transition borrows a
//! long-lived helper from the pool which sleeps the start delay and then
//! loops posting the handler to the target queue and sleeping the interval.
//! The helper declares itself blocked so the pool compensates with an extra
//! thread while the timer runs. The 1 -> 0 transition lets the helper exit
//! on its next wake. `cancel` is terminal and waits out an in-flight
//! handler invocation through the cancelable gate.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use taskq_core::cancelable::{Cancelable, CancelableScope};
use taskq_core::operation::{run_operation, Operation};
use taskq_core::priority::QueuePriority;
use taskq_core::traits::{QueueImpl, WorkerPool};

/// Requested firing accuracy
///
/// Advisory; this engine stores the tag and fires on plain sleeps either
/// way. An engine backed by a host timer facility may translate it to the
/// native tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPrecision {
    Coarse,
    Default,
    Precise,
}

/// Timer engine, see module docs
pub struct Timer {
    pool: Arc<dyn WorkerPool>,
    cancelable: Arc<Cancelable>,
    state: Mutex<TimerState>,
}

struct TimerState {
    interval: Duration,
    precision: TimerPrecision,
    queue: Arc<dyn QueueImpl>,
    handler: Option<Arc<Operation>>,
    /// Balanced resume/suspend count; the helper runs while positive
    running: usize,
    cancelled: bool,
}

impl Timer {
    pub fn new(
        pool: Arc<dyn WorkerPool>,
        queue: Arc<dyn QueueImpl>,
        interval: Duration,
    ) -> Arc<Timer> {
        Arc::new(Timer {
            pool,
            cancelable: Arc::new(Cancelable::new()),
            state: Mutex::new(TimerState {
                interval,
                precision: TimerPrecision::Default,
                queue,
                handler: None,
                running: 0,
                cancelled: false,
            }),
        })
    }

    pub fn set_interval(&self, interval: Duration) {
        let mut state = self.state.lock().unwrap();
        state.interval = interval;
    }

    pub fn set_precision(&self, precision: TimerPrecision) {
        let mut state = self.state.lock().unwrap();
        state.precision = precision;
    }

    pub fn precision(&self) -> TimerPrecision {
        self.state.lock().unwrap().precision
    }

    pub fn set_handler(&self, op: Arc<Operation>) {
        let mut state = self.state.lock().unwrap();
        state.handler = Some(op);
    }

    pub fn set_target_queue(&self, queue: Arc<dyn QueueImpl>) {
        let mut state = self.state.lock().unwrap();
        state.queue = queue;
    }

    /// Start firing after `delay`, balanced with `suspend`
    ///
    /// Only the transition to a positive running count borrows the helper;
    /// nested resumes merely increment the count.
    pub fn resume(self: &Arc<Self>, delay: Duration) {
        let mut state = self.state.lock().unwrap();
        assert!(!state.cancelled, "timer resumed after cancel");
        debug_assert!(
            !state.interval.is_zero(),
            "timer interval must be set before resume"
        );

        state.running += 1;
        if state.running != 1 {
            // only proceed when we become runnable
            return;
        }
        drop(state);

        // the timer executes via a helper borrowed from the pool; the pool
        // is notified so enough threads stay available even though the
        // helper blocks while the timer is active
        let timer = Arc::clone(self);
        let helper = Operation::new(move || timer.run_helper(delay));
        self.pool.execute(helper, QueuePriority::Default);
    }

    /// Stop firing once the balanced resume count reaches zero
    pub fn suspend(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(state.running > 0, "unbalanced timer suspend");
        state.running -= 1;
    }

    /// Terminal: stop firing and wait out an in-flight handler invocation
    ///
    /// Safe to call from inside the handler itself; the cancelable detects
    /// the recursion and does not deadlock.
    pub fn cancel(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            state.running = 0;
        }
        self.cancelable.disable();
    }

    fn run_helper(&self, delay: Duration) {
        self.pool.notify_thread_blocked();

        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.state.lock().unwrap();
        while state.running > 0 {
            let handler = state.handler.clone();
            let interval = state.interval;
            let queue = Arc::clone(&state.queue);
            drop(state);

            if let Some(handler) = handler {
                let gate = Arc::clone(&self.cancelable);
                queue.submit(Operation::new(move || {
                    let scope = CancelableScope::new(&gate);
                    if scope.active() {
                        run_operation(&handler);
                    }
                }));
            }
            thread::sleep(interval);

            state = self.state.lock().unwrap();
        }
        drop(state);

        self.pool.notify_thread_unblocked();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.cancelled = true;
        state.running = 0;
    }
}
