//! Timer handles

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::queue::Queue;
use taskq_core::operation::Operation;
use taskq_core::traits::WorkerPool;
use taskq_runtime::pool::ThreadPool;
pub use taskq_runtime::timer::TimerPrecision;

/// Periodic timer dispatching a handler onto a target queue
///
/// A fresh timer is suspended; call `resume()` to start it and keep
/// `resume`/`suspend` balanced. `cancel()` is terminal: after it returns
/// the handler is guaranteed not to run again, waiting out an in-flight
/// invocation if necessary. Dropping the handle cancels the timer.
pub struct Timer {
    inner: Arc<taskq_runtime::timer::Timer>,
    target: Mutex<Queue>,
}

impl Timer {
    /// Create a suspended timer firing every `interval` on `target`
    pub fn new(interval: Duration, target: &Queue) -> Timer {
        Timer {
            inner: taskq_runtime::timer::Timer::new(
                ThreadPool::global() as Arc<dyn WorkerPool>,
                Arc::clone(target.implementation()),
                interval,
            ),
            target: Mutex::new(target.clone()),
        }
    }

    /// Change the interval between invocations
    pub fn interval(&self, interval: Duration) {
        self.inner.set_interval(interval);
    }

    /// Set the firing accuracy hint
    pub fn latency(&self, precision: TimerPrecision) {
        self.inner.set_precision(precision);
    }

    /// Set the closure dispatched on each fire
    pub fn handler(&self, f: impl Fn() + Send + Sync + 'static) {
        self.handler_operation(Operation::new(f));
    }

    /// `handler` with a prepared operation
    pub fn handler_operation(&self, op: Arc<Operation>) {
        self.inner.set_handler(op);
    }

    /// Redirect the handler to a different queue
    pub fn set_target_queue(&self, queue: &Queue) {
        self.inner
            .set_target_queue(Arc::clone(queue.implementation()));
        *self.target.lock().unwrap() = queue.clone();
    }

    /// The queue the handler is dispatched on
    pub fn target_queue(&self) -> Queue {
        self.target.lock().unwrap().clone()
    }

    /// Start firing immediately, balanced with `suspend`
    pub fn resume(&self) {
        self.inner.resume(Duration::ZERO);
    }

    /// Start firing after `delay`, balanced with `suspend`
    pub fn resume_after(&self, delay: Duration) {
        self.inner.resume(delay);
    }

    /// Stop firing once the balanced resume count reaches zero
    pub fn suspend(&self) {
        self.inner.suspend();
    }

    /// Terminal: stop firing and wait out an in-flight handler invocation
    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.inner.cancel();
    }
}
