//! Socket notifier handles

use std::sync::{Arc, Mutex};

use crate::queue::Queue;
use taskq_core::operation::{NotifierKind, NotifierOperation, Socket};
use taskq_core::traits::WorkerPool;
use taskq_runtime::pool::ThreadPool;

/// Readiness notification for a socket-like descriptor
///
/// Watches the descriptor for read or write readiness and dispatches the
/// handler onto the target queue, at most one invocation in flight at a
/// time. The descriptor stays owned by the application. `resume`/`suspend`
/// must stay balanced; `cancel()` is terminal and dropping the handle
/// cancels the watch.
pub struct SocketNotifier {
    inner: Arc<taskq_runtime::notifier::SocketNotifier>,
    target: Mutex<Queue>,
}

impl SocketNotifier {
    /// Create a suspended notifier for `socket` in direction `kind`
    pub fn new(socket: Socket, kind: NotifierKind, target: &Queue) -> SocketNotifier {
        SocketNotifier {
            inner: taskq_runtime::notifier::SocketNotifier::new(
                ThreadPool::global() as Arc<dyn WorkerPool>,
                Arc::clone(target.implementation()),
                socket,
                kind,
            ),
            target: Mutex::new(target.clone()),
        }
    }

    /// Set the closure dispatched on readiness
    ///
    /// The closure receives the watched descriptor and direction.
    pub fn handler(&self, f: impl Fn(Socket, NotifierKind) + Send + Sync + 'static) {
        self.handler_operation(NotifierOperation::new(f));
    }

    /// `handler` with a prepared operation
    pub fn handler_operation(&self, op: Arc<NotifierOperation>) {
        op.bind_owner(self.target.lock().unwrap().tag());
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

    /// The watched descriptor
    pub fn socket(&self) -> Socket {
        self.inner.socket()
    }

    /// The watched direction
    pub fn kind(&self) -> NotifierKind {
        self.inner.kind()
    }

    /// Start watching, balanced with `suspend`
    pub fn resume(&self) {
        self.inner.resume();
    }

    /// Stop watching once the balanced resume count reaches zero
    pub fn suspend(&self) {
        self.inner.suspend();
    }

    /// Terminal: stop watching and wait out an in-flight handler invocation
    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl Drop for SocketNotifier {
    fn drop(&mut self) {
        self.inner.cancel();
    }
}
