//! Readiness notification on a socket-like descriptor
//!
//! A long-lived helper borrowed from the pool watches the descriptor with a
//! bounded poll (5 second timeout so cancellation is observed even on an
//! idle descriptor) and posts the handler to the target queue whenever the
//! watched direction becomes ready. A barrier serializes dispatches so one
//! readiness produces at most one handler invocation in flight at a time.
//!
//! Write watches sleep 50 ms after each dispatch: some platforms keep
//! reporting writability while the transmit buffer is actually full, and
//! the yield stops the watch from spinning.

use std::os::fd::BorrowedFd;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use taskq_core::barrier::LightweightBarrier;
use taskq_core::cancelable::{Cancelable, CancelableScope};
use taskq_core::operation::{
    run_notifier_operation, NotifierKind, NotifierOperation, Operation, Socket,
};
use taskq_core::priority::QueuePriority;
use taskq_core::tq_warn;
use taskq_core::traits::{QueueImpl, WorkerPool};

/// Bounded poll interval so a stopped notifier is noticed
const WATCH_TIMEOUT_MS: u16 = 5_000;

/// Post-dispatch yield for spuriously writable descriptors
const WRITE_YIELD: Duration = Duration::from_millis(50);

/// Readiness watch engine, see module docs
pub struct SocketNotifier {
    pool: Arc<dyn WorkerPool>,
    cancelable: Arc<Cancelable>,
    socket: Socket,
    kind: NotifierKind,
    state: Mutex<NotifierState>,
}

struct NotifierState {
    queue: Arc<dyn QueueImpl>,
    handler: Option<Arc<NotifierOperation>>,
    /// Balanced resume/suspend count; the helper runs while positive
    running: usize,
    cancelled: bool,
}

impl SocketNotifier {
    pub fn new(
        pool: Arc<dyn WorkerPool>,
        queue: Arc<dyn QueueImpl>,
        socket: Socket,
        kind: NotifierKind,
    ) -> Arc<SocketNotifier> {
        Arc::new(SocketNotifier {
            pool,
            cancelable: Arc::new(Cancelable::new()),
            socket,
            kind,
            state: Mutex::new(NotifierState {
                queue,
                handler: None,
                running: 0,
                cancelled: false,
            }),
        })
    }

    pub fn socket(&self) -> Socket {
        self.socket
    }

    pub fn kind(&self) -> NotifierKind {
        self.kind
    }

    pub fn set_handler(&self, op: Arc<NotifierOperation>) {
        let mut state = self.state.lock().unwrap();
        state.handler = Some(op);
    }

    pub fn set_target_queue(&self, queue: Arc<dyn QueueImpl>) {
        let mut state = self.state.lock().unwrap();
        state.queue = queue;
    }

    /// Start watching, balanced with `suspend`
    pub fn resume(self: &Arc<Self>) {
        let mut state = self.state.lock().unwrap();
        assert!(!state.cancelled, "socket notifier resumed after cancel");

        state.running += 1;
        if state.running != 1 {
            // only proceed when we become runnable
            return;
        }
        drop(state);

        // the watch executes via a helper borrowed from the pool; the pool
        // is notified so enough threads stay available even though the
        // helper blocks while the notifier is active
        let notifier = Arc::clone(self);
        let helper = Operation::new(move || notifier.run_helper());
        self.pool.execute(helper, QueuePriority::Default);
    }

    /// Stop watching once the balanced resume count reaches zero
    pub fn suspend(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(state.running > 0, "unbalanced socket notifier suspend");
        state.running -= 1;
    }

    /// Terminal: stop watching and wait out an in-flight handler invocation
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

    fn run_helper(&self) {
        self.pool.notify_thread_blocked();

        loop {
            if self.state.lock().unwrap().running == 0 {
                break;
            }

            let readiness = wait_for_readiness(self.socket, self.kind);

            if self.state.lock().unwrap().running == 0 {
                break;
            }

            match readiness {
                Ok(false) => {
                    // timeout, poll again
                }
                Ok(true) => self.dispatch_ready(),
                Err(Errno::EBADF) => {
                    // descriptor was closed somewhere else
                    tq_warn!("socket notifier: socket {} is invalid", self.socket);
                    break;
                }
                Err(err) => {
                    tq_warn!("socket notifier: poll({}) failed: {}", self.socket, err);
                }
            }
        }

        self.pool.notify_thread_unblocked();
    }

    /// Post one guarded handler invocation and wait for it to return
    fn dispatch_ready(&self) {
        let (handler, queue) = {
            let state = self.state.lock().unwrap();
            (state.handler.clone(), Arc::clone(&state.queue))
        };
        let handler = match handler {
            Some(handler) => handler,
            None => return,
        };

        let barrier = Arc::new(LightweightBarrier::new());
        let signal = Arc::clone(&barrier);
        let gate = Arc::clone(&self.cancelable);
        let socket = self.socket;
        let kind = self.kind;
        queue.submit(Operation::new(move || {
            {
                let scope = CancelableScope::new(&gate);
                if scope.active() {
                    run_notifier_operation(&handler, socket, kind);
                }
            }
            signal.complete();
        }));
        barrier.wait(None);

        if kind == NotifierKind::Write {
            thread::sleep(WRITE_YIELD);
        }
    }
}

impl Drop for SocketNotifier {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.cancelled = true;
        state.running = 0;
    }
}

/// Bounded wait for the descriptor to become ready in the given direction
///
/// Returns Ok(false) on timeout. A descriptor reporting error or hangup
/// counts as ready so the handler observes the condition on its next read
/// or write.
fn wait_for_readiness(socket: Socket, kind: NotifierKind) -> nix::Result<bool> {
    let events = match kind {
        NotifierKind::Read => PollFlags::POLLIN,
        NotifierKind::Write => PollFlags::POLLOUT,
    };

    // the descriptor is owned by the application; borrow it for this poll
    let fd = unsafe { BorrowedFd::borrow_raw(socket) };
    let mut fds = [PollFd::new(fd, events)];
    let ready = poll(&mut fds, PollTimeout::from(WATCH_TIMEOUT_MS))?;
    if ready == 0 {
        return Ok(false);
    }

    if let Some(revents) = fds[0].revents() {
        if revents.contains(PollFlags::POLLNVAL) {
            return Err(Errno::EBADF);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ParallelQueue;
    use crate::pool::ThreadPool;
    use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
    use nix::unistd::write;
    use std::os::fd::{AsRawFd, OwnedFd};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn test_queue() -> Arc<dyn QueueImpl> {
        Arc::new(ParallelQueue::new(
            ThreadPool::global() as Arc<dyn WorkerPool>,
            QueuePriority::Default,
        ))
    }

    fn test_socketpair() -> (OwnedFd, OwnedFd) {
        socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .expect("socketpair failed")
    }

    #[test]
    fn test_read_readiness_fires_handler() {
        let (reader, writer) = test_socketpair();
        let notifier = SocketNotifier::new(
            ThreadPool::global() as Arc<dyn WorkerPool>,
            test_queue(),
            reader.as_raw_fd(),
            NotifierKind::Read,
        );

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let expected = reader.as_raw_fd();
        notifier.set_handler(NotifierOperation::new(move |socket, kind| {
            assert_eq!(socket, expected);
            assert_eq!(kind, NotifierKind::Read);
            let mut buffer = [0u8; 4];
            nix::unistd::read(socket, &mut buffer).expect("read failed");
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        notifier.resume();

        write(&writer, b"ping").expect("write failed");

        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        notifier.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_write_readiness_fires() {
        let (_reader, writer) = test_socketpair();
        let notifier = SocketNotifier::new(
            ThreadPool::global() as Arc<dyn WorkerPool>,
            test_queue(),
            writer.as_raw_fd(),
            NotifierKind::Write,
        );

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        notifier.set_handler(NotifierOperation::new(move |_, kind| {
            assert_eq!(kind, NotifierKind::Write);
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        notifier.resume();

        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        notifier.cancel();
        assert!(count.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_cancel_stops_dispatch() {
        let (reader, writer) = test_socketpair();
        let notifier = SocketNotifier::new(
            ThreadPool::global() as Arc<dyn WorkerPool>,
            test_queue(),
            reader.as_raw_fd(),
            NotifierKind::Read,
        );

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        notifier.set_handler(NotifierOperation::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        notifier.resume();
        notifier.cancel();

        write(&writer, b"late").expect("write failed");
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_accessors() {
        let (reader, _writer) = test_socketpair();
        let notifier = SocketNotifier::new(
            ThreadPool::global() as Arc<dyn WorkerPool>,
            test_queue(),
            reader.as_raw_fd(),
            NotifierKind::Read,
        );
        assert_eq!(notifier.socket(), reader.as_raw_fd());
        assert_eq!(notifier.kind(), NotifierKind::Read);
    }
}
