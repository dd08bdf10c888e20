//! Fan-out/fan-in over consumables
//!
//! Every submission increments the consumable current at submission time.
//! A wait installs a fresh successor consumable (with the old one as its
//! predecessor) so that the waiter observes exactly the work submitted
//! before the call while later submissions accrue to the successor - and
//! parallel waiters stay ordered through the predecessor chain.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ops;
use taskq_core::consumable::Consumable;
use taskq_core::operation::Operation;
use taskq_core::priority::QueuePriority;
use taskq_core::traits::{QueueImpl, WorkerPool};

/// Group engine, see module docs
pub struct Group {
    pool: Arc<dyn WorkerPool>,
    /// Consumable new submissions attach to; swapped by `wait`. Both the
    /// attach and the swap run under this lock so a submission can never
    /// land between a waiter's load and its swap.
    current: Mutex<Arc<Consumable>>,
}

impl Group {
    pub fn new(pool: Arc<dyn WorkerPool>) -> Group {
        Group {
            pool,
            current: Mutex::new(Arc::new(Consumable::new(0))),
        }
    }

    /// Submit an operation to `queue`, tracked by this group
    pub fn submit(&self, op: Arc<Operation>, queue: &Arc<dyn QueueImpl>) {
        let consumable = {
            let current = self.current.lock().unwrap();
            current.add_resource();
            Arc::clone(&current)
        };
        queue.submit(ops::consuming_operation(op, consumable));
    }

    /// Block until all operations submitted before this call have returned
    ///
    /// Returns false when the timeout expired first. Note this will not
    /// work when invoked from within an operation active on the same queue
    /// as one of the tracked operations.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let old = {
            let mut current = self.current.lock().unwrap();
            let old = Arc::clone(&current);
            *current = Arc::new(Consumable::with_predecessor(0, Arc::clone(&old)));
            old
        };
        old.wait_for_consumed(timeout)
    }

    /// Post `op` to `queue` once all currently tracked operations returned
    ///
    /// A transient pool worker performs the wait; it declares itself
    /// blocked so the pool keeps its throughput.
    pub fn notify(self: &Arc<Self>, op: Arc<Operation>, queue: Arc<dyn QueueImpl>) {
        let group = Arc::clone(self);
        let pool = Arc::clone(&self.pool);
        let watcher = Operation::new(move || {
            pool.notify_thread_blocked();
            group.wait(None);
            pool.notify_thread_unblocked();
            queue.submit(Arc::clone(&op));
        });
        self.pool.execute(watcher, QueuePriority::Default);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ParallelQueue;
    use crate::pool::ThreadPool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use taskq_core::barrier::LightweightBarrier;

    fn test_queue() -> Arc<dyn QueueImpl> {
        Arc::new(ParallelQueue::new(
            ThreadPool::global() as Arc<dyn WorkerPool>,
            QueuePriority::Default,
        ))
    }

    #[test]
    fn test_wait_sees_all_submissions() {
        let group = Group::new(ThreadPool::global() as Arc<dyn WorkerPool>);
        let queue = test_queue();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let counter = Arc::clone(&count);
            group.submit(
                Operation::once(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                &queue,
            );
        }

        assert!(group.wait(Some(Duration::from_secs(5))));
        assert_eq!(count.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_wait_on_empty_group_returns() {
        let group = Group::new(ThreadPool::global() as Arc<dyn WorkerPool>);
        assert!(group.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_wait_times_out_on_stuck_work() {
        let group = Group::new(ThreadPool::global() as Arc<dyn WorkerPool>);
        let queue = test_queue();
        let release = Arc::new(LightweightBarrier::new());

        let gate = Arc::clone(&release);
        group.submit(
            Operation::once(move || {
                gate.wait(None);
            }),
            &queue,
        );

        assert!(!group.wait(Some(Duration::from_millis(50))));
        release.complete();
    }

    #[test]
    fn test_submissions_after_wait_attach_to_successor() {
        let group = Group::new(ThreadPool::global() as Arc<dyn WorkerPool>);
        let queue = test_queue();

        // an empty wait swaps in the successor
        assert!(group.wait(Some(Duration::from_millis(10))));

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        group.submit(
            Operation::once(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            &queue,
        );

        assert!(group.wait(Some(Duration::from_secs(5))));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notify_fires_after_completion() {
        let group = Arc::new(Group::new(ThreadPool::global() as Arc<dyn WorkerPool>));
        let queue = test_queue();
        let order = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(LightweightBarrier::new());

        let work = Arc::clone(&order);
        group.submit(
            Operation::once(move || {
                thread::sleep(Duration::from_millis(20));
                work.lock().unwrap().push("work");
            }),
            &queue,
        );

        let notified = Arc::clone(&order);
        let signal = Arc::clone(&done);
        group.notify(
            Operation::once(move || {
                notified.lock().unwrap().push("notify");
                signal.complete();
            }),
            Arc::clone(&queue),
        );

        assert!(done.wait(Some(Duration::from_secs(5))));
        assert_eq!(order.lock().unwrap().as_slice(), &["work", "notify"]);
    }
}
