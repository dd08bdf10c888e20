//! Process-wide queues and the main-thread drain
//!
//! The main queue and the five global parallel queues are deliberate
//! singletons: they are created on first use and intentionally never torn
//! down so detached work can still drain during shutdown. This module is
//! the only place such singletons live.

use std::sync::{Arc, OnceLock};

use crate::queue::Queue;
use taskq_core::priority::QueuePriority;
use taskq_core::traits::{QueueImpl, WorkerPool};
use taskq_runtime::manual::ManualThread;
use taskq_runtime::parallel::ParallelQueue;
use taskq_runtime::pool::ThreadPool;
use taskq_runtime::serial::SerialQueue;

const MAIN_LABEL: &str = "taskq.main";

/// The manual thread backing the main queue
fn main_thread() -> &'static Arc<ManualThread> {
    static INSTANCE: OnceLock<Arc<ManualThread>> = OnceLock::new();
    INSTANCE.get_or_init(|| ManualThread::new(MAIN_LABEL, QueuePriority::Default))
}

/// The distinguished serial queue drained by the application
///
/// Operations submitted here only execute while some thread is inside
/// [`exec`].
pub fn main_queue() -> Queue {
    static INSTANCE: OnceLock<Queue> = OnceLock::new();
    INSTANCE
        .get_or_init(|| {
            let thread = Arc::clone(main_thread()) as Arc<dyn WorkerPool>;
            Queue::with_impl(
                MAIN_LABEL,
                Arc::new(SerialQueue::new(thread, MAIN_LABEL, QueuePriority::Default)),
            )
        })
        .clone()
}

/// The shared parallel queue for the given priority class
///
/// One distinct queue exists per priority tag; repeated calls return
/// handles onto the same instance.
pub fn global_queue(priority: QueuePriority) -> Queue {
    static INSTANCES: OnceLock<[Queue; QueuePriority::COUNT]> = OnceLock::new();
    let queues = INSTANCES.get_or_init(|| {
        let build = |priority: QueuePriority| {
            let label = match priority {
                QueuePriority::UserInteractive => "taskq.global.user-interactive",
                QueuePriority::UserInitiated => "taskq.global.user-initiated",
                QueuePriority::Default => "taskq.global.default",
                QueuePriority::Utility => "taskq.global.utility",
                QueuePriority::Background => "taskq.global.background",
            };
            let pool = ThreadPool::global() as Arc<dyn WorkerPool>;
            Queue::with_impl(
                label,
                Arc::new(ParallelQueue::new(pool, priority)) as Arc<dyn QueueImpl>,
            )
        };
        [
            build(QueuePriority::UserInteractive),
            build(QueuePriority::UserInitiated),
            build(QueuePriority::Default),
            build(QueuePriority::Utility),
            build(QueuePriority::Background),
        ]
    });
    queues[priority.as_index()].clone()
}

/// Drain the main queue on the calling thread until [`quit`] is called
pub fn exec() {
    main_thread().run();
}

/// Stop a running [`exec`] loop
pub fn quit() {
    main_thread().cancel();
}
