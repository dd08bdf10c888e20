//! # taskq - general-purpose task dispatch runtime
//!
//! taskq lets application code submit units of work ("operations") to named
//! queues which are scheduled onto threads according to queue semantics and
//! priority: serial queues for single-threaded mutation, parallel queues
//! backed by a shared auto-scaling worker pool, and a cooperative main
//! queue driven by the application. On top of the queues sit grouped
//! fan-out/fan-in with completion notification, repeating timers, readiness
//! notification for socket-like descriptors, and a wait-safe queue wrapper
//! that cannot deadlock its callers.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use taskq::{global_queue, Group, Queue, QueuePriority};
//!
//! // serial queue: operations run one at a time, in order
//! let queue = Queue::new("com.example.io", QueuePriority::Default);
//! queue.submit(|| println!("first"));
//! queue.submit(|| println!("second"));
//!
//! // parallel fan-out with a blocking join
//! let group = Group::new();
//! for shard in 0..8 {
//!     group.submit(&global_queue(QueuePriority::Utility), move || {
//!         println!("processing shard {shard}");
//!     });
//! }
//! assert!(group.wait(Some(Duration::from_secs(10))));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        User Code                          │
//! │      Queue, Group, Timer, SocketNotifier, Waitable        │
//! └───────────────────────────────────────────────────────────┘
//!                │ submit / apply / after
//!                ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  serial queues ──drain──┐        parallel queues          │
//! │  (FIFO, one at a time)  │        (direct handoff)         │
//! └─────────────────────────┼─────────────────────────────────┘
//!                           ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │        shared auto-scaling pool of OS worker threads      │
//! │   (timers & notifiers borrow blocked helpers from here)   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The main queue is the exception: it is a serial queue whose backing
//! thread is whatever thread the application parks inside [`exec`].

mod global;
mod group;
#[cfg(unix)]
mod notifier;
mod queue;
mod timer;
mod waitable;

pub use global::{exec, global_queue, main_queue, quit};
pub use group::Group;
#[cfg(unix)]
pub use notifier::SocketNotifier;
pub use queue::Queue;
pub use timer::{Timer, TimerPrecision};
pub use waitable::WaitableQueue;

// Primitive re-exports for callers composing their own operations
pub use taskq_core::operation::{
    IterationOperation, NotifierKind, NotifierOperation, Operation, Socket,
};
pub use taskq_core::priority::QueuePriority;
pub use taskq_core::{Cancelable, CancelableScope, LightweightBarrier};
