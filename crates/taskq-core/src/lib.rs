//! # taskq-core
//!
//! Core types and traits for the taskq dispatch runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Everything touching threads, descriptors or the clock lives in
//! `taskq-runtime`.
//!
//! ## Modules
//!
//! - `operation` - units of work and the thread-local current-queue marker
//! - `barrier` - one-shot signal with lazy waiter allocation
//! - `cancelable` - three-state gate protecting handlers after cancellation
//! - `consumable` - counted completion token, chainable for group ordering
//! - `priority` - queue priority tags
//! - `traits` - engine seam traits (worker pool, queue implementation)
//! - `trace` - leveled stderr tracing macros
//! - `env` - environment variable utilities

pub mod barrier;
pub mod cancelable;
pub mod consumable;
pub mod env;
pub mod operation;
pub mod priority;
pub mod trace;
pub mod traits;

// Re-exports for convenience
pub use barrier::LightweightBarrier;
pub use cancelable::{Cancelable, CancelableScope};
pub use consumable::Consumable;
pub use env::{env_get, env_get_bool, env_is_set};
pub use operation::{
    is_current_owner, run_iteration_operation, run_notifier_operation, run_operation,
    IterationOperation, NotifierKind, NotifierOperation, Operation, OwnerTag, Socket,
};
pub use priority::QueuePriority;
pub use traits::{queue_impl_tag, QueueImpl, WorkerPool};
