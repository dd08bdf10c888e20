//! Wrapper operations used by the engine
//!
//! These compose user operations with engine bookkeeping: indexed `apply`
//! iterations, coarse delayed execution and group completion counting. The
//! wrappers themselves stay untagged so the inner operation's owner tag
//! governs `is_current_queue` during the actual call.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use taskq_core::consumable::Consumable;
use taskq_core::operation::{
    run_iteration_operation, run_operation, IterationOperation, Operation,
};

/// One iteration of an `apply` call, optionally consuming on completion
pub fn apply_operation(
    index: usize,
    op: Arc<IterationOperation>,
    consumable: Option<Arc<Consumable>>,
) -> Arc<Operation> {
    Operation::new(move || {
        run_iteration_operation(&op, index);
        if let Some(consumable) = &consumable {
            consumable.consume_resource();
        }
    })
}

/// Sleep on the executing worker, then run the wrapped operation
///
/// Coarse on purpose: the delay occupies whichever worker picked the
/// operation up.
pub fn delayed_operation(
    delay: Duration,
    op: Arc<Operation>,
    consumable: Option<Arc<Consumable>>,
) -> Arc<Operation> {
    Operation::new(move || {
        thread::sleep(delay);
        run_operation(&op);
        if let Some(consumable) = &consumable {
            consumable.consume_resource();
        }
    })
}

/// Run the wrapped operation, then consume one group resource
pub fn consuming_operation(op: Arc<Operation>, consumable: Arc<Consumable>) -> Arc<Operation> {
    Operation::new(move || {
        run_operation(&op);
        consumable.consume_resource();
    })
}
