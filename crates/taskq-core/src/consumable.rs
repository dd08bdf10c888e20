//! Counted completion token, chainable for group ordering
//!
//! Operations are modelled as resources: submission adds a resource,
//! completion consumes one. The consumer of the last resource completes a
//! one-shot barrier. Consumables chain through an optional predecessor so
//! that waiters observe FIFO ordering relative to earlier group waits.

use crate::barrier::LightweightBarrier;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Completion token, see module docs
pub struct Consumable {
    preceding: Option<Arc<Consumable>>,
    resources: AtomicUsize,
    barrier: LightweightBarrier,
}

impl Consumable {
    /// Create a token holding `resources` outstanding resources
    pub fn new(resources: usize) -> Self {
        Consumable {
            preceding: None,
            resources: AtomicUsize::new(resources),
            barrier: LightweightBarrier::new(),
        }
    }

    /// Create a token whose waits are ordered after `preceding`
    pub fn with_predecessor(resources: usize, preceding: Arc<Consumable>) -> Self {
        Consumable {
            preceding: Some(preceding),
            resources: AtomicUsize::new(resources),
            barrier: LightweightBarrier::new(),
        }
    }

    /// Add one outstanding resource
    pub fn add_resource(&self) {
        self.resources.fetch_add(1, Ordering::AcqRel);
    }

    /// Consume one resource; the last consumer completes the barrier
    pub fn consume_resource(&self) {
        let previous = self.resources.fetch_sub(1, Ordering::AcqRel);
        // the count must never go negative
        debug_assert!(previous > 0, "consumed more resources than were added");
        if previous == 1 {
            self.barrier.complete();
        }
    }

    /// Current outstanding resource count
    pub fn resources(&self) -> usize {
        self.resources.load(Ordering::Acquire)
    }

    /// Wait until every resource has been consumed
    ///
    /// Any predecessor is waited for first so chained waits stay ordered.
    /// A token whose count reads zero is satisfied immediately. `None`
    /// waits forever; returns false on timeout.
    pub fn wait_for_consumed(&self, timeout: Option<Duration>) -> bool {
        // make sure the preceding consumable is satisfied first
        if let Some(preceding) = &self.preceding {
            if !preceding.wait_for_consumed(timeout) {
                return false;
            }
        }
        // if no resources are outstanding the barrier may never complete,
        // but the consumable counts as fully satisfied
        if self.resources.load(Ordering::Acquire) == 0 {
            return true;
        }
        self.barrier.wait(timeout)
    }
}
