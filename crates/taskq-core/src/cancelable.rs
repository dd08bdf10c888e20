//! Three-state gate protecting a handler against post-cancel invocation
//!
//! Timers and socket notifiers route every handler invocation through a
//! `Cancelable`. Once `disable` returns, the handler is guaranteed not to
//! run again; if an invocation was in flight on another thread, `disable`
//! blocks until it leaves. A handler disabling its own cancelable (e.g. a
//! timer cancelling itself from inside its handler) is detected through a
//! thread-local set and must not deadlock.

use crate::barrier::LightweightBarrier;
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};

const DISABLED: u8 = 0;
const ENABLED: u8 = 1;
const RUNNING: u8 = 2;

thread_local! {
    /// Cancelables currently entered on this thread, keyed by address
    static ENTERED: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Gate over {disabled, enabled, running}, see module docs
pub struct Cancelable {
    active: AtomicU8,
    barrier: LightweightBarrier,
}

impl Cancelable {
    /// Create an enabled (not disabled) cancelable
    pub fn new() -> Self {
        Cancelable {
            active: AtomicU8::new(ENABLED),
            barrier: LightweightBarrier::new(),
        }
    }

    #[inline]
    fn key(&self) -> usize {
        self as *const Cancelable as usize
    }

    /// Notify the gate that the handler is about to be invoked
    ///
    /// Succeeds only from the enabled state. Must be balanced with `leave`;
    /// prefer `CancelableScope` which manages the pair.
    ///
    /// Returns true if the handler may run.
    pub fn enter(&self) -> bool {
        if self
            .active
            .compare_exchange(ENABLED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            ENTERED.with(|set| set.borrow_mut().insert(self.key()));
            return true;
        }
        // disabled
        false
    }

    /// Notify the gate that the invocation is done
    pub fn leave(&self) {
        ENTERED.with(|set| set.borrow_mut().remove(&self.key()));
        if self
            .active
            .compare_exchange(RUNNING, ENABLED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // disabled in the meantime, release the blocked disable() call
            self.barrier.complete();
        }
    }

    /// Re-arm a disabled cancelable
    pub fn enable(&self) {
        self.active.store(ENABLED, Ordering::Release);
    }

    /// Permanently refuse further invocations
    ///
    /// When called from any thread other than one currently inside the
    /// handler, blocks until an in-flight invocation has left. When called
    /// from within the handler itself the state is stored and the call
    /// returns immediately.
    pub fn disable(&self) {
        let recursive = ENTERED.with(|set| set.borrow().contains(&self.key()));
        if recursive {
            self.active.store(DISABLED, Ordering::Release);
        } else {
            let previous = self.active.swap(DISABLED, Ordering::AcqRel);
            if previous == RUNNING {
                // tried to disable while the handler is running
                self.barrier.wait(None);
            }
        }
    }

    /// Whether the gate currently refuses invocations
    pub fn is_disabled(&self) -> bool {
        self.active.load(Ordering::Acquire) == DISABLED
    }
}

impl Default for Cancelable {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII handling of `enter` / `leave` for a cancelable
pub struct CancelableScope<'a> {
    cancelable: &'a Cancelable,
    active: bool,
}

impl<'a> CancelableScope<'a> {
    /// Enter the cancelable
    pub fn new(cancelable: &'a Cancelable) -> Self {
        let active = cancelable.enter();
        CancelableScope { cancelable, active }
    }

    /// True if the cancelable was not disabled when entering it
    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }
}

impl Drop for CancelableScope<'_> {
    fn drop(&mut self) {
        if self.active {
            self.cancelable.leave();
        }
    }
}
