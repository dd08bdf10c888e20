//! One-shot completion barrier with lazy waiter allocation
//!
//! A single producer completes the barrier exactly once; any number of
//! consumers may wait for it. Creation is allocation-free: the state is one
//! atomic pointer cell over three values - null (nobody waited, not
//! completed), a live waiter node, or a static "completed" sentinel. The
//! waiter node (mutex + condvar + done flag) is only allocated when a
//! thread actually has to block.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Node allocated by the first thread that actually blocks
struct Waiter {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Waiter {
    fn new() -> Self {
        Waiter {
            done: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut done = self.done.lock().unwrap();
        // an unrepresentable deadline counts as waiting forever
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        match (timeout, deadline) {
            (Some(_), Some(deadline)) => {
                while !*done {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _) = self.cond.wait_timeout(done, deadline - now).unwrap();
                    done = guard;
                }
                true
            }
            _ => {
                while !*done {
                    done = self.cond.wait(done).unwrap();
                }
                true
            }
        }
    }

    fn complete(&self) {
        let mut done = self.done.lock().unwrap();
        *done = true;
        self.cond.notify_all();
    }

    fn was_completed(&self) -> bool {
        *self.done.lock().unwrap()
    }
}

// Stable out-of-line address marking the barrier as completed. Never
// dereferenced through the atomic cell, only compared.
static COMPLETED: Waiter = Waiter {
    done: Mutex::new(true),
    cond: Condvar::new(),
};

#[inline]
fn completed_sentinel() -> *mut Waiter {
    &COMPLETED as *const Waiter as *mut Waiter
}

/// One-shot barrier, see module docs
///
/// `wait` borrows the barrier for the full duration of the block, so the
/// node installed in the cell cannot be freed underneath a waiter.
pub struct LightweightBarrier {
    owner: AtomicPtr<Waiter>,
}

impl LightweightBarrier {
    /// Create an incomplete barrier without allocating
    pub fn new() -> Self {
        LightweightBarrier {
            owner: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Block until the barrier is completed or the timeout expires
    ///
    /// `None` waits forever. Returns true iff the completion happened
    /// before the deadline.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        // check the cell first to bail out without allocating
        let previous = self.owner.load(Ordering::Acquire);
        if previous == completed_sentinel() {
            return true;
        }

        if previous.is_null() {
            // try to install our own waiter node
            let candidate = Box::into_raw(Box::new(Waiter::new()));
            match self.owner.compare_exchange(
                ptr::null_mut(),
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // we own the node now, it is freed by Drop
                    return unsafe { &*candidate }.wait(timeout);
                }
                Err(current) => {
                    // lost the race, discard our node and use the winner's
                    drop(unsafe { Box::from_raw(candidate) });
                    if current == completed_sentinel() {
                        return true;
                    }
                    return unsafe { &*current }.wait(timeout);
                }
            }
        }

        // somebody else installed a waiter node before us
        unsafe { &*previous }.wait(timeout)
    }

    /// Mark the barrier as completed, waking all waiters
    ///
    /// At most one completion is meaningful; further calls are no-ops.
    pub fn complete(&self) {
        match self.owner.compare_exchange(
            ptr::null_mut(),
            completed_sentinel(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                // nobody was waiting, cell now marked completed
            }
            Err(current) => {
                if current != completed_sentinel() {
                    // somebody is waiting on a live node
                    unsafe { &*current }.complete();
                }
            }
        }
    }

    /// Non-blocking check whether `complete` has happened
    pub fn was_completed(&self) -> bool {
        let current = self.owner.load(Ordering::Acquire);
        if current == completed_sentinel() {
            return true;
        }
        if !current.is_null() {
            return unsafe { &*current }.was_completed();
        }
        false
    }
}

impl Default for LightweightBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LightweightBarrier {
    fn drop(&mut self) {
        let owner = *self.owner.get_mut();
        if !owner.is_null() && owner != completed_sentinel() {
            drop(unsafe { Box::from_raw(owner) });
        }
    }
}
