//! Operations and the thread-local "current queue" marker
//!
//! An operation is a callable unit of work dispatched onto a queue. Each
//! operation carries an opaque owner tag - the identity of the queue
//! implementation it was dispatched through - which exists purely to answer
//! "am I currently running inside queue X?". The tag is installed into a
//! thread-local around the invocation and restored afterwards, so an
//! operation synchronously invoking another queue's operation still reports
//! correctly inside the inner call.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::tq_warn;

/// Raw descriptor watched by a socket notifier
pub type Socket = i32;

/// Direction a socket notifier watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    /// Readiness for reading
    Read,
    /// Readiness for writing
    Write,
}

impl std::fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifierKind::Read => write!(f, "READ"),
            NotifierKind::Write => write!(f, "WRITE"),
        }
    }
}

/// Identity of the queue implementation an operation was dispatched through
///
/// Tags compare by address; `NONE` marks an operation that was never bound
/// to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerTag(usize);

impl OwnerTag {
    /// Tag of an operation not dispatched through any queue
    pub const NONE: OwnerTag = OwnerTag(0);

    /// Build a tag from an implementation address
    #[inline]
    pub fn from_addr(addr: usize) -> Self {
        OwnerTag(addr)
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

thread_local! {
    /// Owner tag of the operation currently executing on this thread
    static CURRENT_OWNER: Cell<usize> = const { Cell::new(0) };
}

/// Saves the current owner tag and restores it on drop
///
/// Drop-based so the restore also happens when user code panics through
/// the invocation.
struct OwnerScope {
    previous: usize,
}

impl OwnerScope {
    fn enter(tag: usize) -> Self {
        let previous = CURRENT_OWNER.with(|cell| cell.get());
        if tag != 0 {
            CURRENT_OWNER.with(|cell| cell.set(tag));
        }
        OwnerScope { previous }
    }
}

impl Drop for OwnerScope {
    fn drop(&mut self) {
        let previous = self.previous;
        CURRENT_OWNER.with(|cell| cell.set(previous));
    }
}

/// True iff the operation currently executing on this thread was
/// dispatched through the queue identified by `tag`
#[inline]
pub fn is_current_owner(tag: OwnerTag) -> bool {
    !tag.is_none() && CURRENT_OWNER.with(|cell| cell.get()) == tag.0
}

enum OperationFn {
    /// Handler the runtime may invoke repeatedly (drain wakeups, timer
    /// handlers, the waitable-queue worker)
    Shared(Box<dyn Fn() + Send + Sync>),
    /// Single-shot user submission
    Once(Mutex<Option<Box<dyn FnOnce() + Send>>>),
}

/// A callable unit of work, see module docs
pub struct Operation {
    owner: AtomicUsize,
    func: OperationFn,
}

impl Operation {
    /// Wrap a handler that may be invoked any number of times
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Arc<Operation> {
        Arc::new(Operation {
            owner: AtomicUsize::new(0),
            func: OperationFn::Shared(Box::new(f)),
        })
    }

    /// Wrap a closure invoked at most once; a second invocation is a no-op
    pub fn once(f: impl FnOnce() + Send + 'static) -> Arc<Operation> {
        Arc::new(Operation {
            owner: AtomicUsize::new(0),
            func: OperationFn::Once(Mutex::new(Some(Box::new(f)))),
        })
    }

    /// Bind the operation to the queue it is being dispatched through
    #[inline]
    pub fn bind_owner(&self, tag: OwnerTag) {
        self.owner.store(tag.0, Ordering::Release);
    }

    fn invoke(&self) {
        match &self.func {
            OperationFn::Shared(f) => f(),
            OperationFn::Once(slot) => {
                let f = slot.lock().unwrap().take();
                match f {
                    Some(f) => f(),
                    None => tq_warn!("single-shot operation invoked twice, ignoring"),
                }
            }
        }
    }
}

/// Same as [`Operation`] except an index is passed on each invocation
pub struct IterationOperation {
    owner: AtomicUsize,
    func: Box<dyn Fn(usize) + Send + Sync>,
}

impl IterationOperation {
    pub fn new(f: impl Fn(usize) + Send + Sync + 'static) -> Arc<IterationOperation> {
        Arc::new(IterationOperation {
            owner: AtomicUsize::new(0),
            func: Box::new(f),
        })
    }

    #[inline]
    pub fn bind_owner(&self, tag: OwnerTag) {
        self.owner.store(tag.0, Ordering::Release);
    }
}

/// Handler of a socket notifier, passed the descriptor and direction
pub struct NotifierOperation {
    owner: AtomicUsize,
    func: Box<dyn Fn(Socket, NotifierKind) + Send + Sync>,
}

impl NotifierOperation {
    pub fn new(f: impl Fn(Socket, NotifierKind) + Send + Sync + 'static) -> Arc<NotifierOperation> {
        Arc::new(NotifierOperation {
            owner: AtomicUsize::new(0),
            func: Box::new(f),
        })
    }

    #[inline]
    pub fn bind_owner(&self, tag: OwnerTag) {
        self.owner.store(tag.0, Ordering::Release);
    }
}

/// Invoke an operation on the calling thread with its owner tag installed
pub fn run_operation(op: &Operation) {
    let _scope = OwnerScope::enter(op.owner.load(Ordering::Acquire));
    op.invoke();
}

/// Invoke an iteration operation with its owner tag installed
pub fn run_iteration_operation(op: &IterationOperation, index: usize) {
    let _scope = OwnerScope::enter(op.owner.load(Ordering::Acquire));
    (op.func)(index);
}

/// Invoke a notifier operation with its owner tag installed
pub fn run_notifier_operation(op: &NotifierOperation, socket: Socket, kind: NotifierKind) {
    let _scope = OwnerScope::enter(op.owner.load(Ordering::Acquire));
    (op.func)(socket, kind);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_operation_runs() {
        let hit = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&hit);
        let op = Operation::once(move || flag.store(true, Ordering::SeqCst));
        run_operation(&op);
        assert!(hit.load(Ordering::SeqCst));
    }

    #[test]
    fn test_once_operation_single_shot() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let op = Operation::once(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        run_operation(&op);
        run_operation(&op);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_operation_reusable() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let op = Operation::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        run_operation(&op);
        run_operation(&op);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_owner_tag_visible_during_invocation() {
        let tag = OwnerTag::from_addr(0xbeef);
        let seen = Arc::new(AtomicBool::new(false));
        let inner = Arc::clone(&seen);
        let op = Operation::once(move || {
            inner.store(is_current_owner(tag), Ordering::SeqCst);
        });
        op.bind_owner(tag);

        assert!(!is_current_owner(tag));
        run_operation(&op);
        assert!(seen.load(Ordering::SeqCst));
        assert!(!is_current_owner(tag));
    }

    #[test]
    fn test_nested_invocation_restores_outer_tag() {
        let outer_tag = OwnerTag::from_addr(0x10);
        let inner_tag = OwnerTag::from_addr(0x20);

        let results = Arc::new(Mutex::new(Vec::new()));

        let inner_results = Arc::clone(&results);
        let inner = Operation::new(move || {
            inner_results
                .lock()
                .unwrap()
                .push((is_current_owner(outer_tag), is_current_owner(inner_tag)));
        });
        inner.bind_owner(inner_tag);

        let outer_results = Arc::clone(&results);
        let nested = Arc::clone(&inner);
        let outer = Operation::once(move || {
            outer_results
                .lock()
                .unwrap()
                .push((is_current_owner(outer_tag), is_current_owner(inner_tag)));
            run_operation(&nested);
            outer_results
                .lock()
                .unwrap()
                .push((is_current_owner(outer_tag), is_current_owner(inner_tag)));
        });
        outer.bind_owner(outer_tag);

        run_operation(&outer);

        let results = results.lock().unwrap();
        assert_eq!(results.as_slice(), &[(true, false), (false, true), (true, false)]);
    }

    #[test]
    fn test_untagged_operation_keeps_enclosing_tag() {
        let outer_tag = OwnerTag::from_addr(0x30);
        let seen = Arc::new(AtomicBool::new(false));

        let inner_seen = Arc::clone(&seen);
        let inner = Operation::new(move || {
            inner_seen.store(is_current_owner(outer_tag), Ordering::SeqCst);
        });

        let nested = Arc::clone(&inner);
        let outer = Operation::once(move || run_operation(&nested));
        outer.bind_owner(outer_tag);

        run_operation(&outer);
        assert!(seen.load(Ordering::SeqCst));
    }

    #[test]
    fn test_iteration_operation_passes_index() {
        let total = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&total);
        let op = IterationOperation::new(move |i| {
            sink.fetch_add(i, Ordering::SeqCst);
        });
        for i in 0..5 {
            run_iteration_operation(&op, i);
        }
        assert_eq!(total.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_notifier_operation_arguments() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let op = NotifierOperation::new(move |socket, kind| {
            *sink.lock().unwrap() = Some((socket, kind));
        });
        run_notifier_operation(&op, 7, NotifierKind::Write);
        assert_eq!(*seen.lock().unwrap(), Some((7, NotifierKind::Write)));
    }
}
