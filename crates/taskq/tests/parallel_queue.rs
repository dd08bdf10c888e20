//! Parallel queue apply and fan-out

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskq::{global_queue, Group, QueuePriority};

#[test]
fn test_apply_runs_all_iterations() {
    let queue = global_queue(QueuePriority::Default);
    let counter = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&counter);
    queue.apply(10_000, move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    // apply blocks until every iteration has completed
    assert_eq!(counter.load(Ordering::SeqCst), 10_000);
}

#[test]
fn test_apply_passes_each_index_once() {
    let queue = global_queue(QueuePriority::Utility);
    let total = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&total);
    queue.apply(1_000, move |index| {
        sink.fetch_add(index, Ordering::SeqCst);
    });

    assert_eq!(total.load(Ordering::SeqCst), 1_000 * 999 / 2);
}

#[test]
fn test_fanout_across_priorities() {
    let group = Group::new();
    let count = Arc::new(AtomicUsize::new(0));

    for priority in QueuePriority::iter() {
        for _ in 0..20 {
            let counter = Arc::clone(&count);
            group.submit(&global_queue(priority), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
    }

    assert!(group.wait(Some(Duration::from_secs(10))));
    assert_eq!(count.load(Ordering::SeqCst), 100);
}
