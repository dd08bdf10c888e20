//! Group wait, notify and reuse

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use taskq::{Group, Queue, QueuePriority};

#[test]
fn test_wait_spanning_many_serial_queues() {
    let group = Group::new();
    let count = Arc::new(AtomicUsize::new(0));

    let queues: Vec<Queue> = (0..100)
        .map(|i| Queue::new(&format!("taskq.test.group-sub-{}", i), QueuePriority::Default))
        .collect();

    for queue in &queues {
        let counter = Arc::clone(&count);
        group.submit(queue, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert!(group.wait(Some(Duration::from_secs(10))));
    assert_eq!(count.load(Ordering::SeqCst), 100);
}

#[test]
fn test_notify_runs_exactly_once() {
    let group = Group::new();
    let work_queue = Queue::new("taskq.test.group-work", QueuePriority::Default);
    let notify_queue = Queue::new("taskq.test.group-notify", QueuePriority::Default);

    let completed = Arc::new(AtomicUsize::new(0));
    let notified = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    for _ in 0..10 {
        let counter = Arc::clone(&completed);
        group.submit(&work_queue, move || {
            std::thread::sleep(Duration::from_millis(2));
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    let seen = Arc::clone(&completed);
    let count = Arc::clone(&notified);
    group.notify(&notify_queue, move || {
        // every tracked operation returned before the notification fires
        assert_eq!(seen.load(Ordering::SeqCst), 10);
        count.fetch_add(1, Ordering::SeqCst);
        tx.send(()).unwrap();
    });

    rx.recv_timeout(Duration::from_secs(10)).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[test]
fn test_group_reuse_after_empty() {
    let group = Group::new();
    let queue = Queue::new("taskq.test.group-reuse", QueuePriority::Default);

    for round in 1..=3 {
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..round * 5 {
            let counter = Arc::clone(&count);
            group.submit(&queue, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(group.wait(Some(Duration::from_secs(10))));
        assert_eq!(count.load(Ordering::SeqCst), round * 5);
    }
}

#[test]
fn test_wait_timeout_leaves_group_usable() {
    let group = Group::new();
    let queue = Queue::new("taskq.test.group-timeout", QueuePriority::Default);
    let (release_tx, release_rx) = mpsc::channel::<()>();

    group.submit(&queue, move || {
        release_rx.recv().ok();
    });

    assert!(!group.wait(Some(Duration::from_millis(30))));

    release_tx.send(()).unwrap();
    assert!(group.wait(Some(Duration::from_secs(10))));
}

#[test]
fn test_concurrent_waiters_all_observe_completion() {
    let group = Group::new();
    let queue = Queue::new("taskq.test.group-waiters", QueuePriority::Default);
    let count = Arc::new(AtomicUsize::new(0));

    for _ in 0..20 {
        let counter = Arc::clone(&count);
        group.submit(&queue, move || {
            std::thread::sleep(Duration::from_millis(1));
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    let mut waiters = Vec::new();
    for _ in 0..4 {
        let group = group.clone();
        waiters.push(std::thread::spawn(move || {
            group.wait(Some(Duration::from_secs(10)))
        }));
    }

    for waiter in waiters {
        assert!(waiter.join().unwrap());
    }
    assert_eq!(count.load(Ordering::SeqCst), 20);
}
