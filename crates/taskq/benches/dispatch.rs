//! Dispatch throughput benchmarks

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use taskq::{global_queue, Group, Queue, QueuePriority, WaitableQueue};

fn bench_serial_submit(c: &mut Criterion) {
    let queue = Queue::new("taskq.bench.serial", QueuePriority::Default);
    let group = Group::new();

    c.bench_function("serial_submit_1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                group.submit(&queue, || {});
            }
            assert!(group.wait(Some(Duration::from_secs(60))));
        })
    });
}

fn bench_parallel_apply(c: &mut Criterion) {
    let queue = global_queue(QueuePriority::Default);

    c.bench_function("parallel_apply_1000", |b| {
        b.iter(|| {
            let count = Arc::new(AtomicUsize::new(0));
            let sink = Arc::clone(&count);
            queue.apply(1000, move |_| {
                sink.fetch_add(1, Ordering::Relaxed);
            });
            assert_eq!(count.load(Ordering::Relaxed), 1000);
        })
    });
}

fn bench_group_fanout(c: &mut Criterion) {
    let queues: Vec<Queue> = (0..8)
        .map(|i| Queue::new(&format!("taskq.bench.fanout-{}", i), QueuePriority::Default))
        .collect();

    c.bench_function("group_fanout_8x64", |b| {
        b.iter(|| {
            let group = Group::new();
            for queue in &queues {
                for _ in 0..64 {
                    group.submit(queue, || {});
                }
            }
            assert!(group.wait(Some(Duration::from_secs(60))));
        })
    });
}

fn bench_waitable_roundtrip(c: &mut Criterion) {
    let queue = WaitableQueue::new("taskq.bench.waitable", QueuePriority::Default);

    c.bench_function("waitable_submit_wait_100", |b| {
        b.iter(|| {
            for _ in 0..100 {
                queue.submit(|| {});
            }
            queue.wait_for_all();
        })
    });
}

criterion_group!(
    benches,
    bench_serial_submit,
    bench_parallel_apply,
    bench_group_fanout,
    bench_waitable_roundtrip
);
criterion_main!(benches);
