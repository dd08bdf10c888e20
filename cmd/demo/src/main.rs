//! Basic taskq example
//!
//! Demonstrates serial queues, group fan-out and a timer driving the
//! main queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskq::{exec, global_queue, main_queue, quit, Group, Queue, QueuePriority, Timer};

fn main() {
    println!("=== taskq Basic Example ===\n");

    // serial queue: strict submission order
    let serial = Queue::new("demo.serial", QueuePriority::Default);
    for i in 0..3 {
        serial.submit(move || println!("[serial] operation {}", i));
    }

    // group fan-out over the shared pool, joined with a wait
    let group = Group::new();
    let completed = Arc::new(AtomicUsize::new(0));
    for shard in 0..8 {
        let counter = Arc::clone(&completed);
        group.submit(&global_queue(QueuePriority::Utility), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            println!("[group] shard {} done", shard);
        });
    }
    group.wait(Some(Duration::from_secs(10)));
    println!("[group] {} shards completed\n", completed.load(Ordering::SeqCst));

    // timer posting onto the main queue; quits the exec loop after 5 ticks
    let timer = Timer::new(Duration::from_millis(300), &main_queue());
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    timer.handler(move || {
        let tick = counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[timer] tick {}", tick);
        if tick == 5 {
            quit();
        }
    });
    timer.resume();

    println!("[main] draining main queue until the timer quits");
    exec();
    timer.cancel();

    println!("\n=== Done ===");
}
