//! Basic wpool example
//!
//! Demonstrates constructing a pool, submitting work, and a graceful stop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wpool::{Pool, PoolOptions};

fn main() {
    println!("=== wpool Basic Example ===\n");

    let pool = Pool::new(2, 4, Some(64), "basic", false, PoolOptions::default())
        .expect("valid pool configuration");
    pool.start();

    let completed = Arc::new(AtomicUsize::new(0));
    let total_items = 3;

    println!("Submitting work items...\n");

    for i in 0..total_items {
        let c = Arc::clone(&completed);
        pool.submit(move || {
            println!("[item {i}] started");
            std::thread::sleep(std::time::Duration::from_millis(20));
            println!("[item {i}] finished");
            c.fetch_add(1, Ordering::SeqCst);
        })
        .expect("pool accepts submissions while running");
    }

    println!("\nWaiting for items to complete...");
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(5);

    while completed.load(Ordering::SeqCst) < total_items {
        if start.elapsed() > timeout {
            println!("WARNING: timeout waiting for items!");
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    let count = completed.load(Ordering::SeqCst);
    println!("\n{count}/{total_items} items completed!");
    println!(
        "Workers: {} active / {} total",
        pool.active_workers(),
        pool.total_workers()
    );

    pool.stop(true);
    println!("\n=== Example Complete ===");
}
