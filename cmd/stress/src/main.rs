//! Stress test - many submitted work items
//!
//! Tests the pool's autoscaling behaviour under a large submission burst.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use wpool::{Pool, PoolOptions};

fn main() {
    println!("=== wpool Stress Test ===\n");

    let num_items: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);

    println!("Submitting {num_items} work items...");

    let pool = Pool::new(0, 32, Some(4096), "stress", false, PoolOptions::default())
        .expect("valid pool configuration");
    pool.start();

    let completed = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    for i in 0..num_items {
        let completed = Arc::clone(&completed);
        pool.submit(move || {
            completed.fetch_add(1, Ordering::Relaxed);
        })
        .expect("pool accepts submissions while running");

        if (i + 1) % 1000 == 0 {
            print!("\rSubmitted: {}/{}", i + 1, num_items);
        }
    }

    let submit_time = start.elapsed();
    println!("\n\nSubmit time: {submit_time:?}");
    println!(
        "Submit rate: {:.0} items/sec",
        num_items as f64 / submit_time.as_secs_f64()
    );

    println!("\nWaiting for completion...");
    let run_start = Instant::now();

    loop {
        let done = completed.load(Ordering::Relaxed) as usize;
        if done >= num_items {
            break;
        }
        if run_start.elapsed().as_secs() > 30 {
            println!("Timeout! Only {done}/{num_items} completed");
            break;
        }
        print!(
            "\rCompleted: {done}/{num_items} ({} workers active, {} total)",
            pool.active_workers(),
            pool.total_workers()
        );
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    let total_time = start.elapsed();
    let run_time = run_start.elapsed();

    println!("\n\n=== Results ===");
    println!("Total items:  {num_items}");
    println!("Completed:    {}", completed.load(Ordering::Relaxed));
    println!("Submit time:  {submit_time:?}");
    println!("Run time:     {run_time:?}");
    println!("Total time:   {total_time:?}");
    println!(
        "Throughput:   {:.0} items/sec",
        num_items as f64 / total_time.as_secs_f64()
    );
    println!("Peak workers: {}", pool.total_workers());

    pool.stop(true);
    println!("\n=== Stress Test Complete ===");
}
