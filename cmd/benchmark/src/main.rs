//! Benchmark suite for wpool
//!
//! Measures submission latency and steady-state throughput.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use wpool::{Pool, PoolOptions};

fn main() {
    println!("=== wpool Benchmarks ===\n");

    bench_submit();
    bench_throughput();

    println!("\n=== Benchmarks Complete ===");
}

fn bench_submit() {
    println!("Benchmark: Submit (no-op items)");
    println!("{}", "-".repeat(40));

    let pool = Pool::new(4, 4, Some(1 << 20), "bench-submit", false, PoolOptions::default())
        .expect("valid pool configuration");
    pool.start();

    let iterations = 100_000;
    let start = Instant::now();
    for _ in 0..iterations {
        pool.submit(|| {}).expect("pool accepts submissions");
    }
    let elapsed = start.elapsed();

    let per_submit = elapsed.as_nanos() as f64 / iterations as f64;
    println!("  Iterations:  {iterations}");
    println!("  Total time:  {elapsed:?}");
    println!("  Per submit:  {per_submit:.1} ns");
    println!(
        "  Rate:        {:.0}/sec\n",
        iterations as f64 / elapsed.as_secs_f64()
    );

    pool.stop(true);
}

fn bench_throughput() {
    println!("Benchmark: Steady-state throughput");
    println!("{}", "-".repeat(40));

    let pool = Pool::new(0, 8, Some(4096), "bench-throughput", false, PoolOptions::default())
        .expect("valid pool configuration");
    pool.start();

    let iterations: u64 = 200_000;
    let completed = Arc::new(AtomicU64::new(0));

    let start = Instant::now();
    for _ in 0..iterations {
        let c = Arc::clone(&completed);
        pool.submit(move || {
            c.fetch_add(1, Ordering::Relaxed);
        })
        .expect("pool accepts submissions");
    }
    while completed.load(Ordering::Relaxed) < iterations {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    let elapsed = start.elapsed();

    println!("  Items:       {iterations}");
    println!("  Total time:  {elapsed:?}");
    println!(
        "  Throughput:  {:.0} items/sec",
        iterations as f64 / elapsed.as_secs_f64()
    );
    println!("  Peak workers: {}\n", pool.total_workers());

    pool.stop(true);
}
