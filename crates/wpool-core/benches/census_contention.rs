//! Throughput of the packed-census CAS loop under concurrent contention.
//!
//! Census is the one hot shared mutable field in the whole pool; this
//! benchmark exists to catch regressions in the spin/backoff discipline,
//! not to chase an absolute number.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::thread;
use wpool_core::Census;

fn bench_single_thread_inc_dec(c: &mut Criterion) {
    let census = Census::new(64);
    c.bench_function("census_inc_dec_uncontended", |b| {
        b.iter(|| {
            black_box(census.inc_total(64));
            black_box(census.dec_total(0));
        })
    });
}

fn bench_contended(c: &mut Criterion) {
    c.bench_function("census_inc_total_8_threads", |b| {
        b.iter(|| {
            let census = Arc::new(Census::new(64));
            let mut handles = Vec::new();
            for _ in 0..8 {
                let census = Arc::clone(&census);
                handles.push(thread::spawn(move || {
                    for _ in 0..500 {
                        black_box(census.inc_total(64));
                        black_box(census.dec_total(0));
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_single_thread_inc_dec, bench_contended);
criterion_main!(benches);
