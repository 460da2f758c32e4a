//! Latency histograms for the hot paths. Run with `--ignored --nocapture`.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;

use crate::{RingWheel, WheelConfig};

const WARMUP: u64 = 10_000;
const ITERATIONS: u64 = 200_000;

fn print_histogram(name: &str, hist: &Histogram<u64>) {
    println!("\n=== {} ===", name);
    println!("  count:  {}", hist.len());
    println!("  min:    {} ns", hist.min());
    println!("  max:    {} ns", hist.max());
    println!("  mean:   {:.1} ns", hist.mean());
    println!("  p50:    {} ns", hist.value_at_quantile(0.50));
    println!("  p90:    {} ns", hist.value_at_quantile(0.90));
    println!("  p99:    {} ns", hist.value_at_quantile(0.99));
    println!("  p99.9:  {} ns", hist.value_at_quantile(0.999));
}

fn wheel() -> RingWheel<u64, u64> {
    RingWheel::with_config(WheelConfig::default().with_tick(Duration::from_millis(1))).unwrap()
}

#[test]
#[ignore]
fn hdr_add_latency() {
    let wheel = wheel();
    let mut hist = Histogram::<u64>::new(3).unwrap();

    for i in 0..WARMUP {
        wheel.add(i % 500, i, i);
    }

    for i in 0..ITERATIONS {
        let key = WARMUP + i;

        let start = Instant::now();
        wheel.add(i % 500, key, i);
        let elapsed = start.elapsed().as_nanos() as u64;

        hist.record(elapsed).unwrap();
    }

    print_histogram("Add Latency", &hist);
}

#[test]
#[ignore]
fn hdr_ttl_latency() {
    let wheel = wheel();
    for i in 0..10_000 {
        wheel.add(i % 500, i, i);
    }

    let mut hist = Histogram::<u64>::new(3).unwrap();
    for i in 0..ITERATIONS {
        let key = i % 10_000;

        let start = Instant::now();
        let ttl = wheel.ttl(&key);
        let elapsed = start.elapsed().as_nanos() as u64;

        std::hint::black_box(ttl);
        hist.record(elapsed).unwrap();
    }

    print_histogram("TTL Latency", &hist);
}

#[test]
#[ignore]
fn hdr_advance_latency() {
    let wheel = wheel();
    let mut hist = Histogram::<u64>::new(3).unwrap();

    // Keep roughly 16 entries due per slot
    for i in 0..1024u64 {
        wheel.add(i % 64, i, i);
    }

    for i in 0..ITERATIONS {
        let key = 1024 + i;
        wheel.add(63, key, i);

        let start = Instant::now();
        let expired = wheel.advance().unwrap();
        let elapsed = start.elapsed().as_nanos() as u64;

        std::hint::black_box(expired);
        hist.record(elapsed).unwrap();
    }

    print_histogram("Advance Latency", &hist);
}

#[test]
#[ignore]
fn hdr_contended_add_latency() {
    const PRODUCERS: usize = 4;

    let wheel = Arc::new(wheel());
    wheel.start().unwrap();
    let barrier = Arc::new(Barrier::new(PRODUCERS));

    let handles: Vec<_> = (0..PRODUCERS as u64)
        .map(|t| {
            let wheel = Arc::clone(&wheel);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut hist = Histogram::<u64>::new(3).unwrap();
                barrier.wait();
                for i in 0..ITERATIONS / PRODUCERS as u64 {
                    let key = t << 32 | i;

                    // Same delay from every producer to pile onto one slot
                    let start = Instant::now();
                    wheel.add(256, key, i);
                    let elapsed = start.elapsed().as_nanos() as u64;

                    hist.record(elapsed).unwrap();
                }
                hist
            })
        })
        .collect();

    let mut total = Histogram::<u64>::new(3).unwrap();
    for handle in handles {
        total.add(handle.join().unwrap()).unwrap();
    }
    wheel.stop();

    print_histogram("Contended Add Latency", &total);
    println!("  stats:  {:?}", wheel.stats());
}
