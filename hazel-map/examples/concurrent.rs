//! Example demonstrating concurrent operations on the lock-free HashMap
//!
//! Multiple threads insert, read, and remove at once without any locks or
//! blocking; memory is handed back through the hazard-pointer registry.

use hazel_map::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() {
    println!("=== Lock-Free Concurrent HashMap Demo ===\n");

    // Single-threaded basics first.
    let fruit = HashMap::with_capacity(16);
    fruit.insert("apple", 1);
    fruit.insert("banana", 2);
    fruit.insert("cherry", 3);
    println!("apple:  {:?}", fruit.get(&"apple"));
    println!("banana: {:?}", fruit.get(&"banana"));
    println!("orange: {:?} (expected None)", fruit.get(&"orange"));
    fruit.remove(&"banana");
    println!("banana after remove: {:?}\n", fruit.get(&"banana"));

    // Concurrent inserts.
    let map = Arc::new(HashMap::with_capacity(1024));

    println!("Benchmarking concurrent inserts...");
    let start = Instant::now();
    let mut handles = Vec::new();

    for thread_id in 0..8u64 {
        let map = Arc::clone(&map);
        handles.push(thread::spawn(move || {
            for i in 0..10_000 {
                let key = thread_id * 10_000 + i;
                map.insert(key, key * 2);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Inserted 80,000 entries from 8 threads in {:?} ({:.2} ops/sec)\n",
        duration,
        80_000.0 / duration.as_secs_f64()
    );

    // Concurrent reads.
    println!("Benchmarking concurrent reads...");
    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..8 {
        let map = Arc::clone(&map);
        handles.push(thread::spawn(move || {
            let mut found = 0u64;
            for key in 0..10_000 {
                if map.get(&key).is_some() {
                    found += 1;
                }
            }
            found
        }));
    }

    let mut total_found = 0;
    for handle in handles {
        total_found += handle.join().unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Performed 80,000 reads from 8 threads in {:?} ({:.2} ops/sec)",
        duration,
        80_000.0 / duration.as_secs_f64()
    );
    println!("Found {} entries during reads\n", total_found);

    // Mixed readers, writers, and removers.
    println!("Benchmarking mixed concurrent operations...");
    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..4 {
        let map = Arc::clone(&map);
        handles.push(thread::spawn(move || {
            for key in 0..5_000u64 {
                let _ = map.get(&key);
            }
        }));
    }

    for thread_id in 0..2u64 {
        let map = Arc::clone(&map);
        handles.push(thread::spawn(move || {
            for i in 0..5_000 {
                let key = 80_000 + thread_id * 5_000 + i;
                map.insert(key, key);
            }
        }));
    }

    for thread_id in 0..2u64 {
        let map = Arc::clone(&map);
        handles.push(thread::spawn(move || {
            for i in 0..2_500 {
                let key = thread_id * 2_500 + i;
                map.remove(&key);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    println!("Mixed operations completed in {:?}\n", start.elapsed());

    // Verify a slice of the surviving data.
    let mut verified = 0;
    for key in 5_000..10_000u64 {
        if map.get(&key) == Some(key * 2) {
            verified += 1;
        }
    }
    println!("Verified {} entries have correct values", verified);

    println!("\n=== Demo Complete ===");
    println!("All operations completed without any locks or blocking!");
}
