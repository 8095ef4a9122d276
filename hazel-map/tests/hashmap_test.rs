use hazel_map::HashMap;
use std::sync::Arc;
use std::thread;

#[test]
fn test_basic_operations() {
    let map = HashMap::with_capacity(16);
    assert_eq!(map.insert("apple", 1), None);
    assert_eq!(map.insert("banana", 2), None);
    assert_eq!(map.insert("cherry", 3), None);

    assert_eq!(map.get(&"apple"), Some(1));
    assert_eq!(map.get(&"banana"), Some(2));
    assert_eq!(map.get(&"cherry"), Some(3));
    assert_eq!(map.get(&"orange"), None);

    assert!(map.remove(&"banana"));
    assert_eq!(map.get(&"banana"), None);
    assert_eq!(map.get(&"apple"), Some(1));
}

#[test]
fn test_insert_replace() {
    let map = HashMap::new();
    assert_eq!(map.insert(1, 10), None);
    assert_eq!(map.insert(1, 20), Some(10));
    assert_eq!(map.insert(1, 30), Some(20));
    assert_eq!(map.get(&1), Some(30));
}

#[test]
fn test_remove() {
    let map = HashMap::new();
    map.insert(1, 100);
    map.insert(2, 200);

    assert!(map.remove(&1));
    assert_eq!(map.get(&1), None);
    assert!(!map.remove(&1));
    assert_eq!(map.get(&2), Some(200));
}

#[test]
fn test_remove_then_reinsert() {
    let map = HashMap::new();
    map.insert(5, 50);
    assert!(map.remove(&5));
    assert_eq!(map.insert(5, 55), None);
    assert_eq!(map.get(&5), Some(55));
}

#[test]
fn test_remove_absent_is_noop() {
    let map: HashMap<u64, u64> = HashMap::new();
    assert!(!map.remove(&42));
    map.insert(42, 1);
    assert!(map.remove(&42));
    assert!(!map.remove(&42));
}

#[test]
fn test_contains_key() {
    let map = HashMap::new();
    map.insert(42, "hello");
    assert!(map.contains_key(&42));
    assert!(!map.contains_key(&99));
}

#[test]
fn test_capacity() {
    let map: HashMap<u64, u64> = HashMap::with_capacity(1024);
    assert_eq!(map.capacity(), 1024);

    // Capacity does not change as the map fills.
    for i in 0..4096 {
        map.insert(i, i);
    }
    assert_eq!(map.capacity(), 1024);
}

#[test]
fn test_non_power_of_two_capacity() {
    let map = HashMap::with_capacity(37);
    for i in 0..1000u64 {
        map.insert(i, i + 1);
    }
    for i in 0..1000u64 {
        assert_eq!(map.get(&i), Some(i + 1));
    }
}

#[test]
fn test_string_keys() {
    let map = HashMap::new();
    map.insert("hello".to_string(), 1);
    map.insert("world".to_string(), 2);
    assert_eq!(map.get(&"hello".to_string()), Some(1));
    assert_eq!(map.get(&"world".to_string()), Some(2));
}

#[test]
fn test_many_entries() {
    let map = HashMap::with_capacity(256);
    for i in 0..10_000u64 {
        map.insert(i, i * 3);
    }
    for i in 0..10_000u64 {
        assert_eq!(map.get(&i), Some(i * 3));
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_contended_insert() {
    // Eight writers over disjoint key ranges; every key must come back with
    // its own value afterwards.
    let map = Arc::new(HashMap::with_capacity(1024));
    let mut handles = vec![];

    for t in 0..8u64 {
        let map = map.clone();
        handles.push(thread::spawn(move || {
            for i in 0..10_000 {
                let key = t * 10_000 + i;
                map.insert(key, key * 10);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for key in 0..80_000u64 {
        assert_eq!(map.get(&key), Some(key * 10));
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_insert_read() {
    let map = Arc::new(HashMap::with_capacity(512));
    let mut handles = vec![];

    for t in 0..4u64 {
        let map = map.clone();
        handles.push(thread::spawn(move || {
            for i in 0..1000 {
                let key = t * 1000 + i;
                map.insert(key, key * 2);
            }
        }));
    }

    // Readers concurrent with the writers.
    for _ in 0..4 {
        let map = map.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..1000 {
                let _ = map.get(&500);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4u64 {
        for i in 0..1000 {
            let key = t * 1000 + i;
            assert_eq!(map.get(&key), Some(key * 2));
        }
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_bulk_remove() {
    // Fill single-threaded, then remove everything from eight threads over
    // disjoint ranges.
    let map = Arc::new(HashMap::with_capacity(4096));
    for i in 0..100_000u64 {
        map.insert(i, i);
    }

    let mut handles = vec![];
    for t in 0..8u64 {
        let map = map.clone();
        handles.push(thread::spawn(move || {
            for i in 0..12_500 {
                let key = t * 12_500 + i;
                assert!(map.remove(&key));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for key in 0..100_000u64 {
        assert_eq!(map.get(&key), None);
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_mixed_workload() {
    // Insert, read back, remove the even keys; afterwards a key is present
    // exactly when its index is odd.
    let map = Arc::new(HashMap::with_capacity(1024));
    let mut handles = vec![];

    for t in 0..8u64 {
        let map = map.clone();
        handles.push(thread::spawn(move || {
            for i in 0..1000 {
                let key = t * 1000 + i;
                map.insert(key, key * 10);
                assert_eq!(map.get(&key), Some(key * 10));
                if i % 2 == 0 {
                    assert!(map.remove(&key));
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..8u64 {
        for i in 0..1000 {
            let key = t * 1000 + i;
            let expected = if i % 2 == 0 { None } else { Some(key * 10) };
            assert_eq!(map.get(&key), expected);
        }
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_update_race_single_winner() {
    // Two threads fight over one key; afterwards the value belongs to one of
    // them and exactly one node carries the key.
    let map = Arc::new(HashMap::with_capacity(8));
    map.insert(0u64, 0u64);

    let mut handles = vec![];
    for tid in 1..=2u64 {
        let map = map.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..20_000 {
                map.insert(0, tid);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let value = map.get(&0).unwrap();
    assert!(value == 1 || value == 2);

    // A single remove must leave no trace of the key.
    assert!(map.remove(&0));
    assert_eq!(map.get(&0), None);
    assert!(!map.remove(&0));
}
