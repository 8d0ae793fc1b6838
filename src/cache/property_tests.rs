//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache against a plain `HashMap` model and to
//! exercise it from several threads at once.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use crate::cache::{current_timestamp_secs, TimeCache};

// == Test Configuration ==
const TEST_TTL: u64 = 300;

// == Strategies ==
/// Generates cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,16}"
}

/// Generates cache values
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}"
}

/// A single cache operation
#[derive(Debug, Clone)]
enum CacheOp {
    Store { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

/// Small key space so operations collide often
fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    let key = "k[0-7]";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| CacheOp::Store { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

/// Runs `get` and reports which callback fired, asserting exactly one did.
fn observe(cache: &TimeCache<String>, key: &str) -> Option<String> {
    let mut hit = None;
    let mut missed = false;
    cache.get(
        key,
        |hit_key, value| {
            assert_eq!(hit_key, key);
            hit = Some(value);
        },
        |miss_key| {
            assert_eq!(miss_key, key);
            missed = true;
        },
    );
    assert!(hit.is_some() != missed, "exactly one callback must run");
    hit
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Storing then reading returns the stored value through on_hit
    #[test]
    fn prop_store_then_get(key in key_strategy(), value in value_strategy()) {
        let cache = TimeCache::new(TEST_TTL).unwrap();
        cache.store(key.clone(), value.clone());

        prop_assert_eq!(observe(&cache, &key), Some(value));
    }

    // A key that was never stored always misses
    #[test]
    fn prop_miss_on_unknown_key(
        stored in prop::collection::hash_set(key_strategy(), 0..10),
        probe in key_strategy()
    ) {
        prop_assume!(!stored.contains(&probe));
        let cache = TimeCache::new(TEST_TTL).unwrap();
        for key in &stored {
            cache.store(key.clone(), "value".to_string());
        }

        prop_assert_eq!(observe(&cache, &probe), None);
    }

    // Store, delete, get misses
    #[test]
    fn prop_delete_removes_entry(key in key_strategy(), value in value_strategy()) {
        let cache = TimeCache::new(TEST_TTL).unwrap();
        cache.store(key.clone(), value);
        cache.delete(&key);

        prop_assert_eq!(observe(&cache, &key), None);
        prop_assert!(cache.deadline(&key).is_none());
    }

    // Deleting an absent key leaves every other key untouched
    #[test]
    fn prop_idempotent_delete(
        entries in prop::collection::hash_map(key_strategy(), value_strategy(), 0..10),
        absent in key_strategy()
    ) {
        prop_assume!(!entries.contains_key(&absent));
        let cache = TimeCache::new(TEST_TTL).unwrap();
        for (key, value) in &entries {
            cache.store(key.clone(), value.clone());
        }

        cache.delete(&absent);
        cache.delete(&absent);

        prop_assert_eq!(cache.len(), entries.len());
        for (key, value) in &entries {
            prop_assert_eq!(cache.lookup(key), Some(value.clone()));
        }
    }

    // Storing V1 then V2 under one key reads back V2
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let cache = TimeCache::new(TEST_TTL).unwrap();
        cache.store(key.clone(), value1);
        cache.store(key.clone(), value2.clone());

        prop_assert_eq!(observe(&cache, &key), Some(value2));
        prop_assert_eq!(cache.len(), 1);
    }

    // Without sweeping, the cache behaves like a HashMap and the hit/miss
    // counters match what callers observed
    #[test]
    fn prop_matches_hashmap_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let cache = TimeCache::new(TEST_TTL).unwrap();
        let mut model: HashMap<String, String> = HashMap::new();
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;

        for op in ops {
            match op {
                CacheOp::Store { key, value } => {
                    cache.store(key.clone(), value.clone());
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    let observed = observe(&cache, &key);
                    prop_assert_eq!(observed.as_ref(), model.get(&key));
                    if observed.is_some() {
                        expected_hits += 1;
                    } else {
                        expected_misses += 1;
                    }
                }
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                    model.remove(&key);
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, model.len());
        for key in model.keys() {
            prop_assert!(cache.deadline(key).is_some(), "live key {} has no deadline", key);
        }
    }

    // A sweep evicts exactly the keys whose deadline is in the past
    #[test]
    fn prop_sweep_evicts_only_expired(
        keys in prop::collection::hash_map(key_strategy(), any::<bool>(), 1..20)
    ) {
        let cache = TimeCache::new(TEST_TTL).unwrap();
        let now = current_timestamp_secs();
        for (key, expired) in &keys {
            cache.store(key.clone(), key.clone());
            let deadline = if *expired { now - 10 } else { now + 60 };
            cache.set_deadline(key, deadline);
        }

        let expected_evictions = keys.values().filter(|expired| **expired).count();
        prop_assert_eq!(cache.sweep_expired(), expected_evictions);

        for (key, expired) in &keys {
            prop_assert_eq!(cache.contains_key(key), !expired);
            prop_assert_eq!(cache.deadline(key).is_some(), !expired);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // Concurrent store/get/delete on overlapping keys never yields a value
    // that was not written for that key
    #[test]
    fn prop_concurrent_operation_correctness(
        per_thread in prop::collection::vec(
            prop::collection::vec(cache_op_strategy(), 10..50),
            2..6
        )
    ) {
        let cache: TimeCache<String> = TimeCache::new(TEST_TTL).unwrap();
        let written: HashSet<(String, String)> = per_thread
            .iter()
            .flatten()
            .filter_map(|op| match op {
                CacheOp::Store { key, value } => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect();
        let written = Arc::new(written);

        let handles: Vec<_> = per_thread
            .into_iter()
            .map(|ops| {
                let cache = cache.clone();
                let written = Arc::clone(&written);
                thread::spawn(move || {
                    for op in ops {
                        match op {
                            CacheOp::Store { key, value } => cache.store(key, value),
                            CacheOp::Get { key } => {
                                if let Some(value) = cache.lookup(&key) {
                                    assert!(
                                        written.contains(&(key.clone(), value.clone())),
                                        "read {:?} for {} which was never written",
                                        value,
                                        key
                                    );
                                }
                            }
                            CacheOp::Delete { key } => cache.delete(&key),
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            prop_assert!(handle.join().is_ok(), "worker thread panicked");
        }

        // Every surviving value was written by some thread
        for key in (0..8).map(|i| format!("k{}", i)) {
            if let Some(value) = cache.lookup(&key) {
                prop_assert!(written.contains(&(key, value)));
            }
        }
    }
}
