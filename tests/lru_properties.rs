//! Model-based properties of the LRU cache and the buffer pool's residency.

mod common;

use proptest::prelude::*;
use stratumdb::buffer::replacer::LruCache;
use stratumdb::{Permission, TransactionId};

#[derive(Debug, Clone)]
enum Op {
    Get(u8),
    Insert(u8, u32),
    Remove(u8),
    PopLru,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..16).prop_map(Op::Get),
        (0u8..16, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        (0u8..16).prop_map(Op::Remove),
        Just(Op::PopLru),
    ]
}

/// Reference model: a Vec ordered from most to least recently used.
struct Model {
    entries: Vec<(u8, u32)>,
    capacity: usize,
}

impl Model {
    fn position(&self, key: u8) -> Option<usize> {
        self.entries.iter().position(|&(k, _)| k == key)
    }

    fn get(&mut self, key: u8) -> Option<u32> {
        let pos = self.position(key)?;
        let entry = self.entries.remove(pos);
        self.entries.insert(0, entry);
        Some(entry.1)
    }

    /// Returns the evicted key when a new key arrives at capacity.
    fn insert(&mut self, key: u8, value: u32) -> Option<u8> {
        let mut evicted = None;
        if let Some(pos) = self.position(key) {
            self.entries.remove(pos);
        } else if self.entries.len() == self.capacity {
            evicted = self.entries.pop().map(|(k, _)| k);
        }
        self.entries.insert(0, (key, value));
        evicted
    }

    fn remove(&mut self, key: u8) -> Option<u32> {
        let pos = self.position(key)?;
        Some(self.entries.remove(pos).1)
    }
}

proptest! {
    #[test]
    fn prop_lru_matches_model(
        capacity in 1usize..8,
        ops in prop::collection::vec(arb_op(), 1..200),
    ) {
        let mut cache = LruCache::new(capacity);
        let mut model = Model { entries: Vec::new(), capacity };

        for op in ops {
            match op {
                Op::Get(k) => {
                    prop_assert_eq!(cache.get(&k).copied(), model.get(k));
                }
                Op::Insert(k, v) => {
                    let expected_victim = model.insert(k, v);
                    if !cache.contains(&k) && cache.is_full() {
                        let victim = cache.pop_lru().map(|(key, _)| key);
                        prop_assert_eq!(victim, expected_victim);
                    }
                    cache.insert(k, v);
                }
                Op::Remove(k) => {
                    prop_assert_eq!(cache.remove(&k), model.remove(k));
                }
                Op::PopLru => {
                    prop_assert_eq!(cache.pop_lru(), model.entries.pop());
                }
            }

            let order: Vec<(u8, u32)> = cache.iter().map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(&order, &model.entries);
            prop_assert_eq!(cache.len(), model.entries.len());
            prop_assert!(cache.len() <= capacity);
        }
    }

    #[test]
    fn prop_pool_keeps_most_recent_pages(
        accesses in prop::collection::vec(0u32..12, 1..60),
    ) {
        let fx = common::Fixture::new(4, 12);
        let tid = TransactionId::new();
        let mut recent: Vec<u32> = Vec::new();

        for n in accesses {
            fx.pool.get_page(tid, common::pid(n), Permission::Shared).unwrap();
            recent.retain(|&m| m != n);
            recent.insert(0, n);
            recent.truncate(4);
        }

        let expected: Vec<_> = recent.into_iter().map(common::pid).collect();
        prop_assert_eq!(fx.pool.cached_page_ids(), expected);
    }
}
